use core::convert::Infallible;

use alloc::vec::Vec;
use nom::IResult;

use super::serialize::{
    infallible, Serializer, SerializerChecksum, SerializerLength, SerializerVec,
};
use super::{
    checksum, MAX_DATA_LEN, SOP1, SOP2_ANSWER, SOP2_BASE, SOP2_RESET_TIMEOUT, SOP2_SYNC,
};

/// Bytes in an outgoing frame that are not payload: SOP1, SOP2, DID,
/// CID, SEQ, DLEN and the checksum.
const COMMAND_OVERHEAD: usize = 7;

/// An error while framing a [Command].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, thiserror::Error)]
pub enum CommandError<E = Infallible> {
    /// The payload does not fit in the one-byte length field.
    #[error("command data is {0} bytes, must be {max} bytes or less", max = MAX_DATA_LEN)]
    DataTooLong(usize),
    /// The underlying serializer failed.
    #[error("write error: {0:?}")]
    Write(E),
}

#[cfg(feature = "defmt")]
impl defmt::Format for CommandError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::DataTooLong(len) => defmt::write!(f, "DataTooLong({=usize})", len),
            Self::Write(e) => match *e {},
        }
    }
}

impl CommandError<Infallible> {
    /// Widen a validation error to any serializer's error type.
    pub fn widen<E>(self) -> CommandError<E> {
        match self {
            Self::DataTooLong(len) => CommandError::DataTooLong(len),
            Self::Write(e) => match e {},
        }
    }
}

/// An outgoing command packet, sent from the host to the device.
///
/// `I` is the payload, usually `Vec<u8>` or `&[u8]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command<I = Vec<u8>> {
    /// Second start-of-packet byte. See [SOP2_ANSWER] and
    /// [SOP2_RESET_TIMEOUT].
    pub sop2: u8,
    /// Virtual device id.
    pub did: u8,
    /// Command id, within the device.
    pub cid: u8,
    /// Sequence number, echoed back in the sync response.
    pub seq: u8,
    /// Payload, [MAX_DATA_LEN] bytes at most.
    pub data: I,
}

impl Command<Vec<u8>> {
    /// A command with no payload, sequence number 0, that asks for an
    /// answer and resets the inactivity timeout.
    pub fn new(did: u8, cid: u8) -> Self {
        Self {
            sop2: SOP2_SYNC,
            did,
            cid,
            seq: 0,
            data: Vec::new(),
        }
    }
}

impl<I> Command<I> {
    pub fn with_seq(self, seq: u8) -> Self {
        Self { seq, ..self }
    }

    pub fn with_sop2(self, sop2: u8) -> Self {
        Self { sop2, ..self }
    }

    pub fn with_data<J>(self, data: J) -> Command<J> {
        Command {
            sop2: self.sop2,
            did: self.did,
            cid: self.cid,
            seq: self.seq,
            data,
        }
    }

    /// Set or clear the answer flag in SOP2.
    pub fn answer(self, answer: bool) -> Self {
        self.sop2_flag(SOP2_ANSWER, answer)
    }

    /// Set or clear the reset-timeout flag in SOP2.
    pub fn reset_timeout(self, reset: bool) -> Self {
        self.sop2_flag(SOP2_RESET_TIMEOUT, reset)
    }

    fn sop2_flag(self, flag: u8, set: bool) -> Self {
        let sop2 = if set {
            SOP2_BASE | self.sop2 | flag
        } else {
            SOP2_BASE | (self.sop2 & !flag)
        };
        Self { sop2, ..self }
    }

    /// Does SOP2 ask the device for a sync response?
    pub fn wants_answer(&self) -> bool {
        self.sop2 & SOP2_ANSWER != 0
    }

    pub fn map<F, J>(self, f: F) -> Command<J>
    where
        F: FnOnce(I) -> J,
    {
        Command {
            sop2: self.sop2,
            did: self.did,
            cid: self.cid,
            seq: self.seq,
            data: f(self.data),
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> Command<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        Command {
            sop2: self.sop2,
            did: self.did,
            cid: self.cid,
            seq: self.seq,
            data: f(&self.data),
        }
    }

    pub fn to_owned(&self) -> Command<<I::Target as alloc::borrow::ToOwned>::Owned>
    where
        I: core::ops::Deref,
        I::Target: alloc::borrow::ToOwned,
    {
        self.map_ref(|d| alloc::borrow::ToOwned::to_owned(&**d))
    }

    pub fn borrow<Borrowed: ?Sized>(&self) -> Command<&Borrowed>
    where
        I: core::borrow::Borrow<Borrowed>,
    {
        self.map_ref(I::borrow)
    }
}

impl<I> Command<I>
where
    I: AsRef<[u8]>,
{
    fn data_len(&self) -> usize {
        let mut len = SerializerLength::new();
        infallible(len.write_bytes(self.data.as_ref()));
        len.len()
    }

    /// The DLEN field for this command: payload plus checksum.
    pub fn dlen(&self) -> Result<u8, CommandError> {
        let len = self.data_len();
        if len > MAX_DATA_LEN {
            return Err(CommandError::DataTooLong(len));
        }
        Ok(len as u8 + 1)
    }

    /// Size of the whole frame on the wire.
    pub fn frame_len(&self) -> usize {
        COMMAND_OVERHEAD + self.data_len()
    }

    /// Serialize the command into a full frame, with start bytes,
    /// length and checksum.
    ///
    /// Nothing is written if the payload is too long.
    pub fn frame<S>(&self, ser: &mut S) -> Result<(), CommandError<S::Error>>
    where
        S: Serializer,
    {
        let dlen = self.dlen().map_err(|e| e.widen())?;

        ser.write_bytes(&[SOP1, self.sop2])
            .map_err(CommandError::Write)?;

        // checksum covers DID through the end of the payload
        let mut check = SerializerChecksum::new(&mut *ser);
        check
            .write_bytes(&[self.did, self.cid, self.seq, dlen])
            .map_err(CommandError::Write)?;
        check
            .write_bytes(self.data.as_ref())
            .map_err(CommandError::Write)?;
        let (sum, ser) = check.finalize();

        ser.write_u8(sum).map_err(CommandError::Write)
    }

    /// Serialize the command into a new byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CommandError> {
        let mut ser = SerializerVec::with_capacity(self.frame_len());
        self.frame(&mut ser).map_err(|e| match e {
            CommandError::DataTooLong(len) => CommandError::DataTooLong(len),
            CommandError::Write(e) => match e {},
        })?;
        Ok(ser.done())
    }
}

impl<'a> Command<&'a [u8]> {
    /// Parse a complete outgoing frame, as written by [Command::frame].
    ///
    /// Fails if the start byte, length or checksum are wrong.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Self> {
        use nom::bytes::complete::{tag, take};
        use nom::combinator::verify;
        use nom::number::complete::u8;

        let start = input;
        let (input, _) = tag(&[SOP1][..])(input)?;
        let (input, sop2) = u8(input)?;
        let (input, did) = u8(input)?;
        let (input, cid) = u8(input)?;
        let (input, seq) = u8(input)?;
        let (input, dlen) = verify(u8, |d: &u8| *d >= 1)(input)?;
        let (input, data) = take(dlen as usize - 1)(input)?;

        // everything from DID to the end of data
        let body = &start[2..start.len() - input.len()];
        let (input, _) = verify(u8, |c: &u8| *c == checksum(body))(input)?;

        Ok((
            input,
            Command {
                sop2,
                did,
                cid,
                seq,
                data,
            },
        ))
    }
}

#[cfg(test)]
mod test {
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    use super::*;

    impl Arbitrary for Command<Vec<u8>> {
        fn arbitrary(g: &mut Gen) -> Self {
            let mut data = Vec::<u8>::arbitrary(g);
            data.truncate(MAX_DATA_LEN);
            Command {
                sop2: u8::arbitrary(g),
                did: u8::arbitrary(g),
                cid: u8::arbitrary(g),
                seq: u8::arbitrary(g),
                data,
            }
        }
    }

    #[test]
    fn create_example() {
        let cmd = Command {
            sop2: 0xfe,
            did: 0x01,
            cid: 0x02,
            seq: 0x03,
            data: [0x04, 0x05, 0x06, 0x07, 0x08],
        };
        assert_eq!(
            cmd.to_bytes().unwrap(),
            [0xff, 0xfe, 0x01, 0x02, 0x03, 0x06, 0x04, 0x05, 0x06, 0x07, 0x08, 0xd5]
        );
    }

    #[test]
    fn create_empty() {
        let cmd = Command::new(0x00, 0x01);
        // 0x00 + 0x01 + 0x00 + 0x01 = 0x02
        assert_eq!(
            cmd.to_bytes().unwrap(),
            [0xff, 0xff, 0x00, 0x01, 0x00, 0x01, 0xfd]
        );
    }

    #[test]
    fn create_max_len() {
        let cmd = Command::new(0x02, 0x20).with_data(vec![0xaa; MAX_DATA_LEN]);
        let bytes = cmd.to_bytes().unwrap();
        assert_eq!(bytes.len(), MAX_DATA_LEN + COMMAND_OVERHEAD);
        assert_eq!(bytes.len(), cmd.frame_len());
        assert_eq!(cmd.dlen(), Ok(0xfe));
        assert_eq!(bytes[5], 0xfe);
    }

    #[test]
    fn create_too_long() {
        let cmd = Command::new(0x02, 0x20).with_data(vec![0xaa; MAX_DATA_LEN + 1]);
        assert_eq!(cmd.to_bytes(), Err(CommandError::DataTooLong(254)));
        assert_eq!(
            cmd.to_bytes().unwrap_err().to_string(),
            "command data is 254 bytes, must be 253 bytes or less"
        );
    }

    #[test]
    fn too_long_writes_nothing() {
        let cmd = Command::new(0x02, 0x20).with_data(vec![0xaa; 300]);
        let mut ser = SerializerVec::new();
        assert!(cmd.frame(&mut ser).is_err());
        assert!(ser.is_empty());
    }

    #[test]
    fn sop2_flags() {
        let cmd = Command::new(0x00, 0x01);
        assert!(cmd.wants_answer());

        let cmd = cmd.answer(false);
        assert_eq!(cmd.sop2, 0xfe);
        assert!(!cmd.wants_answer());

        let cmd = cmd.reset_timeout(false);
        assert_eq!(cmd.sop2, 0xfc);

        let cmd = cmd.answer(true);
        assert_eq!(cmd.sop2, 0xfd);
    }

    #[test]
    fn parse_bad_checksum() {
        let bytes = [0xff, 0xff, 0x00, 0x01, 0x00, 0x01, 0xfe];
        assert!(Command::parse(&bytes[..]).is_err());
    }

    #[test]
    fn parse_zero_length() {
        let bytes = [0xff, 0xff, 0x00, 0x01, 0x00, 0x00, 0xfe];
        assert!(Command::parse(&bytes[..]).is_err());
    }

    #[quickcheck]
    fn roundtrip(cmd: Command<Vec<u8>>) -> bool {
        let Ok(bytes) = cmd.to_bytes() else {
            return false;
        };
        let checksum_ok = bytes[bytes.len() - 1] == checksum(&bytes[2..bytes.len() - 1]);

        match Command::parse(&bytes[..]) {
            Ok((rest, parsed)) => checksum_ok && rest.is_empty() && parsed == cmd.borrow(),
            Err(_) => false,
        }
    }
}
