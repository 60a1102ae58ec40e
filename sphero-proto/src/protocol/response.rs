//! Packets sent from the device to the host.
//!
//! Responses are generic over their payload. The codec parses them
//! borrowed, as `Response<&[u8]>`, and hands them out owned, as
//! `Response<Vec<u8>>`.

use alloc::vec::Vec;
use nom::IResult;

use super::checksum::{ChecksumDigest, Digest};
use super::serialize::{infallible, Serializer, SerializerVec};
use super::{Variant, HEADER_LEN, SOP1, SOP2_ASYNC, SOP2_SYNC};

/// Largest payload an inbound length byte can describe.
pub const MAX_RESPONSE_DATA_LEN: usize = 254;

/// A response to a command.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncResponse<I = Vec<u8>> {
    pub sop1: u8,
    pub sop2: u8,
    /// Response code. Zero is success.
    pub mrsp: u8,
    /// Sequence number of the command this answers.
    pub seq: u8,
    /// Length of data, plus one for the checksum.
    pub dlen: u8,
    pub data: I,
    pub checksum: u8,
}

/// A message the device sent on its own, like sensor streaming or
/// collision notifications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AsyncResponse<I = Vec<u8>> {
    pub sop1: u8,
    pub sop2: u8,
    /// Kind of message.
    pub id_code: u8,
    pub dlen_msb: u8,
    pub dlen_lsb: u8,
    /// Both length bytes together. Framing only uses [Self::dlen_lsb].
    pub dlen: u16,
    pub data: I,
    pub checksum: u8,
}

/// Any response, keyed by SOP2.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response<I = Vec<u8>> {
    Sync(SyncResponse<I>),
    Async(AsyncResponse<I>),
}

fn body_checksum(header: &[u8], data: &[u8]) -> u8 {
    let mut digest = ChecksumDigest::new();
    digest.update(header);
    digest.update(data);
    digest.finalize()
}

impl<I> SyncResponse<I>
where
    I: AsRef<[u8]>,
{
    /// Build a response with a correct length and checksum.
    ///
    /// Returns [None] if the data is longer than
    /// [MAX_RESPONSE_DATA_LEN].
    pub fn new(mrsp: u8, seq: u8, data: I) -> Option<Self> {
        let len = data.as_ref().len();
        if len > MAX_RESPONSE_DATA_LEN {
            return None;
        }
        let dlen = len as u8 + 1;
        let checksum = body_checksum(&[mrsp, seq, dlen], data.as_ref());
        Some(Self {
            sop1: SOP1,
            sop2: SOP2_SYNC,
            mrsp,
            seq,
            dlen,
            data,
            checksum,
        })
    }

    /// Write this response exactly as it stands, checksum included.
    pub fn frame<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_bytes(&[self.sop1, self.sop2, self.mrsp, self.seq, self.dlen])?;
        ser.write_bytes(self.data.as_ref())?;
        ser.write_u8(self.checksum)
    }

    /// Does the stored checksum match the contents?
    pub fn checksum_ok(&self) -> bool {
        self.checksum == body_checksum(&[self.mrsp, self.seq, self.dlen], self.data.as_ref())
    }
}

impl<'a> SyncResponse<&'a [u8]> {
    /// Parse a sync response. The checksum is read, not verified.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Self> {
        use nom::bytes::complete::take;
        use nom::combinator::verify;
        use nom::number::complete::u8;

        let (input, sop1) = verify(u8, |b: &u8| *b == SOP1)(input)?;
        let (input, sop2) = verify(u8, |b: &u8| *b == SOP2_SYNC)(input)?;
        let (input, mrsp) = u8(input)?;
        let (input, seq) = u8(input)?;
        let (input, dlen) = verify(u8, |d: &u8| *d >= 1)(input)?;
        let (input, data) = take(dlen as usize - 1)(input)?;
        let (input, checksum) = u8(input)?;

        Ok((
            input,
            SyncResponse {
                sop1,
                sop2,
                mrsp,
                seq,
                dlen,
                data,
                checksum,
            },
        ))
    }
}

impl<I> SyncResponse<I> {
    pub fn map<F, J>(self, f: F) -> SyncResponse<J>
    where
        F: FnOnce(I) -> J,
    {
        SyncResponse {
            sop1: self.sop1,
            sop2: self.sop2,
            mrsp: self.mrsp,
            seq: self.seq,
            dlen: self.dlen,
            data: f(self.data),
            checksum: self.checksum,
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> SyncResponse<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        SyncResponse {
            sop1: self.sop1,
            sop2: self.sop2,
            mrsp: self.mrsp,
            seq: self.seq,
            dlen: self.dlen,
            data: f(&self.data),
            checksum: self.checksum,
        }
    }
}

impl<I> AsyncResponse<I>
where
    I: AsRef<[u8]>,
{
    /// Build an async response with a correct length and checksum.
    ///
    /// Returns [None] if the data is longer than
    /// [MAX_RESPONSE_DATA_LEN].
    pub fn new(id_code: u8, data: I) -> Option<Self> {
        let len = data.as_ref().len();
        if len > MAX_RESPONSE_DATA_LEN {
            return None;
        }
        let dlen_lsb = len as u8 + 1;
        let checksum = body_checksum(&[id_code, 0, dlen_lsb], data.as_ref());
        Some(Self {
            sop1: SOP1,
            sop2: SOP2_ASYNC,
            id_code,
            dlen_msb: 0,
            dlen_lsb,
            dlen: dlen_lsb as u16,
            data,
            checksum,
        })
    }

    /// Write this response exactly as it stands, checksum included.
    pub fn frame<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_bytes(&[
            self.sop1,
            self.sop2,
            self.id_code,
            self.dlen_msb,
            self.dlen_lsb,
        ])?;
        ser.write_bytes(self.data.as_ref())?;
        ser.write_u8(self.checksum)
    }

    /// Does the stored checksum match the contents?
    pub fn checksum_ok(&self) -> bool {
        self.checksum
            == body_checksum(
                &[self.id_code, self.dlen_msb, self.dlen_lsb],
                self.data.as_ref(),
            )
    }
}

impl<'a> AsyncResponse<&'a [u8]> {
    /// Parse an async response. The checksum is read, not verified.
    ///
    /// As with sync responses, only the low length byte delimits the
    /// packet.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Self> {
        use nom::bytes::complete::take;
        use nom::combinator::verify;
        use nom::number::complete::u8;

        let (input, sop1) = verify(u8, |b: &u8| *b == SOP1)(input)?;
        let (input, sop2) = verify(u8, |b: &u8| *b == SOP2_ASYNC)(input)?;
        let (input, id_code) = u8(input)?;
        let (input, dlen_msb) = u8(input)?;
        let (input, dlen_lsb) = verify(u8, |d: &u8| *d >= 1)(input)?;
        let (input, data) = take(dlen_lsb as usize - 1)(input)?;
        let (input, checksum) = u8(input)?;

        Ok((
            input,
            AsyncResponse {
                sop1,
                sop2,
                id_code,
                dlen_msb,
                dlen_lsb,
                dlen: u16::from_be_bytes([dlen_msb, dlen_lsb]),
                data,
                checksum,
            },
        ))
    }
}

impl<I> AsyncResponse<I> {
    pub fn map<F, J>(self, f: F) -> AsyncResponse<J>
    where
        F: FnOnce(I) -> J,
    {
        AsyncResponse {
            sop1: self.sop1,
            sop2: self.sop2,
            id_code: self.id_code,
            dlen_msb: self.dlen_msb,
            dlen_lsb: self.dlen_lsb,
            dlen: self.dlen,
            data: f(self.data),
            checksum: self.checksum,
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> AsyncResponse<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        AsyncResponse {
            sop1: self.sop1,
            sop2: self.sop2,
            id_code: self.id_code,
            dlen_msb: self.dlen_msb,
            dlen_lsb: self.dlen_lsb,
            dlen: self.dlen,
            data: f(&self.data),
            checksum: self.checksum,
        }
    }
}

impl<I> Response<I> {
    pub fn variant(&self) -> Variant {
        match self {
            Self::Sync(_) => Variant::Sync,
            Self::Async(_) => Variant::Async,
        }
    }

    pub fn sop2(&self) -> u8 {
        match self {
            Self::Sync(r) => r.sop2,
            Self::Async(r) => r.sop2,
        }
    }

    pub fn data(&self) -> &I {
        match self {
            Self::Sync(r) => &r.data,
            Self::Async(r) => &r.data,
        }
    }

    pub fn checksum(&self) -> u8 {
        match self {
            Self::Sync(r) => r.checksum,
            Self::Async(r) => r.checksum,
        }
    }

    pub fn map<F, J>(self, f: F) -> Response<J>
    where
        F: FnOnce(I) -> J,
    {
        match self {
            Self::Sync(r) => Response::Sync(r.map(f)),
            Self::Async(r) => Response::Async(r.map(f)),
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> Response<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        match self {
            Self::Sync(r) => Response::Sync(r.map_ref(f)),
            Self::Async(r) => Response::Async(r.map_ref(f)),
        }
    }

    pub fn to_owned(&self) -> Response<<I::Target as alloc::borrow::ToOwned>::Owned>
    where
        I: core::ops::Deref,
        I::Target: alloc::borrow::ToOwned,
    {
        self.map_ref(|d| alloc::borrow::ToOwned::to_owned(&**d))
    }

    pub fn borrow<Borrowed: ?Sized>(&self) -> Response<&Borrowed>
    where
        I: core::borrow::Borrow<Borrowed>,
    {
        self.map_ref(I::borrow)
    }
}

impl<I> Response<I>
where
    I: AsRef<[u8]>,
{
    /// Write this response exactly as it stands, checksum included.
    pub fn frame<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Sync(r) => r.frame(ser),
            Self::Async(r) => r.frame(ser),
        }
    }

    /// Serialize the response into a new byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ser = SerializerVec::with_capacity(HEADER_LEN + 1 + self.data().as_ref().len());
        infallible(self.frame(&mut ser));
        ser.done()
    }

    pub fn checksum_ok(&self) -> bool {
        match self {
            Self::Sync(r) => r.checksum_ok(),
            Self::Async(r) => r.checksum_ok(),
        }
    }
}

impl<'a> Response<&'a [u8]> {
    /// Parse either kind of response. The checksum is read, not
    /// verified.
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Self> {
        nom::branch::alt((
            nom::combinator::map(SyncResponse::<&'a [u8]>::parse, Response::Sync),
            nom::combinator::map(AsyncResponse::<&'a [u8]>::parse, Response::Async),
        ))(input)
    }
}

impl<I> From<SyncResponse<I>> for Response<I> {
    fn from(r: SyncResponse<I>) -> Self {
        Self::Sync(r)
    }
}

impl<I> From<AsyncResponse<I>> for Response<I> {
    fn from(r: AsyncResponse<I>) -> Self {
        Self::Async(r)
    }
}
