use alloc::vec::Vec;

use super::check::{check_expected_size, check_min_size, check_sops, declared_size};
use super::{checksum, Command, CommandError, Response};

/// Stream corruption found while parsing, reported to an
/// [ErrorListener]. None of these stop the codec.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// The checksum byte did not match the packet contents.
    #[error("Incorrect checksum, packet discarded")]
    Checksum { calculated: u8, provided: u8 },
    /// The length field was zero, so there is not even a checksum.
    #[error("Zero length field, packet discarded")]
    ZeroLength,
}

/// Something that wants to hear about corrupt packets.
pub trait ErrorListener {
    fn on_error(&mut self, error: PacketError);
}

/// Ignore all errors.
impl ErrorListener for () {
    fn on_error(&mut self, _error: PacketError) {}
}

/// Collect errors for later.
impl ErrorListener for Vec<PacketError> {
    fn on_error(&mut self, error: PacketError) {
        self.push(error)
    }
}

/// Send errors down a channel. A hung-up receiver is ignored.
#[cfg(feature = "std")]
impl ErrorListener for std::sync::mpsc::Sender<PacketError> {
    fn on_error(&mut self, error: PacketError) {
        let _ = self.send(error);
    }
}

impl<L> ErrorListener for &mut L
where
    L: ErrorListener,
{
    fn on_error(&mut self, error: PacketError) {
        (**self).on_error(error)
    }
}

/// Call a closure with each error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OnError<F>(pub F);

impl<F> ErrorListener for OnError<F>
where
    F: FnMut(PacketError),
{
    fn on_error(&mut self, error: PacketError) {
        (self.0)(error)
    }
}

/// Packet encoder and incremental decoder.
///
/// Bytes that do not yet form a whole packet are kept between calls
/// to [Codec::parse], so a packet may arrive split over any number of
/// chunks, or share a chunk with the next one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Codec<L = ()> {
    pending: Vec<u8>,
    listener: L,
}

impl Codec<()> {
    /// Create a codec that ignores errors.
    pub fn new() -> Self {
        Self::with_listener(())
    }
}

impl<L> Codec<L>
where
    L: ErrorListener,
{
    /// Create a codec that reports errors to the given listener.
    pub fn with_listener(listener: L) -> Self {
        Self {
            pending: Vec::new(),
            listener,
        }
    }

    /// Release the listener.
    pub fn free(self) -> L {
        self.listener
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Bytes held over for the next call to [Codec::parse].
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Forget any held-over bytes.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Serialize a command into a complete frame.
    ///
    /// This does not touch the receive buffer.
    pub fn create<I>(&self, command: &Command<I>) -> Result<Vec<u8>, CommandError>
    where
        I: AsRef<[u8]>,
    {
        command.to_bytes()
    }

    /// Feed a chunk of received bytes to the codec.
    ///
    /// Returns a response if one is complete, and [None] if more data
    /// is needed or the data was discarded. Call again with an empty
    /// chunk after a response to pick up any packet that arrived in the
    /// same chunk.
    pub fn parse(&mut self, chunk: &[u8]) -> Option<Response> {
        // garbage gets one more chance, if it was not already held over
        let retry_desync = self.pending.is_empty();
        self.pending.extend_from_slice(chunk);

        if !check_min_size(&self.pending) {
            return None;
        }

        if check_sops(&self.pending).is_none() {
            if retry_desync {
                log::debug!(
                    "holding {} unsynchronized bytes for another try",
                    self.pending.len()
                );
            } else {
                log::debug!("discarding {} unsynchronized bytes", self.pending.len());
                self.pending.clear();
            }
            return None;
        }

        // check_expected_size only fails here on a short buffer
        check_expected_size(&self.pending)?;
        let size = declared_size(&self.pending)?;

        if size < super::MIN_PACKET_SIZE {
            log::warn!("zero length field, discarding {} bytes", self.pending.len());
            self.pending.clear();
            self.listener.on_error(PacketError::ZeroLength);
            return None;
        }

        let packet = &self.pending[..size];
        let calculated = checksum(&packet[2..size - 1]);
        let provided = packet[size - 1];
        if calculated != provided {
            log::warn!(
                "incorrect checksum {:#04x}, expected {:#04x}, discarding {} bytes",
                provided,
                calculated,
                self.pending.len()
            );
            self.pending.clear();
            self.listener.on_error(PacketError::Checksum {
                calculated,
                provided,
            });
            return None;
        }

        let Ok((_, response)) = Response::parse(packet) else {
            debug_assert!(false, "checked packet failed to parse");
            self.pending.clear();
            return None;
        };
        let response = response.to_owned();

        self.pending.drain(..size);
        log::trace!(
            "parsed {:?} response, {} bytes left over",
            response.variant(),
            self.pending.len()
        );
        Some(response)
    }
}

#[cfg(test)]
mod test {
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    use super::*;
    use crate::protocol::{AsyncResponse, SyncResponse, MAX_RESPONSE_DATA_LEN};

    const SYNC: [u8; 11] = [0xff, 0xff, 0x00, 0x02, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0xe8];
    const ASYNC: [u8; 11] = [0xff, 0xfe, 0x0a, 0x00, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0xe0];
    const SHORT: [u8; 6] = [0xff, 0xff, 0x00, 0x02, 0x01, 0xfc];

    fn short_response() -> Response {
        Response::Sync(SyncResponse {
            sop1: 0xff,
            sop2: 0xff,
            mrsp: 0x00,
            seq: 0x02,
            dlen: 0x01,
            data: vec![],
            checksum: 0xfc,
        })
    }

    #[test]
    fn new_is_empty() {
        let codec = Codec::new();
        assert!(codec.pending().is_empty());
    }

    #[test]
    fn parse_sync() {
        let mut codec = Codec::new();
        let res = codec.parse(&SYNC);
        assert_eq!(
            res,
            Some(Response::Sync(SyncResponse {
                sop1: 0xff,
                sop2: 0xff,
                mrsp: 0x00,
                seq: 0x02,
                dlen: 0x06,
                data: vec![0x05, 0x04, 0x03, 0x02, 0x01],
                checksum: 0xe8,
            }))
        );
        assert!(codec.pending().is_empty());
    }

    #[test]
    fn parse_async() {
        let mut codec = Codec::new();
        let res = codec.parse(&ASYNC);
        assert_eq!(
            res,
            Some(Response::Async(AsyncResponse {
                sop1: 0xff,
                sop2: 0xfe,
                id_code: 0x0a,
                dlen_msb: 0x00,
                dlen_lsb: 0x06,
                dlen: 0x06,
                data: vec![0x05, 0x04, 0x03, 0x02, 0x01],
                checksum: 0xe0,
            }))
        );
    }

    #[test]
    fn parse_bad_checksum() {
        let mut codec = Codec::with_listener(Vec::new());
        let mut data = SYNC;
        data[10] = 0xee;

        assert_eq!(codec.parse(&data), None);
        assert!(codec.pending().is_empty());
        assert_eq!(
            codec.listener(),
            &[PacketError::Checksum {
                calculated: 0xe8,
                provided: 0xee,
            }]
        );
        assert_eq!(
            codec.listener()[0].to_string(),
            "Incorrect checksum, packet discarded"
        );
    }

    #[test]
    fn bad_checksum_discards_rest() {
        let mut codec = Codec::with_listener(Vec::new());
        let mut data = SHORT.to_vec();
        data[5] = 0x00;
        data.extend_from_slice(&SYNC);

        assert_eq!(codec.parse(&data), None);
        assert!(codec.pending().is_empty());
        assert_eq!(codec.parse(&[]), None);
        assert_eq!(codec.listener().len(), 1);
    }

    #[test]
    fn parse_less_than_min_size() {
        let mut codec = Codec::new();
        assert_eq!(codec.parse(&[0xff, 0xff, 0x00, 0x02]), None);
        assert_eq!(codec.pending(), [0xff, 0xff, 0x00, 0x02]);
    }

    #[test]
    fn parse_less_than_expected_size() {
        let mut codec = Codec::new();
        assert_eq!(codec.parse(&[0xff, 0xff, 0x00, 0x02, 0x06, 0x01, 0x02]), None);
        assert_eq!(codec.pending().len(), 7);
    }

    #[test]
    fn parse_more_than_expected_size() {
        let mut codec = Codec::new();
        let res = codec.parse(&[0xff, 0xff, 0x00, 0x02, 0x01, 0xfc, 0xff, 0xff, 0x00]);
        assert_eq!(res, Some(short_response()));
        assert_eq!(codec.pending(), [0xff, 0xff, 0x00]);
    }

    #[test]
    fn bad_sops_held_once() {
        let mut codec = Codec::new();
        let garbage = [0xf0, 0x00, 0x02, 0x01, 0xfc, 0x00];
        assert_eq!(codec.parse(&garbage), None);
        assert_eq!(codec.pending(), garbage);

        assert_eq!(codec.parse(&garbage), None);
        assert!(codec.pending().is_empty());
    }

    #[test]
    fn garbage_prefix_is_not_skipped() {
        let mut codec = Codec::new();
        let mut data = vec![0x00];
        data.extend_from_slice(&SHORT);

        // a whole packet sits behind one bad byte, but is still thrown out
        assert_eq!(codec.parse(&data), None);
        assert_eq!(codec.pending(), data);
        assert_eq!(codec.parse(&[]), None);
        assert!(codec.pending().is_empty());
    }

    #[test]
    fn packet_after_garbage_is_dropped() {
        let mut codec = Codec::new();
        let garbage = [0xf0, 0x00, 0x02, 0x01, 0xfc, 0x00];
        assert_eq!(codec.parse(&garbage), None);
        assert_eq!(codec.pending(), garbage);

        assert_eq!(codec.parse(&SHORT), None);
        assert!(codec.pending().is_empty());

        // back in sync after that
        assert_eq!(codec.parse(&SHORT), Some(short_response()));
    }

    #[test]
    fn bad_sops_short_chunk() {
        // too short to check SOPs at all, so it is held
        let mut codec = Codec::new();
        assert_eq!(codec.parse(&[0xf0, 0x00, 0x02, 0x01, 0xfc]), None);
        assert_eq!(codec.pending().len(), 5);
    }

    #[test]
    fn bad_sops_after_pending() {
        let mut codec = Codec::new();
        assert_eq!(codec.parse(&[0xff]), None);
        assert_eq!(codec.parse(&[0xf0, 0x00, 0x02, 0x01, 0xfc]), None);
        assert!(codec.pending().is_empty());
    }

    #[test]
    fn bad_sop2_after_pending() {
        let mut codec = Codec::new();
        assert_eq!(codec.parse(&[0xff, 0xfc, 0x00]), None);
        assert_eq!(codec.parse(&[0x02, 0x01, 0xfc]), None);
        assert!(codec.pending().is_empty());
    }

    #[test]
    fn completes_pending() {
        let mut codec = Codec::new();
        assert_eq!(codec.parse(&[0xff]), None);
        let res = codec.parse(&[0xff, 0x00, 0x02, 0x01, 0xfc]);
        assert_eq!(res, Some(short_response()));
        assert!(codec.pending().is_empty());
    }

    #[test]
    fn two_packets_one_chunk() {
        let mut codec = Codec::new();
        let mut data = SYNC.to_vec();
        data.extend_from_slice(&ASYNC);

        let first = codec.parse(&data).unwrap();
        assert_eq!(first.to_bytes(), SYNC);
        assert_eq!(codec.pending(), ASYNC);

        let second = codec.parse(&[]).unwrap();
        assert_eq!(second.to_bytes(), ASYNC);
        assert!(codec.pending().is_empty());

        assert_eq!(codec.parse(&[]), None);
    }

    #[test]
    fn zero_length() {
        let mut codec = Codec::with_listener(Vec::new());
        assert_eq!(codec.parse(&[0xff, 0xff, 0x00, 0x02, 0x00, 0xfd]), None);
        assert!(codec.pending().is_empty());
        assert_eq!(codec.listener(), &[PacketError::ZeroLength]);
    }

    #[test]
    fn empty_chunk() {
        let mut codec = Codec::new();
        assert_eq!(codec.parse(&[]), None);
        assert!(codec.pending().is_empty());
    }

    #[test]
    fn create_does_not_touch_buffer() {
        let mut codec = Codec::new();
        codec.parse(&[0xff, 0xff]);
        let cmd = Command::new(0x00, 0x01).with_data(vec![0x04, 0x05, 0x06, 0x07, 0x08]);
        let bytes = codec.create(&cmd).unwrap();
        assert_eq!(bytes.len(), 12);
        assert_eq!(codec.pending(), [0xff, 0xff]);
    }

    #[test]
    fn closure_listener() {
        let mut count = 0;
        let mut codec = Codec::with_listener(OnError(|_: PacketError| count += 1));
        let mut data = SYNC;
        data[10] = 0x00;
        codec.parse(&data);
        codec.parse(&data);
        drop(codec);
        assert_eq!(count, 2);
    }

    #[test]
    fn free_returns_listener() {
        let mut codec = Codec::with_listener(Vec::new());
        codec.parse(&[0xff, 0xff, 0x00, 0x02, 0x00, 0xfd]);
        assert_eq!(codec.free(), [PacketError::ZeroLength]);
    }

    #[test]
    #[cfg(feature = "std")]
    fn channel_listener() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut codec = Codec::with_listener(tx);
        let mut data = ASYNC;
        data[10] = 0x00;
        codec.parse(&data);
        assert_eq!(
            rx.try_recv(),
            Ok(PacketError::Checksum {
                calculated: 0xe0,
                provided: 0x00,
            })
        );
    }

    #[derive(Debug, Clone)]
    struct Packets(Vec<Response>);

    impl Arbitrary for Packets {
        fn arbitrary(g: &mut Gen) -> Self {
            let count = usize::arbitrary(g) % 5 + 1;
            Packets((0..count).map(|_| Response::arbitrary(g)).collect())
        }
    }

    fn collect_chunked(codec: &mut Codec, stream: &[u8], chunk_size: usize) -> Vec<Response> {
        let mut out = Vec::new();
        for chunk in stream.chunks(chunk_size) {
            let mut res = codec.parse(chunk);
            while let Some(r) = res {
                out.push(r);
                res = codec.parse(&[]);
            }
        }
        out
    }

    #[quickcheck]
    fn byte_by_byte(res: Response) -> bool {
        let bytes = res.to_bytes();
        let mut codec = Codec::new();

        let (last, init) = bytes.split_last().expect("packets are never empty");
        let quiet = init.iter().all(|b| codec.parse(&[*b]).is_none());
        quiet && codec.parse(&[*last]) == Some(res)
    }

    #[quickcheck]
    fn any_chunking(packets: Packets, chunk_size: usize) -> bool {
        let stream: Vec<u8> = packets.0.iter().flat_map(|r| r.to_bytes()).collect();
        let mut codec = Codec::new();
        let out = collect_chunked(&mut codec, &stream, chunk_size % 32 + 1);
        out == packets.0 && codec.pending().is_empty()
    }

    /// Anything that passes the frame checks parses as a response.
    #[quickcheck]
    fn checked_frames_parse(sync: bool, a: u8, b: u8, data: Vec<u8>) -> bool {
        let mut data = data;
        data.truncate(MAX_RESPONSE_DATA_LEN);
        let sop2 = if sync { 0xff } else { 0xfe };
        let mut packet = vec![0xff, sop2, a, b, data.len() as u8 + 1];
        packet.extend_from_slice(&data);
        packet.push(checksum(&packet[2..]));

        let mut codec = Codec::new();
        match codec.parse(&packet) {
            Some(res) => res.sop2() == sop2 && res.data() == &data,
            None => false,
        }
    }

    #[quickcheck]
    fn command_roundtrip(cmd: Command) -> bool {
        let codec = Codec::new();
        let Ok(bytes) = codec.create(&cmd) else {
            return false;
        };
        match Command::parse(&bytes[..]) {
            Ok((_, parsed)) => {
                parsed.did == cmd.did
                    && parsed.cid == cmd.cid
                    && parsed.seq == cmd.seq
                    && bytes[bytes.len() - 1] == checksum(&bytes[2..bytes.len() - 1])
            }
            Err(_) => false,
        }
    }
}
