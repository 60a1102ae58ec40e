//! Cheap checks run against the front of a receive buffer before a
//! packet is extracted from it.

use super::{HEADER_LEN, MIN_PACKET_SIZE, SOP1, SOP2_ASYNC, SOP2_SYNC};

/// Which kind of response a packet holds, as selected by SOP2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    /// Reply to a command.
    Sync,
    /// Message sent by the device on its own.
    Async,
}

impl Variant {
    /// The SOP2 byte that selects this variant.
    pub const fn sop2(&self) -> u8 {
        match self {
            Self::Sync => SOP2_SYNC,
            Self::Async => SOP2_ASYNC,
        }
    }
}

/// Check both start-of-packet bytes, returning the response variant
/// they select.
///
/// Returns [None] if SOP1 is wrong, SOP2 is not a known variant, or
/// there are fewer than two bytes to look at.
pub fn check_sops(buffer: &[u8]) -> Option<Variant> {
    match buffer {
        [SOP1, SOP2_SYNC, ..] => Some(Variant::Sync),
        [SOP1, SOP2_ASYNC, ..] => Some(Variant::Async),
        _ => None,
    }
}

/// Check whether the buffer holds as many bytes as the length field
/// at offset 4 declares.
///
/// Returns the length of the whole buffer if so, and [None] if more
/// data is needed.
pub fn check_expected_size(buffer: &[u8]) -> Option<usize> {
    let dlen = *buffer.get(HEADER_LEN - 1)?;
    if buffer.len() >= HEADER_LEN + dlen as usize {
        Some(buffer.len())
    } else {
        None
    }
}

/// Check whether the buffer could hold at least the smallest packet.
pub fn check_min_size(buffer: &[u8]) -> bool {
    buffer.len() >= MIN_PACKET_SIZE
}

/// Total size of the packet at the front of the buffer, according to
/// its length field.
pub(crate) fn declared_size(buffer: &[u8]) -> Option<usize> {
    buffer
        .get(HEADER_LEN - 1)
        .map(|dlen| HEADER_LEN + *dlen as usize)
}
