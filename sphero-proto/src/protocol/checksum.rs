//! The protocol's 8-bit checksum: the bitwise complement of the byte
//! sum, modulo 256.

/// Interface for a running checksum.
pub trait Digest {
    fn update(&mut self, bytes: &[u8]);
    fn finalize(self) -> u8;
}

/// A running complement-of-sum checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChecksumDigest {
    sum: u8,
}

impl ChecksumDigest {
    pub const fn new() -> Self {
        Self { sum: 0 }
    }

    /// The sum so far, modulo 256.
    pub const fn sum(&self) -> u8 {
        self.sum
    }
}

impl Digest for ChecksumDigest {
    fn update(&mut self, bytes: &[u8]) {
        self.sum = bytes.iter().fold(self.sum, |acc, b| acc.wrapping_add(*b));
    }

    fn finalize(self) -> u8 {
        !self.sum
    }
}

/// Compute the checksum over a range of bytes.
///
/// An empty range sums to zero, so its checksum is `0xff`.
pub fn checksum(bytes: &[u8]) -> u8 {
    let mut digest = ChecksumDigest::new();
    digest.update(bytes);
    digest.finalize()
}
