//! 32-bit word ⇄ byte decomposition.
//!
//! The register bus is one byte wide, so every 32-bit quantity crosses it
//! as four single-byte accesses. Which byte sits at `offset + 0` is a
//! property of the accelerator build, not of the host.

/// Byte order of a multi-byte word in register space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// `offset + 0` holds the least-significant byte (reference build).
    #[default]
    LittleEndian,
    /// `offset + 0` holds the most-significant byte.
    BigEndian,
}

impl ByteOrder {
    /// Split `value` into the bytes stored at `offset + 0 .. offset + 4`.
    pub const fn decompose(self, value: u32) -> [u8; 4] {
        match self {
            Self::LittleEndian => value.to_le_bytes(),
            Self::BigEndian => value.to_be_bytes(),
        }
    }

    /// Rebuild a word from the bytes at `offset + 0 .. offset + bytes.len()`.
    ///
    /// Shorter slices yield a zero-extended value; at most four bytes are
    /// significant.
    pub fn compose(self, bytes: &[u8]) -> u32 {
        let fold = |acc: u32, &b: &u8| (acc << 8) | u32::from(b);
        match self {
            Self::LittleEndian => bytes.iter().rev().fold(0, fold),
            Self::BigEndian => bytes.iter().fold(0, fold),
        }
    }

    /// Register-relative offsets in the order the most-significant byte
    /// comes first, for `n` bytes.
    ///
    /// Reads walk the word in this order so the host sees the high byte
    /// first, as the status counter was always sampled.
    pub fn msb_first_offsets(self, n: u32) -> impl Iterator<Item = u32> {
        let (little, big) = match self {
            Self::LittleEndian => (Some((0..n).rev()), None),
            Self::BigEndian => (None, Some(0..n)),
        };
        little.into_iter().flatten().chain(big.into_iter().flatten())
    }
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LittleEndian => write!(f, "little-endian"),
            Self::BigEndian => write!(f, "big-endian"),
        }
    }
}
