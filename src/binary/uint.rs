use crate::types::UInt;

/// A fixed-length, big-endian unsigned integer decoded from a binary stream, along with
/// the number of bytes its encoding occupied. Unlike a VarUInt, a UInt has no terminator;
/// its length always comes from an enclosing header.
///
/// See the
/// [UInt fields](https://amazon-ion.github.io/ion-docs/docs/binary.html#uint-and-int-fields)
/// section of the binary Ion spec.
#[derive(Debug, PartialEq, Eq)]
pub struct DecodedUInt {
    value: UInt,
    size_in_bytes: usize,
}

impl DecodedUInt {
    pub(crate) fn new(value: UInt, size_in_bytes: usize) -> Self {
        DecodedUInt {
            value,
            size_in_bytes,
        }
    }

    /// Folds up to eight big-endian bytes into a `u64`. Passing a longer slice quietly
    /// discards the high-order bytes; callers bound the length first.
    pub(crate) fn small_uint_from_slice(uint_bytes: &[u8]) -> u64 {
        uint_bytes
            .iter()
            .fold(0u64, |magnitude, &byte| (magnitude << 8) | u64::from(byte))
    }

    /// The decoded magnitude.
    #[inline(always)]
    pub fn value(&self) -> &UInt {
        &self.value
    }

    /// How many bytes of the stream the encoding occupied.
    #[inline(always)]
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_bytes_fold_left_to_right() {
        assert_eq!(DecodedUInt::small_uint_from_slice(&[]), 0);
        assert_eq!(DecodedUInt::small_uint_from_slice(&[0x2A]), 42);
        assert_eq!(DecodedUInt::small_uint_from_slice(&[0x01, 0x00]), 256);
        assert_eq!(
            DecodedUInt::small_uint_from_slice(&[0xFF; 8]),
            u64::MAX
        );
    }
}
