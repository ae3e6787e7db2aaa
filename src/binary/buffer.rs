use crate::binary::constants::v1_0::{length_codes, IVM};
use crate::binary::type_descriptor::{Header, TypeDescriptor, ION_1_0_TYPE_DESCRIPTORS};
use crate::binary::uint::DecodedUInt;
use crate::binary::var_uint::VarUInt;
use crate::result::{decoding_error, incomplete_data_error, incomplete_data_error_raw, IonResult};
use crate::types::{IonType, UInt};
use num_bigint::BigUint;
use std::mem;

// UInts larger than this are rejected rather than decoded. The limit is far beyond anything
// seen in practice; it exists so a corrupt length field cannot provoke a giant allocation.
const MAX_UINT_SIZE_IN_BYTES: usize = 2048;

/// A reader for Ion's binary encoding primitives, layered over any `AsRef<[u8]>`.
///
/// A `BinaryBuffer` tracks two things: the window of bytes it has not read yet
/// (`start..end`) and the absolute stream offset of the first unread byte
/// (`total_consumed`). Keeping the offset absolute means a buffer created over a slice from
/// the middle of a stream still reports positions that make sense to the end user.
///
/// Every `read_*` method consumes the bytes it decodes; the `peek_*` methods do not. When a
/// primitive extends past the end of the window, the method returns an `Incomplete` error
/// and consumes nothing, so the same read can be reattempted once more bytes are available.
#[derive(Debug, PartialEq)]
pub(crate) struct BinaryBuffer<A: AsRef<[u8]>> {
    data: A,
    start: usize,
    end: usize,
    total_consumed: usize,
}

impl<A: AsRef<[u8]>> BinaryBuffer<A> {
    /// A buffer whose first byte is the beginning of the stream.
    #[inline]
    pub fn new(data: A) -> BinaryBuffer<A> {
        Self::new_at_offset(data, 0)
    }

    /// A buffer whose first byte lies `offset` bytes into the stream.
    #[inline]
    pub fn new_at_offset(data: A, offset: usize) -> BinaryBuffer<A> {
        let end = data.as_ref().len();
        BinaryBuffer {
            data,
            start: 0,
            end,
            total_consumed: offset,
        }
    }

    /// All of the unread bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data.as_ref()[self.start..self.end]
    }

    /// A sub-slice of the unread bytes, `offset..offset + length`. The caller must already
    /// have verified that the buffer holds `offset + length` bytes.
    pub fn bytes_range(&self, offset: usize, length: usize) -> &[u8] {
        let from = self.start + offset;
        &self.data.as_ref()[from..from + length]
    }

    /// The absolute stream offset of the next unread byte.
    pub fn total_consumed(&self) -> usize {
        self.total_consumed
    }

    /// The number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The next unread byte, if there is one.
    pub fn peek_next_byte(&self) -> Option<u8> {
        self.data.as_ref().get(self.start).copied()
    }

    /// The next `n` unread bytes, if the buffer holds that many.
    pub fn peek_n_bytes(&self, n: usize) -> Option<&[u8]> {
        self.data.as_ref().get(self.start..self.start + n)
    }

    /// Marks the next `num_bytes_to_consume` bytes as read. Callers pair this with the
    /// `peek_*` methods; the `read_*` methods consume on their own when they succeed.
    #[inline]
    pub fn consume(&mut self, num_bytes_to_consume: usize) {
        debug_assert!(num_bytes_to_consume <= self.remaining());
        self.start += num_bytes_to_consume;
        self.total_consumed += num_bytes_to_consume;
    }

    /// Interprets (without consuming) the next byte as a [TypeDescriptor].
    pub fn peek_type_descriptor(&self) -> IonResult<TypeDescriptor> {
        match self.peek_next_byte() {
            Some(byte) => Ok(ION_1_0_TYPE_DESCRIPTORS[byte as usize]),
            None => incomplete_data_error("a type descriptor", self.total_consumed()),
        }
    }

    /// Reads a four-byte Ion version marker, returning its `(major, minor)` version pair.
    ///
    /// See: <https://amazon-ion.github.io/ion-docs/docs/binary.html#value-streams>
    pub fn read_ivm(&mut self) -> IonResult<(u8, u8)> {
        let bytes = self
            .peek_n_bytes(IVM.len())
            .ok_or_else(|| incomplete_data_error_raw("an IVM", self.total_consumed()))?;

        match bytes {
            [0xE0, major, minor, 0xEA] => {
                let version = (*major, *minor);
                self.consume(IVM.len());
                Ok(version)
            }
            invalid_ivm => decoding_error(format!("invalid IVM: {invalid_ivm:?}")),
        }
    }

    /// Reads a `VarUInt` primitive: 7 bits of magnitude per byte, big-endian, with the high
    /// bit of the final byte set.
    ///
    /// See: <https://amazon-ion.github.io/ion-docs/docs/binary.html#varuint-and-varint-fields>
    pub fn read_var_uint(&mut self) -> IonResult<VarUInt> {
        const BITS_PER_ENCODED_BYTE: usize = 7;
        const MAX_ENCODED_SIZE_IN_BYTES: usize =
            (mem::size_of::<usize>() * 8) / BITS_PER_ENCODED_BYTE;
        const LOWER_7_BITMASK: u8 = 0b0111_1111;
        const TERMINATOR_BIT: u8 = 0b1000_0000;

        let mut magnitude: usize = 0;
        for (index, byte) in self.bytes().iter().copied().enumerate() {
            magnitude = (magnitude << BITS_PER_ENCODED_BYTE) | (byte & LOWER_7_BITMASK) as usize;
            if byte & TERMINATOR_BIT != 0 {
                let encoded_size_in_bytes = index + 1;
                if encoded_size_in_bytes > MAX_ENCODED_SIZE_IN_BYTES {
                    return decoding_error(format!(
                        "found a {encoded_size_in_bytes}-byte VarUInt; the largest supported size \
                         is {MAX_ENCODED_SIZE_IN_BYTES} bytes"
                    ));
                }
                self.consume(encoded_size_in_bytes);
                return Ok(VarUInt::new(magnitude, encoded_size_in_bytes));
            }
        }
        // No byte in the window had its terminator bit set.
        incomplete_data_error("a VarUInt", self.total_consumed() + self.remaining())
    }

    /// Reads the next `length` bytes as a big-endian `UInt` primitive.
    ///
    /// See: <https://amazon-ion.github.io/ion-docs/docs/binary.html#uint-and-int-fields>
    pub fn read_uint(&mut self, length: usize) -> IonResult<DecodedUInt> {
        if length <= mem::size_of::<u64>() {
            return self.read_small_uint(length);
        }
        self.read_big_uint(length)
    }

    // The common case: a UInt that fits in a u64.
    #[inline]
    fn read_small_uint(&mut self, length: usize) -> IonResult<DecodedUInt> {
        let uint_bytes = self
            .peek_n_bytes(length)
            .ok_or_else(|| incomplete_data_error_raw("a UInt", self.total_consumed()))?;
        let magnitude = DecodedUInt::small_uint_from_slice(uint_bytes);
        self.consume(length);
        Ok(DecodedUInt::new(UInt::U64(magnitude), length))
    }

    // Oversized magnitudes are rare; keeping this out of line keeps `read_uint` small
    // enough for the compiler to inline it on the hot path.
    #[inline(never)]
    fn read_big_uint(&mut self, length: usize) -> IonResult<DecodedUInt> {
        if length > MAX_UINT_SIZE_IN_BYTES {
            return decoding_error(format!(
                "found a {length}-byte UInt; the largest supported size is \
                 {MAX_UINT_SIZE_IN_BYTES} bytes"
            ));
        }
        let uint_bytes = self
            .peek_n_bytes(length)
            .ok_or_else(|| incomplete_data_error_raw("a UInt", self.total_consumed()))?;
        let magnitude = BigUint::from_bytes_be(uint_bytes);
        self.consume(length);
        Ok(DecodedUInt::new(UInt::BigUInt(magnitude), length))
    }

    /// Reads a NOP pad: a type descriptor (and possibly a length field) followed by bytes
    /// that carry no value. Returns the total number of bytes the pad occupied.
    ///
    /// See: <https://amazon-ion.github.io/ion-docs/docs/binary.html#nop-pad>
    #[inline(never)]
    // Few writers emit NOP padding; isolating this logic keeps it off the hot path.
    pub fn read_nop_pad(&mut self) -> IonResult<usize> {
        let type_descriptor = self.peek_type_descriptor()?;
        self.consume(1);
        let length = self.read_length(type_descriptor.length_code)?;
        if self.remaining() < length.value() {
            return incomplete_data_error("a NOP", self.total_consumed());
        }
        self.consume(length.value());
        Ok(1 + length.size_in_bytes() + length.value())
    }

    /// Determines the length of the value body that follows `header`, reading a trailing
    /// length `VarUInt` when the header calls for one. When no extra bytes were needed, the
    /// returned [VarUInt] reports a `size_in_bytes()` of `0`.
    pub fn read_value_length(&mut self, header: Header) -> IonResult<VarUInt> {
        use IonType::*;
        let length_code = match header.ion_type {
            // Null and boolean values are encoded entirely in the header byte.
            Null | Bool => 0,
            // A struct with length code 1 is an "ordered struct": its real length follows
            // as a VarUInt. This cursor gives ordered structs no special treatment beyond
            // reading that length.
            Struct if header.length_code == 1 => length_codes::VAR_UINT,
            _ => header.length_code,
        };

        let length = self.read_length(length_code)?;

        // A handful of encodings restrict which lengths are legal.
        match header.ion_type {
            Float => match header.length_code {
                0 | 4 | 8 | 15 => {}
                _ => return decoding_error("found a float with an illegal length code"),
            },
            Timestamp if !header.is_null() && length.value() <= 1 => {
                return decoding_error("found a timestamp with length <= 1")
            }
            Struct if header.length_code == 1 && length.value() == 0 => {
                return decoding_error("found an empty ordered struct")
            }
            _ => {}
        };

        Ok(length)
    }

    /// Interprets a type descriptor's length nibble: `0xF` means a typed null (length 0),
    /// `0xE` means the length follows as a VarUInt, and anything else is the length itself.
    pub fn read_length(&mut self, length_code: u8) -> IonResult<VarUInt> {
        let length = match length_code {
            length_codes::NULL => VarUInt::new(0, 0),
            length_codes::VAR_UINT => self.read_var_uint()?,
            magnitude => VarUInt::new(magnitude as usize, 0),
        };

        Ok(length)
    }
}

impl<A: AsRef<[u8]>> From<A> for BinaryBuffer<A> {
    fn from(data: A) -> Self {
        BinaryBuffer::new(data)
    }
}

/// Methods available only when the buffer wraps a borrowed slice, where sub-buffers can
/// outlive the parent `BinaryBuffer` value.
impl<'a> BinaryBuffer<&'a [u8]> {
    /// Splits off the next `length` bytes as an independent `BinaryBuffer` that remembers
    /// its absolute offset, consuming them from this buffer. Parsing a container's body
    /// through a sub-buffer guarantees the parser cannot stray beyond it.
    pub fn take_sub_buffer(&mut self, length: usize) -> IonResult<BinaryBuffer<&'a [u8]>> {
        if self.remaining() < length {
            return incomplete_data_error("a sub-buffer", self.total_consumed());
        }
        let data: &'a [u8] = self.data;
        let bytes = &data[self.start..self.start + length];
        let offset = self.total_consumed();
        self.consume(length);
        Ok(BinaryBuffer::new_at_offset(bytes, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IonError;
    use num_traits::Num;

    #[test]
    fn read_var_uint() -> IonResult<()> {
        let mut buffer = BinaryBuffer::new(&[0b0111_1001, 0b0000_1111, 0b1000_0001]);
        let var_uint = buffer.read_var_uint()?;
        assert_eq!(var_uint.size_in_bytes(), 3);
        assert_eq!(var_uint.value(), 1_984_385);
        assert_eq!(buffer.total_consumed(), 3);
        Ok(())
    }

    #[test]
    fn read_var_uint_single_byte() -> IonResult<()> {
        let mut buffer = BinaryBuffer::new(&[0b1000_0000, 0b0000_0001]);
        let var_uint = buffer.read_var_uint()?;
        assert_eq!(var_uint.size_in_bytes(), 1);
        assert_eq!(var_uint.value(), 0);
        // The byte after the VarUInt is untouched.
        assert_eq!(buffer.remaining(), 1);
        Ok(())
    }

    #[test]
    fn unterminated_var_uint_is_incomplete_and_consumes_nothing() {
        let mut buffer = BinaryBuffer::new(&[0b0111_1001, 0b0000_1111]);
        match buffer.read_var_uint() {
            Err(IonError::Incomplete { .. }) => {}
            other => panic!("expected IonError::Incomplete, but found: {other:?}"),
        }
        assert_eq!(buffer.total_consumed(), 0);
        assert_eq!(buffer.remaining(), 2);
    }

    #[test]
    fn overlong_var_uint_is_rejected() {
        let mut bytes = vec![0b0111_1111; 10];
        bytes.push(0b1111_1111);
        let mut buffer = BinaryBuffer::new(bytes);
        buffer
            .read_var_uint()
            .expect_err("an 11-byte VarUInt should overflow a usize");
    }

    #[test]
    fn read_two_byte_uint() -> IonResult<()> {
        let mut buffer = BinaryBuffer::new(&[0b1000_0000, 0b0000_0001]);
        let uint = buffer.read_uint(buffer.remaining())?;
        assert_eq!(uint.size_in_bytes(), 2);
        assert_eq!(uint.value(), &UInt::U64(32_769));
        Ok(())
    }

    #[test]
    fn read_ten_byte_uint() -> IonResult<()> {
        let mut buffer = BinaryBuffer::new(vec![0xFFu8; 10]);
        let uint = buffer.read_uint(buffer.remaining())?;
        assert_eq!(uint.size_in_bytes(), 10);
        assert_eq!(
            uint.value(),
            &UInt::BigUInt(BigUint::from_str_radix("ffffffffffffffffffff", 16).unwrap())
        );
        Ok(())
    }

    #[test]
    fn read_ivm_and_track_offsets() -> IonResult<()> {
        let mut buffer = BinaryBuffer::new(&[0xE0, 0x01, 0x00, 0xEA, 0x20]);
        assert_eq!(buffer.read_ivm()?, (1, 0));
        assert_eq!(buffer.total_consumed(), 4);
        assert_eq!(buffer.remaining(), 1);
        Ok(())
    }

    #[test]
    fn read_invalid_ivm() {
        let mut buffer = BinaryBuffer::new(&[0xE0, 0x01, 0x00, 0xEB]);
        buffer
            .read_ivm()
            .expect_err("0xEB is not a valid IVM terminator");
    }

    #[test]
    fn read_nop_pad() -> IonResult<()> {
        // 0x03 is a 4-byte NOP: the type descriptor plus three bytes of padding.
        let mut buffer = BinaryBuffer::new(&[0x03, 0x00, 0x00, 0x00, 0x20]);
        let bytes_skipped = buffer.read_nop_pad()?;
        assert_eq!(bytes_skipped, 4);
        assert_eq!(buffer.peek_next_byte(), Some(0x20));
        Ok(())
    }

    #[test]
    fn take_sub_buffer_preserves_offsets() -> IonResult<()> {
        let mut buffer = BinaryBuffer::new(&[0x01, 0x02, 0x03, 0x04][..]);
        buffer.consume(1);
        let sub_buffer = buffer.take_sub_buffer(2)?;
        assert_eq!(sub_buffer.total_consumed(), 1);
        assert_eq!(sub_buffer.bytes(), &[0x02, 0x03]);
        // The parent buffer has moved past the split-off bytes.
        assert_eq!(buffer.peek_next_byte(), Some(0x04));
        assert!(buffer.take_sub_buffer(2).is_err());
        Ok(())
    }
}
