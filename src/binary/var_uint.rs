/// A variable-length unsigned integer decoded from a binary stream, along with the number
/// of stream bytes its encoding occupied. The encoded size matters as much as the value:
/// the cursor uses it to compute the extents of the fields and values it walks over.
///
/// The decoding logic lives in
/// [`BinaryBuffer::read_var_uint`](crate::binary::buffer::BinaryBuffer::read_var_uint);
/// see the
/// [VarUInt fields](https://amazon-ion.github.io/ion-docs/docs/binary.html#varuint-and-varint-fields)
/// section of the binary Ion spec for the encoding itself.
#[derive(Debug, PartialEq, Eq)]
pub struct VarUInt {
    value: usize,
    size_in_bytes: usize,
}

impl VarUInt {
    pub(crate) fn new(value: usize, size_in_bytes: usize) -> Self {
        VarUInt {
            value,
            size_in_bytes,
        }
    }

    /// The decoded magnitude.
    #[inline(always)]
    pub fn value(&self) -> usize {
        self.value
    }

    /// How many bytes of the stream the encoding occupied.
    #[inline(always)]
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }
}
