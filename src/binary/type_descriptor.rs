use crate::binary::constants::v1_0::length_codes;
use crate::binary::nibbles::nibbles_from_byte;
use crate::binary::type_code::IonTypeCode;
use crate::types::IonType;

/// Everything the first byte of a binary item declares about it: its encoding-level type
/// code, the user-level [IonType] it corresponds to (when it is a value at all), and its
/// raw length nibble. One of these precedes every value, annotations wrapper, IVM, and
/// NOP in a binary Ion stream.
///
/// See the
/// [Typed Value Formats](https://amazon-ion.github.io/ion-docs/docs/binary.html#typed-value-formats)
/// section of the binary Ion spec.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct TypeDescriptor {
    pub ion_type_code: IonTypeCode,
    pub ion_type: Option<IonType>,
    pub length_code: u8,
}

/// Every possible header byte, pre-interpreted at compile time. Indexing this table with
/// the raw byte replaces masking and shifting on the hot path.
pub(crate) const ION_1_0_TYPE_DESCRIPTORS: &[TypeDescriptor; 256] = &build_jump_table();

const fn build_jump_table() -> [TypeDescriptor; 256] {
    let empty = TypeDescriptor {
        ion_type_code: IonTypeCode::NullOrNop,
        ion_type: None,
        length_code: 0,
    };
    let mut table = [empty; 256];
    let mut byte: usize = 0;
    while byte < 256 {
        table[byte] = TypeDescriptor::from_byte(byte as u8);
        byte += 1;
    }
    table
}

impl TypeDescriptor {
    /// Interprets a header byte as a (type code, length code) nibble pair.
    pub const fn from_byte(byte: u8) -> TypeDescriptor {
        use IonTypeCode::*;
        let (type_nibble, length_code) = nibbles_from_byte(byte);
        // Each type code pins down the IonType as well, except for code 0 (where the
        // length nibble separates NOP padding from untyped null) and the three non-value
        // codes.
        let (ion_type_code, ion_type) = match type_nibble {
            0 if length_code == length_codes::NULL => (NullOrNop, Some(IonType::Null)),
            0 => (NullOrNop, None),
            1 => (Boolean, Some(IonType::Bool)),
            2 => (PositiveInteger, Some(IonType::Int)),
            3 => (NegativeInteger, Some(IonType::Int)),
            4 => (Float, Some(IonType::Float)),
            5 => (Decimal, Some(IonType::Decimal)),
            6 => (Timestamp, Some(IonType::Timestamp)),
            7 => (Symbol, Some(IonType::Symbol)),
            8 => (String, Some(IonType::String)),
            9 => (Clob, Some(IonType::Clob)),
            10 => (Blob, Some(IonType::Blob)),
            11 => (List, Some(IonType::List)),
            12 => (SExpression, Some(IonType::SExp)),
            13 => (Struct, Some(IonType::Struct)),
            14 => (AnnotationOrIvm, None),
            15 => (Reserved, None),
            _ => panic!("a nibble cannot exceed 15"),
        };
        TypeDescriptor {
            ion_type_code,
            ion_type,
            length_code,
        }
    }

    pub fn is_null(&self) -> bool {
        self.ion_type.is_some() && self.length_code == length_codes::NULL
    }

    pub fn is_nop(&self) -> bool {
        self.ion_type_code == IonTypeCode::NullOrNop && self.length_code != length_codes::NULL
    }

    pub fn is_ivm_start(&self) -> bool {
        self.ion_type_code == IonTypeCode::AnnotationOrIvm && self.length_code == 0
    }

    pub fn is_annotation_wrapper(&self) -> bool {
        self.ion_type_code == IonTypeCode::AnnotationOrIvm && self.length_code > 0
    }

    /// Narrows this descriptor to a value [Header], or `None` if the byte does not begin
    /// a value (NOP padding, an IVM, an annotations wrapper, or the reserved code).
    #[inline]
    pub fn to_header(self) -> Option<Header> {
        let ion_type = self.ion_type?;
        Some(Header {
            ion_type,
            ion_type_code: self.ion_type_code,
            length_code: self.length_code,
        })
    }
}

/// A [TypeDescriptor] that is known to begin a value. Code that has already ruled out
/// NOPs, IVMs, and annotation wrappers works with a `Header` so it can carry an `IonType`
/// rather than re-checking an `Option` at every use.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub ion_type: IonType,
    // Retained alongside the IonType because it distinguishes positive from negative
    // integer encodings.
    pub ion_type_code: IonTypeCode,
    pub length_code: u8,
}

impl Header {
    pub fn is_null(&self) -> bool {
        self.length_code == length_codes::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_table_classifies_well_known_bytes() {
        let ivm_start = ION_1_0_TYPE_DESCRIPTORS[0xE0];
        assert!(ivm_start.is_ivm_start());
        assert!(ION_1_0_TYPE_DESCRIPTORS[0xE3].is_annotation_wrapper());
        assert!(ION_1_0_TYPE_DESCRIPTORS[0x0F].is_null());
        assert!(ION_1_0_TYPE_DESCRIPTORS[0x00].is_nop());
        assert!(ION_1_0_TYPE_DESCRIPTORS[0x0F].to_header().unwrap().is_null());
        assert_eq!(ION_1_0_TYPE_DESCRIPTORS[0xE0].to_header(), None);

        let negative_int = ION_1_0_TYPE_DESCRIPTORS[0x31].to_header().unwrap();
        assert_eq!(negative_int.ion_type, IonType::Int);
        assert_eq!(negative_int.ion_type_code, IonTypeCode::NegativeInteger);
        assert_eq!(negative_int.length_code, 1);

        let list = ION_1_0_TYPE_DESCRIPTORS[0xB7].to_header().unwrap();
        assert_eq!(list.ion_type, IonType::List);
        assert_eq!(list.length_code, 7);
    }
}
