/// The high nibble of a binary value's header byte. Where [`IonType`](crate::IonType) is
/// the user-visible type of a value, `IonTypeCode` is its encoding-level classification:
/// it additionally distinguishes positive from negative integers, NOP padding from nulls,
/// and marks the bytes (annotation wrappers, version markers, the reserved code) that are
/// not values at all.
///
/// See the
/// [Typed Value Formats](https://amazon-ion.github.io/ion-docs/docs/binary.html#typed-value-formats)
/// section of the binary Ion spec for the full table.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum IonTypeCode {
    NullOrNop,       // 0
    Boolean,         // 1
    PositiveInteger, // 2
    NegativeInteger, // 3
    Float,           // 4
    Decimal,         // 5
    Timestamp,       // 6
    Symbol,          // 7
    String,          // 8
    Clob,            // 9
    Blob,            // 10
    List,            // 11
    SExpression,     // 12
    Struct,          // 13
    AnnotationOrIvm, // 14
    Reserved,        // 15
}
