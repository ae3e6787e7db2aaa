use std::fmt;
use std::ops::Neg;

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;

/// A symbol's address within a symbol table. Symbol ID `0` is reserved to represent
/// "a symbol with unknown text" and never maps to an entry in any table.
pub type SymbolId = usize;

/// An unsigned integer decoded from a stream. Values that cannot fit in a `u64` are
/// represented as a `BigUint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UInt {
    U64(u64),
    BigUInt(BigUint),
}

impl UInt {
    /// If this value is small enough to fit in a `u64`, returns it as one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            UInt::U64(value) => Some(*value),
            UInt::BigUInt(value) => u64::try_from(value).ok(),
        }
    }
}

/// A signed integer decoded from a stream. Values that cannot fit in an `i64` are
/// represented as a `BigInt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Int {
    I64(i64),
    BigInt(BigInt),
}

impl Int {
    /// If this value is small enough to fit in an `i64`, returns it as one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Int::I64(value) => Some(*value),
            Int::BigInt(value) => i64::try_from(value).ok(),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Int::I64(value) => *value == 0,
            Int::BigInt(value) => value.is_zero(),
        }
    }
}

impl Neg for Int {
    type Output = Int;

    fn neg(self) -> Self::Output {
        match self {
            Int::I64(value) => Int::I64(-value),
            Int::BigInt(value) => Int::BigInt(-value),
        }
    }
}

impl From<u64> for Int {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(small) => Int::I64(small),
            Err(_) => Int::BigInt(BigInt::from(value)),
        }
    }
}

/// Represents the Ion data type of a value encountered in a stream. The cursor reports
/// each value's type without materializing the value itself.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub enum IonType {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Timestamp,
    Symbol,
    String,
    Clob,
    Blob,
    List,
    SExp,
    Struct,
}

impl IonType {
    /// Returns `true` if this type is a list, s-expression, or struct.
    pub fn is_container(&self) -> bool {
        use IonType::*;
        matches!(self, List | SExp | Struct)
    }
}

impl fmt::Display for IonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use IonType::*;
        write!(
            f,
            "{}",
            match self {
                Null => "null",
                Bool => "bool",
                Int => "int",
                Float => "float",
                Decimal => "decimal",
                Timestamp => "timestamp",
                Symbol => "symbol",
                String => "string",
                Clob => "clob",
                Blob => "blob",
                List => "list",
                SExp => "sexp",
                Struct => "struct",
            }
        )
    }
}
