//! The binary Ion decoding path: encoding primitives, the lookahead buffer, and the
//! incremental binary cursor.

pub(crate) mod buffer;
pub mod constants;
pub mod cursor;
pub(crate) mod lookahead;
pub(crate) mod lst;
mod nibbles;
pub mod type_code;
pub(crate) mod type_descriptor;
pub mod uint;
pub mod var_uint;

pub use cursor::BinaryCursor;
pub use type_code::IonTypeCode;
