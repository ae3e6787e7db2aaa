//! The text Ion decoding path: a growable UTF-8 buffer, streaming lexers, and the
//! incremental text cursor.

pub(crate) mod buffer;
pub mod cursor;
pub(crate) mod lexer;
pub(crate) mod lst;

pub use cursor::TextCursor;
