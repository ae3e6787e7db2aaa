//! An incremental cursor and symbol-table substrate for the [Ion] data format.
//!
//! This crate implements the continuable core of an Ion reader: a resumable,
//! value-by-value cursor over a binary or text stream of unknown total length, backed by a
//! bounded lookahead buffer and a three-tier symbol table model (system, shared, local).
//!
//! The cursors never block: when the input source has no data available, an operation
//! returns [`StreamEvent::NeedsData`] and can be retried verbatim later with no loss of
//! parser state. A bounded [`BufferConfiguration`] adds backpressure on the binary path:
//! values too large for the buffer are reported through a handler and skipped, while
//! symbol tables too large for the buffer permanently halt the cursor (symbol IDs declared
//! by an unread table can never be resolved).
//!
//! ```
//! use ion_cursor::{BinaryCursor, IonCursor, IonResult, StreamEvent};
//!
//! # fn main() -> IonResult<()> {
//! // An IVM followed by the integers 1 and 2.
//! let data = vec![0xE0, 0x01, 0x00, 0xEA, 0x21, 0x01, 0x21, 0x02];
//! let mut cursor = BinaryCursor::new(std::io::Cursor::new(data));
//!
//! assert_eq!(cursor.next_value()?, StreamEvent::StartScalar);
//! assert_eq!(cursor.read_i64()?, 1);
//! assert_eq!(cursor.next_value()?, StreamEvent::StartScalar);
//! assert_eq!(cursor.read_i64()?, 2);
//! // The source is dry; if more data arrives, the same call can be retried.
//! assert_eq!(cursor.next_value()?, StreamEvent::NeedsData);
//! # Ok(())
//! # }
//! ```
//!
//! [Ion]: https://amazon-ion.github.io/ion-docs/

pub mod binary;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod position;
pub mod result;
pub mod symbol;
pub mod symtab;
pub mod text;
pub mod types;

pub use binary::BinaryCursor;
pub use config::{BufferConfiguration, BufferConfigurationBuilder};
pub use cursor::{IonCursor, SpanProvider, StreamEvent};
pub use position::Position;
pub use result::{IonError, IonResult};
pub use symbol::{Symbol, SymbolToken};
pub use symtab::{
    symtab_extends, Catalog, EmptyCatalog, LocalSymbolTable, MapCatalog, SharedSymbolTable,
    SystemSymbolTable, SYSTEM_SYMBOL_TABLE_V1_0,
};
pub use text::TextCursor;
pub use types::{Int, IonType, SymbolId, UInt};
