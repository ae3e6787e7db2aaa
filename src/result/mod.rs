use std::convert::From;
use std::io;

use crate::position::Position;
use crate::result::decoding_error::DecodingError;
use crate::result::illegal_operation::IllegalOperation;
use crate::result::incomplete::IncompleteError;
use crate::result::io_error::IoError;
use crate::result::unknown_symbol::UnknownSymbolError;
use thiserror::Error;

pub mod decoding_error;
pub mod illegal_operation;
pub mod incomplete;
pub mod io_error;
pub mod unknown_symbol;

/// A unified Result type representing the outcome of method calls that may fail.
pub type IonResult<T> = Result<T, IonError>;

/// Represents the different types of high-level failures that might occur when reading Ion data.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum IonError {
    /// Indicates that an IO error was encountered while reading from the input source.
    #[error("{0}")]
    Io(#[from] IoError),

    /// Indicates that the input buffer did not contain enough data to perform the requested
    /// operation. Cursors absorb this error and report [`StreamEvent::NeedsData`]
    /// (see [`crate::cursor::StreamEvent`]) instead; it is returned directly only when the
    /// missing data can never arrive (for example, `end_stream` was called mid-value).
    #[error("{0}")]
    Incomplete(#[from] IncompleteError),

    /// Indicates that the data stream being read contained illegal or otherwise unreadable data.
    #[error("{0}")]
    Decoding(#[from] DecodingError),

    /// Indicates that a symbol ID in the stream could not be resolved against the tables in
    /// scope. Unlike [`IonError::Decoding`], this is a catalog/configuration problem and the
    /// stream itself is not corrupt.
    #[error("{0}")]
    UnknownSymbol(#[from] UnknownSymbolError),

    /// Returned when the user has performed an illegal operation (for example: calling
    /// step_out_of_container while the cursor is at the top level.)
    #[error("{0}")]
    IllegalOperation(#[from] IllegalOperation),
}

impl From<io::Error> for IonError {
    fn from(io_error: io::Error) -> Self {
        IoError::from(io_error).into()
    }
}

pub(crate) fn incomplete_data_error<T>(
    label: &'static str,
    position: impl Into<Position>,
) -> IonResult<T> {
    Err(incomplete_data_error_raw(label, position))
}

pub(crate) fn incomplete_data_error_raw(
    label: &'static str,
    position: impl Into<Position>,
) -> IonError {
    IncompleteError::new(label, position).into()
}

/// A convenience method for creating an IonResult containing an IonError::Decoding with the
/// provided description text.
pub fn decoding_error<T, S: Into<String>>(description: S) -> IonResult<T> {
    Err(decoding_error_raw(description))
}

/// A convenience method for creating an IonError::Decoding with the provided description
/// text. Useful for calling Option#ok_or_else.
#[inline(never)]
pub(crate) fn decoding_error_raw<S: Into<String>>(description: S) -> IonError {
    DecodingError::new(description.into()).into()
}

pub(crate) fn decoding_error_at<T, S: Into<String>>(
    description: S,
    position: impl Into<Position>,
) -> IonResult<T> {
    Err(DecodingError::new(description.into())
        .with_position(position)
        .into())
}

/// A convenience method for creating an IonResult containing an IonError::IllegalOperation with
/// the provided operation text.
pub fn illegal_operation<T, S: Into<String>>(operation: S) -> IonResult<T> {
    Err(illegal_operation_raw(operation))
}

/// A convenience method for creating an IonError::IllegalOperation with the provided operation
/// text. Useful for calling Option#ok_or_else.
#[inline(never)]
pub(crate) fn illegal_operation_raw<S: Into<String>>(operation: S) -> IonError {
    IllegalOperation::new(operation.into()).into()
}

