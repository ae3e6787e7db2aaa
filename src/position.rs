use std::fmt::{Display, Error};

/// The location in an Ion stream at which something of interest—usually an error—was
/// found. Every position carries the number of bytes consumed before that point; positions
/// produced by the text cursor also carry a one-based line and column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub(crate) byte_offset: usize,
    pub(crate) line_column: Option<(usize, usize)>,
}

impl Position {
    /// A position `offset` bytes into the stream, with no line/column information.
    pub fn with_offset(offset: usize) -> Self {
        Position {
            byte_offset: offset,
            line_column: None,
        }
    }

    /// A copy of this position annotated with a line and column.
    pub fn with_line_and_column(&self, line: usize, column: usize) -> Self {
        Position {
            line_column: Some((line, column)),
            ..*self
        }
    }

    /// The number of bytes between the start of the stream and this position.
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// The line and column of this position, when the source format tracks them.
    pub fn line_and_column(&self) -> Option<(usize, usize)> {
        self.line_column
    }

    pub fn has_line_and_column(&self) -> bool {
        self.line_column.is_some()
    }
}

impl From<usize> for Position {
    fn from(offset: usize) -> Self {
        Position::with_offset(offset)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), Error> {
        match &self.line_column {
            None => write!(f, "{}", self.byte_offset),
            Some((line, column)) => write!(f, "{} ({}:{})", self.byte_offset, line, column),
        }
    }
}
