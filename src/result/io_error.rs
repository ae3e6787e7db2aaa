use std::io;
use thiserror::Error;

/// Indicates that a read from the underlying input source failed.
#[derive(Debug, Error)]
#[error("{source:?}")]
pub struct IoError {
    #[from]
    source: io::Error,
}

impl IoError {
    pub fn source(&self) -> &io::Error {
        &self.source
    }
}

// io::Error does not implement Clone, which precludes us from simply deriving an implementation.
impl Clone for IoError {
    fn clone(&self) -> Self {
        IoError {
            // io::Error implements From<ErrorKind>, and ErrorKind is cloneable.
            source: io::Error::from(self.source.kind()),
        }
    }
}

// io::Error does not implement PartialEq. Comparing the ErrorKinds offers a weak definition
// of equality, but it allows IonResult values to appear in assert_eq! statements.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.source.kind() == other.source.kind()
    }
}
