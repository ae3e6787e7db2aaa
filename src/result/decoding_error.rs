use crate::position::Position;
use std::borrow::Cow;
use thiserror::Error;

/// Indicates that the stream being read contained illegal or otherwise unreadable data.
/// Once this error has been returned, the stream is considered corrupt from the reported
/// position onwards; the read cannot be retried.
#[derive(Clone, Debug, Error, PartialEq)]
pub struct DecodingError {
    description: Cow<'static, str>,
    position: Option<Position>,
}

impl DecodingError {
    pub(crate) fn new(description: impl Into<Cow<'static, str>>) -> Self {
        DecodingError {
            description: description.into(),
            position: None,
        }
    }

    pub(crate) fn with_position(mut self, position: impl Into<Position>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }
}

impl std::fmt::Display for DecodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.position {
            Some(position) => write!(f, "{} at offset {position}", self.description),
            None => write!(f, "{}", self.description),
        }
    }
}
