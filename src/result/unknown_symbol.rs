use crate::types::SymbolId;
use thiserror::Error;

/// Indicates that a symbol ID could not be resolved to text. This is a data or configuration
/// problem (typically a catalog that is missing a shared table) rather than stream corruption;
/// callers may recover by supplying a more complete catalog and reading the stream again.
#[derive(Clone, Debug, Error, PartialEq)]
pub struct UnknownSymbolError {
    sid: SymbolId,
    kind: UnknownSymbolKind,
}

/// Distinguishes "this ID is not defined by any table in scope" from "this ID is defined,
/// but its text is unknown" (the ID falls in the range of a substitute table or a null slot).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnknownSymbolKind {
    UndefinedId,
    UnknownText,
}

impl UnknownSymbolError {
    pub(crate) fn undefined(sid: SymbolId) -> Self {
        UnknownSymbolError {
            sid,
            kind: UnknownSymbolKind::UndefinedId,
        }
    }

    pub(crate) fn unknown_text(sid: SymbolId) -> Self {
        UnknownSymbolError {
            sid,
            kind: UnknownSymbolKind::UnknownText,
        }
    }

    /// The symbol ID that could not be resolved.
    pub fn symbol_id(&self) -> SymbolId {
        self.sid
    }

    pub fn kind(&self) -> UnknownSymbolKind {
        self.kind
    }
}

impl std::fmt::Display for UnknownSymbolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            UnknownSymbolKind::UndefinedId => {
                write!(f, "symbol ID ${} is not defined by any table in scope", self.sid)
            }
            UnknownSymbolKind::UnknownText => {
                write!(f, "symbol ID ${} is defined but its text is unknown", self.sid)
            }
        }
    }
}
