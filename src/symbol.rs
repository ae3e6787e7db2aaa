use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::types::SymbolId;

/// Stores or points to the text of a given [Symbol].
#[derive(Debug, Eq, PartialEq, Clone)]
enum SymbolText {
    // This Symbol refers to a string in the static system symbol table
    Static(&'static str),
    // This Symbol refers to a string whose ownership is shared with a symbol table
    Shared(Arc<str>),
    // This Symbol owns its own text
    Owned(String),
    // This Symbol's text is unknown: `$0`, a null slot in a shared table, or any ID
    // covered by a substitute table
    Unknown,
}

impl SymbolText {
    fn text(&self) -> Option<&str> {
        match self {
            SymbolText::Static(s) => Some(s),
            SymbolText::Shared(s) => Some(s.as_ref()),
            SymbolText::Owned(s) => Some(s.as_str()),
            SymbolText::Unknown => None,
        }
    }
}

/// The text of a field name, annotation, or symbol value. The text may be stored as a
/// `String`, shared with a symbol table via an `Arc`, or unknown altogether.
///
/// Symbols with unknown text are defined—a reader can tell them apart from symbol IDs
/// that are out of range—but they cannot be converted back to text.
#[derive(Clone, Eq)]
pub struct Symbol {
    text: SymbolText,
}

impl Symbol {
    pub fn owned(text: impl Into<String>) -> Symbol {
        Symbol {
            text: SymbolText::Owned(text.into()),
        }
    }

    pub fn shared(text: Arc<str>) -> Symbol {
        Symbol {
            text: SymbolText::Shared(text),
        }
    }

    pub fn static_text(text: &'static str) -> Symbol {
        Symbol {
            text: SymbolText::Static(text),
        }
    }

    pub fn unknown_text() -> Symbol {
        Symbol {
            text: SymbolText::Unknown,
        }
    }

    /// If this symbol's text is known, returns `Some(&str)`. Otherwise, returns `None`.
    pub fn text(&self) -> Option<&str> {
        self.text.text()
    }

    pub fn is_unknown_text(&self) -> bool {
        matches!(self.text, SymbolText::Unknown)
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.text() {
            Some(text) => write!(f, "'{text}'"),
            None => write!(f, "$0"),
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.text() {
            Some(text) => write!(f, "{text}"),
            None => write!(f, "$0"),
        }
    }
}

// Symbols are compared, hashed, and ordered by their text alone; how the text is stored
// is not observable. Symbols with unknown text are equal only to each other and sort
// before all symbols with known text.
impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.text() == other.text()
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.text() == Some(other)
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hashing via `Borrow<str>` requires this to be the hash of the text itself.
        // Symbols with unknown text are never used as map keys.
        self.text().unwrap_or("").hash(state)
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text().cmp(&other.text())
    }
}

// Allows a FxHashMap<Symbol, _> to do lookups with a &str instead of a &Symbol.
// Only symbols with known text are inserted into such maps.
impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        self.text().unwrap_or("")
    }
}

impl<A: Into<String>> From<A> for Symbol {
    fn from(text: A) -> Self {
        Symbol::owned(text)
    }
}

/// A symbol encountered in a stream or stored in a symbol table: some text, a symbol ID,
/// or both. At least one of the two fields is always present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolToken {
    text: Option<Symbol>,
    sid: Option<SymbolId>,
}

impl SymbolToken {
    /// A token whose text and ID are both known, as produced by a successful intern or lookup.
    pub fn known(text: Symbol, sid: SymbolId) -> SymbolToken {
        SymbolToken {
            text: Some(text),
            sid: Some(sid),
        }
    }

    /// A token with text but no table affiliation (for example, an unquoted symbol in text Ion).
    pub fn from_text(text: impl Into<Symbol>) -> SymbolToken {
        SymbolToken {
            text: Some(text.into()),
            sid: None,
        }
    }

    /// A token with only a symbol ID. Its text, if any, must be resolved through a symbol table.
    pub fn from_sid(sid: SymbolId) -> SymbolToken {
        SymbolToken {
            text: None,
            sid: Some(sid),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_ref().and_then(|s| s.text())
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        self.text.as_ref()
    }

    pub fn sid(&self) -> Option<SymbolId> {
        self.sid
    }
}

#[cfg(test)]
mod symbol_tests {
    use super::*;

    #[test]
    fn ordering_and_eq() {
        let mut symbols = vec![
            Symbol::owned("foo"),
            Symbol::shared(Arc::from("bar")),
            Symbol::shared(Arc::from("baz")),
            Symbol::owned("quux"),
        ];
        symbols.as_mut_slice().sort();
        // Equality testing doesn't depend on what kind of Symbol it is, just the text.
        let expected = vec![
            Symbol::owned("bar"),
            Symbol::owned("baz"),
            Symbol::owned("foo"),
            Symbol::owned("quux"),
        ];
        assert_eq!(symbols, expected)
    }

    #[test]
    fn unknown_text_is_distinct() {
        assert_eq!(Symbol::unknown_text(), Symbol::unknown_text());
        assert_ne!(Symbol::unknown_text(), Symbol::owned(""));
        assert!(Symbol::unknown_text() < Symbol::owned(""));
    }

    #[test]
    fn token_fields() {
        let token = SymbolToken::known(Symbol::owned("name"), 4);
        assert_eq!(token.text(), Some("name"));
        assert_eq!(token.sid(), Some(4));
        assert_eq!(SymbolToken::from_sid(10).text(), None);
    }
}
