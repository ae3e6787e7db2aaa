use crate::constants::v1_0;
use crate::symbol::Symbol;
use crate::types::SymbolId;

/// The immutable system symbol table defined by the Ion 1.0 specification: nine reserved
/// symbols with IDs `1`-`9`. There is a single instance per format version; because its
/// contents are `'static`, it can be shared by reference across any number of cursors and
/// threads with no locking.
#[derive(Debug, Copy, Clone)]
pub struct SystemSymbolTable {
    symbols_by_address: &'static [&'static str],
    symbols_by_text: &'static phf::Map<&'static str, usize>,
}

impl SystemSymbolTable {
    /// The highest symbol ID this table defines.
    pub const fn max_id(&self) -> usize {
        self.symbols_by_address.len()
    }

    /// If `text` is one of the reserved symbols, returns its symbol ID.
    pub fn sid_for(&self, text: &str) -> Option<SymbolId> {
        self.symbols_by_text.get(text).copied()
    }

    /// If `sid` is in the range `1..=max_id`, returns the reserved symbol's text.
    pub fn text_for(&self, sid: SymbolId) -> Option<&'static str> {
        if sid == 0 {
            return None;
        }
        self.symbols_by_address.get(sid - 1).copied()
    }

    pub fn symbol_for(&self, sid: SymbolId) -> Option<Symbol> {
        self.text_for(sid).map(Symbol::static_text)
    }
}

/// The system symbol table for Ion v1.0.
pub static SYSTEM_SYMBOL_TABLE_V1_0: &SystemSymbolTable = &SystemSymbolTable {
    symbols_by_address: v1_0::SYSTEM_SYMBOLS,
    symbols_by_text: &v1_0::SYSTEM_SYMBOL_TEXT_TO_ID,
};

#[cfg(test)]
mod system_table_tests {
    use super::*;

    #[test]
    fn reserved_symbols_resolve_both_ways() {
        let table = SYSTEM_SYMBOL_TABLE_V1_0;
        assert_eq!(table.max_id(), 9);
        assert_eq!(table.text_for(1), Some("$ion"));
        assert_eq!(table.text_for(3), Some("$ion_symbol_table"));
        assert_eq!(table.text_for(9), Some("$ion_shared_symbol_table"));
        assert_eq!(table.text_for(0), None);
        assert_eq!(table.text_for(10), None);
        for sid in 1..=table.max_id() {
            let text = table.text_for(sid).unwrap();
            assert_eq!(table.sid_for(text), Some(sid));
        }
    }
}
