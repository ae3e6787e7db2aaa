use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::result::{illegal_operation, IonResult};
use crate::result::unknown_symbol::UnknownSymbolError;
use crate::symbol::Symbol;
use crate::symtab::catalog::Catalog;
use crate::types::SymbolId;

/// A named, versioned symbol table that is distributed out-of-band and resolved through a
/// [`Catalog`]. Shared tables are immutable once constructed, which makes a single
/// `Arc<SharedSymbolTable>` safe to reuse across any number of concurrently-running cursors.
///
/// Symbol IDs map to slots: ID `n` refers to slot `n - 1`. A slot may be empty (`None`),
/// which represents a *known* ID whose text is unknown. Empty slots arise from `null` or
/// empty entries in the table's declaration and from substitute tables; preserving them
/// keeps the ID space stable, which is what makes backward-compatible decoding possible.
///
/// For more information, see:
/// <https://amazon-ion.github.io/ion-docs/docs/symbols.html#shared-symbol-tables>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSymbolTable {
    name: String,
    version: usize,
    symbols: Vec<Option<Symbol>>,
    ids_by_text: FxHashMap<Symbol, SymbolId>,
    is_substitute: bool,
}

impl SharedSymbolTable {
    /// Constructs a shared symbol table from its name, version, and declared symbol texts.
    /// A `None` or empty-text entry occupies a slot without defining text for it. When the
    /// same text appears more than once, the first (lowest-ID) occurrence is the canonical
    /// assignment returned by [`sid_for`](Self::sid_for); later occurrences still resolve
    /// through [`text_for`](Self::text_for).
    pub fn new(
        name: impl Into<String>,
        version: usize,
        symbols: Vec<Option<String>>,
    ) -> IonResult<SharedSymbolTable> {
        let name = name.into();
        // As per the Ion specification, the name field must be a string with length
        // at least one. Materialization of any other value must fail.
        if name.is_empty() {
            return illegal_operation("shared symbol table with empty name is not allowed");
        }
        // Version fields below 1 are treated as 1.
        let version = version.max(1);

        let mut table = SharedSymbolTable {
            name,
            version,
            symbols: Vec::with_capacity(symbols.len()),
            ids_by_text: FxHashMap::default(),
            is_substitute: false,
        };
        for text in symbols {
            table.append_slot(text.map(|t| Symbol::shared(Arc::from(t.as_str()))));
        }
        Ok(table)
    }

    /// Constructs a new version of a shared table. The prior version is fetched from
    /// `catalog` (a fault if it cannot be found) and every one of its slots—including
    /// empty ones—is seeded first, so that any ID valid in the prior version resolves to
    /// the same text in the new one. Each import's symbols are appended next, followed by
    /// `new_symbols`.
    pub fn build(
        name: impl Into<String>,
        version: usize,
        new_symbols: Vec<Option<String>>,
        imports: &[Arc<SharedSymbolTable>],
        catalog: &dyn Catalog,
    ) -> IonResult<SharedSymbolTable> {
        let name = name.into();
        if name.is_empty() {
            return illegal_operation("shared symbol table with empty name is not allowed");
        }
        let version = version.max(1);

        let mut table = SharedSymbolTable {
            name: name.clone(),
            version,
            symbols: Vec::new(),
            ids_by_text: FxHashMap::default(),
            is_substitute: false,
        };

        if version > 1 {
            let prior = catalog.get_table_with_version(&name, version - 1).ok_or_else(|| {
                crate::result::illegal_operation_raw(format!(
                    "cannot build version {version} of shared table '{name}': no prior version in catalog"
                ))
            })?;
            for slot in prior.symbols() {
                table.append_slot(slot.clone());
            }
        }
        for import in imports {
            for slot in import.symbols() {
                table.append_slot(slot.clone());
            }
        }
        for text in new_symbols {
            table.append_slot(text.map(|t| Symbol::shared(Arc::from(t.as_str()))));
        }
        Ok(table)
    }

    /// Synthesizes a placeholder for an import that could not be resolved at all. Every ID
    /// in `1..=max_id` is known but has no text; requiring text for one of them raises
    /// [`UnknownSymbolError`] rather than "no such ID".
    pub fn substitute(name: impl Into<String>, version: usize, max_id: usize) -> SharedSymbolTable {
        SharedSymbolTable {
            name: name.into(),
            version,
            symbols: vec![None; max_id],
            ids_by_text: FxHashMap::default(),
            is_substitute: true,
        }
    }

    /// Synthesizes a substitute for an import whose catalog match was inexact: the matched
    /// table's slots are padded (with empty slots) or truncated to the declared `max_id`,
    /// and the declared version is reported instead of the matched one.
    pub fn substitute_of(
        actual: &SharedSymbolTable,
        version: usize,
        max_id: usize,
    ) -> SharedSymbolTable {
        let mut table = SharedSymbolTable {
            name: actual.name.clone(),
            version,
            symbols: Vec::with_capacity(max_id),
            ids_by_text: FxHashMap::default(),
            is_substitute: true,
        };
        for slot in actual.symbols().iter().take(max_id) {
            table.append_slot(slot.clone());
        }
        while table.symbols.len() < max_id {
            table.symbols.push(None);
        }
        table
    }

    // Adds a slot at the next ID. Empty text is dropped (the slot becomes a hole);
    // duplicate text keeps its slot but does not displace the first ID in the text map.
    fn append_slot(&mut self, symbol: Option<Symbol>) {
        let sid = self.symbols.len() + 1;
        match symbol {
            Some(symbol) if symbol.text().is_some_and(|t| !t.is_empty()) => {
                if !self.ids_by_text.contains_key::<str>(symbol.text().unwrap()) {
                    self.ids_by_text.insert(symbol.clone(), sid);
                }
                self.symbols.push(Some(symbol));
            }
            _ => self.symbols.push(None),
        }
    }

    /// Returns the name of this table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the version of this table.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Returns `true` if this table was synthesized for an unresolvable import.
    pub fn is_substitute(&self) -> bool {
        self.is_substitute
    }

    /// The highest symbol ID this table defines, including empty slots.
    pub fn max_id(&self) -> usize {
        self.symbols.len()
    }

    /// Returns the table's slots in ID order. Slot `n` holds the symbol with ID `n + 1`.
    pub fn symbols(&self) -> &[Option<Symbol>] {
        &self.symbols
    }

    /// If `sid` is in range and its slot has known text, returns that text.
    pub fn text_for(&self, sid: SymbolId) -> Option<&str> {
        if sid == 0 {
            return None;
        }
        self.symbols.get(sid - 1)?.as_ref()?.text()
    }

    /// Returns `true` if `sid` addresses a slot in this table, whether or not the slot
    /// has known text.
    pub fn sid_is_valid(&self, sid: SymbolId) -> bool {
        sid != 0 && sid <= self.symbols.len()
    }

    /// Returns the canonical (lowest) ID assigned to `text`, if any.
    pub fn sid_for(&self, text: &str) -> Option<SymbolId> {
        self.ids_by_text.get(text).copied()
    }

    /// Like [`text_for`](Self::text_for), but distinguishes the failure modes: an ID
    /// outside the table faults as undefined, while an in-range slot with no text (always
    /// the case for substitutes) faults as known-but-unknown-text.
    pub fn require_text(&self, sid: SymbolId) -> IonResult<&str> {
        if !self.sid_is_valid(sid) {
            return Err(UnknownSymbolError::undefined(sid).into());
        }
        self.text_for(sid)
            .ok_or_else(|| UnknownSymbolError::unknown_text(sid).into())
    }
}

#[cfg(test)]
mod shared_symbol_table_tests {
    use super::*;
    use crate::result::unknown_symbol::UnknownSymbolKind;
    use crate::symtab::catalog::MapCatalog;
    use crate::IonError;

    fn texts(texts: &[&str]) -> Vec<Option<String>> {
        texts.iter().map(|t| Some(t.to_string())).collect()
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(SharedSymbolTable::new("", 1, texts(&["a"])).is_err());
    }

    #[test]
    fn duplicate_text_keeps_first_id_but_both_slots_decode() {
        let table =
            SharedSymbolTable::new("T", 1, texts(&["fee", "fie", "fee", "foe"])).unwrap();
        assert_eq!(table.max_id(), 4);
        assert_eq!(table.sid_for("fee"), Some(1));
        // The later duplicate slot is still valid for decoding.
        assert_eq!(table.text_for(3), Some("fee"));
        assert_eq!(table.text_for(4), Some("foe"));
    }

    #[test]
    fn null_and_empty_entries_become_holes() {
        let symbols = vec![
            Some("fee".to_string()),
            None,
            Some(String::new()),
            Some("foe".to_string()),
        ];
        let table = SharedSymbolTable::new("T", 1, symbols).unwrap();
        assert_eq!(table.max_id(), 4);
        assert_eq!(table.text_for(2), None);
        assert_eq!(table.text_for(3), None);
        assert!(table.sid_is_valid(2));
        assert_eq!(table.text_for(4), Some("foe"));
        assert_eq!(table.sid_for(""), None);
    }

    #[test]
    fn new_version_preserves_prior_ids() {
        let mut catalog = MapCatalog::new();
        let symbols = vec![Some("a".to_string()), None, Some("c".to_string())];
        catalog.insert_table(SharedSymbolTable::new("T", 1, symbols).unwrap());

        let v2 =
            SharedSymbolTable::build("T", 2, texts(&["d"]), &[], &catalog).unwrap();
        assert_eq!(v2.version(), 2);
        assert_eq!(v2.max_id(), 4);
        // Every ID valid in v1 resolves to the same text in v2, holes included.
        assert_eq!(v2.text_for(1), Some("a"));
        assert_eq!(v2.text_for(2), None);
        assert_eq!(v2.text_for(3), Some("c"));
        assert_eq!(v2.text_for(4), Some("d"));
    }

    #[test]
    fn new_version_requires_prior_in_catalog() {
        let catalog = MapCatalog::new();
        let result = SharedSymbolTable::build("T", 2, texts(&["a"]), &[], &catalog);
        assert!(matches!(result, Err(IonError::IllegalOperation(_))));
    }

    #[test]
    fn substitute_faults_distinctly() {
        let table = SharedSymbolTable::substitute("missing", 2, 3);
        assert!(table.is_substitute());
        assert_eq!(table.max_id(), 3);
        // In range, but no text: UnknownText.
        match table.require_text(2) {
            Err(IonError::UnknownSymbol(e)) => {
                assert_eq!(e.kind(), UnknownSymbolKind::UnknownText)
            }
            other => panic!("expected an unknown symbol error, found {other:?}"),
        }
        // Out of range: UndefinedId.
        match table.require_text(4) {
            Err(IonError::UnknownSymbol(e)) => {
                assert_eq!(e.kind(), UnknownSymbolKind::UndefinedId)
            }
            other => panic!("expected an unknown symbol error, found {other:?}"),
        }
    }

    #[test]
    fn substitute_of_pads_and_truncates() {
        let actual = SharedSymbolTable::new("T", 3, texts(&["a", "b", "c"])).unwrap();
        let padded = SharedSymbolTable::substitute_of(&actual, 4, 5);
        assert_eq!(padded.max_id(), 5);
        assert_eq!(padded.version(), 4);
        assert_eq!(padded.text_for(3), Some("c"));
        assert_eq!(padded.text_for(5), None);

        let truncated = SharedSymbolTable::substitute_of(&actual, 4, 2);
        assert_eq!(truncated.max_id(), 2);
        assert_eq!(truncated.text_for(2), Some("b"));
        assert_eq!(truncated.text_for(3), None);
    }
}
