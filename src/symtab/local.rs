use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::result::unknown_symbol::UnknownSymbolError;
use crate::result::{illegal_operation, IonResult};
use crate::symbol::{Symbol, SymbolToken};
use crate::symtab::shared::SharedSymbolTable;
use crate::symtab::system::{SystemSymbolTable, SYSTEM_SYMBOL_TABLE_V1_0};
use crate::types::SymbolId;

/// One entry in a local table's import chain. The first import is always the system table;
/// every subsequent import is a shared table resolved through a catalog.
#[derive(Debug, Clone)]
pub enum TableImport {
    System(&'static SystemSymbolTable),
    Shared(Arc<SharedSymbolTable>),
}

impl TableImport {
    /// The number of symbol IDs this import contributes to the local table.
    pub fn max_id(&self) -> usize {
        match self {
            TableImport::System(table) => table.max_id(),
            TableImport::Shared(table) => table.max_id(),
        }
    }

    /// Resolves an ID *relative to this import* (`1..=max_id`) to its text, if known.
    pub fn text_for(&self, relative_sid: SymbolId) -> Option<&str> {
        match self {
            TableImport::System(table) => table.text_for(relative_sid),
            TableImport::Shared(table) => table.text_for(relative_sid),
        }
    }

    fn symbol_for(&self, relative_sid: SymbolId) -> Option<Symbol> {
        match self {
            TableImport::System(table) => table.symbol_for(relative_sid),
            TableImport::Shared(table) => {
                if !table.sid_is_valid(relative_sid) {
                    return None;
                }
                Some(
                    table.symbols()[relative_sid - 1]
                        .clone()
                        .unwrap_or_else(Symbol::unknown_text),
                )
            }
        }
    }
}

/// The symbol table in effect for a region of a single stream: an ordered import chain
/// followed by a mutable region of locally-interned symbols.
///
/// Symbol IDs `1..=imported_max_id` resolve through the import chain in declaration order;
/// IDs beyond that resolve to locally declared symbols in declaration order. ID `0` is
/// never a symbol. A local table starts out mutable and can be locked with
/// [`make_read_only`](Self::make_read_only), after which interning unseen text fails while
/// every lookup continues to succeed. Local tables are single-writer; they are never shared
/// across threads while mutable.
#[derive(Debug, Clone)]
pub struct LocalSymbolTable {
    imports: Vec<TableImport>,
    imported_max_id: usize,
    symbols: Vec<Symbol>,
    ids_by_text: FxHashMap<Symbol, SymbolId>,
    is_read_only: bool,
}

impl Default for LocalSymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSymbolTable {
    /// A local table whose only import is the system table: the context in effect at the
    /// start of every stream and after every version marker.
    pub fn new() -> LocalSymbolTable {
        let system = SYSTEM_SYMBOL_TABLE_V1_0;
        let mut ids_by_text = FxHashMap::default();
        for sid in 1..=system.max_id() {
            // The system table has no duplicate or empty texts; every entry maps.
            let text = system.text_for(sid).unwrap();
            ids_by_text.insert(Symbol::static_text(text), sid);
        }
        LocalSymbolTable {
            imports: vec![TableImport::System(system)],
            imported_max_id: system.max_id(),
            symbols: Vec::new(),
            ids_by_text,
            is_read_only: false,
        }
    }

    /// A local table that imports the system table followed by the provided shared tables,
    /// in order. Each import's `1..=max_id` range is concatenated onto the ID space.
    pub fn with_imports(
        imports: impl IntoIterator<Item = Arc<SharedSymbolTable>>,
    ) -> LocalSymbolTable {
        let mut table = LocalSymbolTable::new();
        for import in imports {
            table.append_import(import);
        }
        table
    }

    // Imports can only be added during construction, before any local symbol exists;
    // this is what keeps the ID ranges contiguous.
    fn append_import(&mut self, import: Arc<SharedSymbolTable>) {
        debug_assert!(self.symbols.is_empty());
        let offset = self.imported_max_id;
        for (index, slot) in import.symbols().iter().enumerate() {
            if let Some(symbol) = slot {
                if !self.ids_by_text.contains_key::<str>(symbol.text().unwrap_or("")) {
                    self.ids_by_text.insert(symbol.clone(), offset + index + 1);
                }
            }
        }
        self.imported_max_id += import.max_id();
        self.imports.push(TableImport::Shared(import));
    }

    /// The import chain, starting with the system table.
    pub fn imports(&self) -> &[TableImport] {
        &self.imports
    }

    /// The sum of the `max_id`s of every import.
    pub fn imported_max_id(&self) -> usize {
        self.imported_max_id
    }

    /// The highest symbol ID defined by this table.
    pub fn max_id(&self) -> usize {
        self.imported_max_id + self.symbols.len()
    }

    /// The locally declared symbols, in declaration order. The symbol at index `i` has
    /// ID `imported_max_id + i + 1`.
    pub fn local_symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn is_read_only(&self) -> bool {
        self.is_read_only
    }

    /// Locks the table. This transition is terminal: there is no way to make the table
    /// mutable again. Retrieval of existing text and IDs is unaffected.
    pub fn make_read_only(&mut self) {
        self.is_read_only = true;
    }

    /// Returns the canonical (lowest) symbol ID assigned to `text`, whether it comes from
    /// an import or a local declaration.
    pub fn sid_for(&self, text: &str) -> Option<SymbolId> {
        self.ids_by_text.get(text).copied()
    }

    /// Pure lookup: returns a fully-resolved token for `text` if it is already interned
    /// anywhere in the import chain or the local region. Never mutates the table.
    pub fn find(&self, text: &str) -> Option<SymbolToken> {
        self.ids_by_text
            .get_key_value(text)
            .map(|(symbol, sid)| SymbolToken::known(symbol.clone(), *sid))
    }

    /// Returns a token for `text`, interning it if necessary.
    ///
    /// If `text` is already interned, the existing assignment is returned and the table is
    /// not modified—this succeeds even on a read-only table. Interning *unseen* text into a
    /// read-only table is a fault.
    pub fn intern(&mut self, text: impl AsRef<str>) -> IonResult<SymbolToken> {
        let text = text.as_ref();
        if let Some(token) = self.find(text) {
            return Ok(token);
        }
        if self.is_read_only {
            return illegal_operation(format!(
                "cannot intern text '{text}' into a read-only symbol table"
            ));
        }
        let symbol = Symbol::shared(Arc::from(text));
        let sid = self.append_local(symbol.clone());
        Ok(SymbolToken::known(symbol, sid))
    }

    // Appends a local slot unconditionally and returns its new ID. The text map keeps the
    // first assignment for each text.
    fn append_local(&mut self, symbol: Symbol) -> SymbolId {
        let sid = self.max_id() + 1;
        if let Some(text) = symbol.text() {
            if !self.ids_by_text.contains_key::<str>(text) {
                self.ids_by_text.insert(symbol.clone(), sid);
            }
        }
        self.symbols.push(symbol);
        sid
    }

    /// Adds `text` at the next local ID, even if the text is already interned elsewhere in
    /// the table. Decoded symbol table declarations assign one ID per `symbols` entry
    /// regardless of duplication, so this path must not dedupe.
    pub(crate) fn add_symbol_for_text(&mut self, text: &str) -> SymbolId {
        self.append_local(Symbol::shared(Arc::from(text)))
    }

    /// Assigns unknown text to the next local ID. Used when a stream's symbol table
    /// declaration contains a `null` or non-string entry.
    pub(crate) fn add_placeholder(&mut self) -> SymbolId {
        self.append_local(Symbol::unknown_text())
    }

    /// Returns `true` if `sid` maps to an entry in the table (ID `0` and IDs beyond
    /// `max_id` do not). A valid ID may still have unknown text.
    pub fn sid_is_valid(&self, sid: SymbolId) -> bool {
        sid != 0 && sid <= self.max_id()
    }

    /// If `sid` is valid and its entry has known text, returns that text.
    pub fn text_for(&self, sid: SymbolId) -> Option<&str> {
        if sid == 0 {
            return None;
        }
        if sid <= self.imported_max_id {
            let mut offset = 0;
            for import in &self.imports {
                if sid <= offset + import.max_id() {
                    return import.text_for(sid - offset);
                }
                offset += import.max_id();
            }
            unreachable!("imported_max_id covers the import chain");
        }
        self.symbols.get(sid - self.imported_max_id - 1)?.text()
    }

    /// If `sid` is valid, returns its [Symbol]—which may have unknown text. Returns `None`
    /// only when the ID is not defined by this table at all.
    pub fn find_known_symbol(&self, sid: SymbolId) -> Option<Symbol> {
        if !self.sid_is_valid(sid) {
            return None;
        }
        if sid <= self.imported_max_id {
            let mut offset = 0;
            for import in &self.imports {
                if sid <= offset + import.max_id() {
                    return import.symbol_for(sid - offset);
                }
                offset += import.max_id();
            }
        }
        self.symbols.get(sid - self.imported_max_id - 1).cloned()
    }

    /// Resolves `sid` to text, faulting with an [`UnknownSymbolError`] that distinguishes
    /// "not defined by any table in scope" from "defined, but text unknown".
    pub fn require_text(&self, sid: SymbolId) -> IonResult<&str> {
        if !self.sid_is_valid(sid) {
            return Err(UnknownSymbolError::undefined(sid).into());
        }
        self.text_for(sid)
            .ok_or_else(|| UnknownSymbolError::unknown_text(sid).into())
    }
}
