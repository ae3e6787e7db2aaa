//! The three-tier symbol table model: the fixed system table, immutable shared tables
//! resolved through a [`Catalog`], and per-stream local tables built from imports plus
//! locally interned symbols.

pub mod catalog;
pub(crate) mod imports;
pub mod local;
pub mod shared;
pub mod system;

pub use catalog::{Catalog, EmptyCatalog, MapCatalog};
pub use local::{LocalSymbolTable, TableImport};
pub use shared::SharedSymbolTable;
pub use system::{SystemSymbolTable, SYSTEM_SYMBOL_TABLE_V1_0};

/// Decides whether a writer using `superset` may copy symbol IDs that were encoded under
/// `subset` without re-encoding them: true iff every ID that `subset` defines resolves to
/// the same text under `superset` (including IDs whose text is unknown in both).
///
/// This is a structural/value comparison, not an identity comparison. It gates the
/// stream-copy optimization on the write path, so the common case—a table extended in
/// place—is answered without inspecting individual symbols: matching import chains and a
/// local prefix are sufficient. Tables that differ structurally fall back to comparing the
/// subset's ID range entry by entry.
pub fn symtab_extends(superset: &LocalSymbolTable, subset: &LocalSymbolTable) -> bool {
    if std::ptr::eq(superset, subset) {
        return true;
    }
    if superset.max_id() < subset.max_id() {
        return false;
    }
    if import_chains_match(superset, subset) {
        // The imported ID ranges are identical, so only the subset's locals need to agree.
        let superset_locals = superset.local_symbols();
        let subset_locals = subset.local_symbols();
        return subset_locals.len() <= superset_locals.len()
            && subset_locals == &superset_locals[..subset_locals.len()];
    }
    // Structurally different tables can still define identical ID ranges (for example, an
    // import's symbols re-declared locally). Compare the subset's range directly.
    (1..=subset.max_id())
        .all(|sid| superset.find_known_symbol(sid) == subset.find_known_symbol(sid))
}

// Two import chains match when they list the same tables: same kind, name, version, and
// max_id at every position. Substitute tables match by the same criteria; their unknown
// text is part of the value being compared.
fn import_chains_match(a: &LocalSymbolTable, b: &LocalSymbolTable) -> bool {
    use TableImport::*;
    if a.imports().len() != b.imports().len() {
        return false;
    }
    a.imports()
        .iter()
        .zip(b.imports().iter())
        .all(|(left, right)| match (left, right) {
            (System(_), System(_)) => true,
            (Shared(left), Shared(right)) => {
                left.name() == right.name()
                    && left.version() == right.version()
                    && left.max_id() == right.max_id()
                    && left.symbols() == right.symbols()
            }
            _ => false,
        })
}

#[cfg(test)]
mod symtab_extends_tests {
    use super::*;
    use std::sync::Arc;

    fn shared(name: &str, texts: &[&str]) -> Arc<SharedSymbolTable> {
        let symbols = texts.iter().map(|t| Some(t.to_string())).collect();
        Arc::new(SharedSymbolTable::new(name, 1, symbols).unwrap())
    }

    // The definitional form of the predicate, used to cross-check the optimized one.
    fn extends_by_definition(superset: &LocalSymbolTable, subset: &LocalSymbolTable) -> bool {
        (1..=subset.max_id())
            .all(|sid| superset.find_known_symbol(sid) == subset.find_known_symbol(sid))
    }

    fn assert_agrees(superset: &LocalSymbolTable, subset: &LocalSymbolTable) {
        assert_eq!(
            symtab_extends(superset, subset),
            extends_by_definition(superset, subset),
        );
    }

    #[test]
    fn a_table_extends_itself() {
        let table = LocalSymbolTable::with_imports([shared("animals", &["cat", "dog"])]);
        assert!(symtab_extends(&table, &table));
        assert!(symtab_extends(&table.clone(), &table));
    }

    #[test]
    fn appending_locals_preserves_extension() {
        let mut before = LocalSymbolTable::with_imports([shared("animals", &["cat"])]);
        before.add_symbol_for_text("one");
        let mut after = before.clone();
        after.add_symbol_for_text("two");
        after.add_symbol_for_text("three");

        assert!(symtab_extends(&after, &before));
        assert!(!symtab_extends(&before, &after));
        assert_agrees(&after, &before);
        assert_agrees(&before, &after);
    }

    #[test]
    fn conflicting_locals_do_not_extend() {
        let mut a = LocalSymbolTable::new();
        a.add_symbol_for_text("apple");
        let mut b = LocalSymbolTable::new();
        b.add_symbol_for_text("banana");
        assert!(!symtab_extends(&a, &b));
        assert_agrees(&a, &b);
    }

    #[test]
    fn different_imports_with_identical_symbols_still_extend() {
        // Structurally different (import vs. locals), but the ID ranges are identical.
        let imported = LocalSymbolTable::with_imports([shared("animals", &["cat", "dog"])]);
        let mut declared = LocalSymbolTable::new();
        declared.add_symbol_for_text("cat");
        declared.add_symbol_for_text("dog");

        assert!(symtab_extends(&imported, &declared));
        assert!(symtab_extends(&declared, &imported));
        assert_agrees(&imported, &declared);
    }

    #[test]
    fn unknown_text_slots_must_match() {
        let mut with_hole = LocalSymbolTable::new();
        with_hole.add_placeholder();
        let mut with_text = LocalSymbolTable::new();
        with_text.add_symbol_for_text("present");

        let mut other_hole = LocalSymbolTable::new();
        other_hole.add_placeholder();

        assert!(!symtab_extends(&with_text, &with_hole));
        assert!(symtab_extends(&other_hole, &with_hole));
        assert_agrees(&with_text, &with_hole);
        assert_agrees(&other_hole, &with_hole);
    }

    #[test]
    fn shorter_table_never_extends_longer() {
        let mut long = LocalSymbolTable::new();
        long.add_symbol_for_text("a");
        let short = LocalSymbolTable::new();
        assert!(!symtab_extends(&short, &long));
        assert!(symtab_extends(&long, &short));
    }
}
