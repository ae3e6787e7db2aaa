//! Resolution of the imports declared by an in-stream symbol table, shared by the binary
//! and text cursors.

use std::sync::Arc;

use crate::result::{decoding_error, IonResult};
use crate::symtab::catalog::Catalog;
use crate::symtab::local::LocalSymbolTable;
use crate::symtab::shared::SharedSymbolTable;

/// The contents of one `$ion_symbol_table` struct, prior to catalog resolution.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct LstDeclaration {
    // True if the struct's `imports` field was the symbol `$ion_symbol_table`, indicating
    // that the new symbols extend the current table instead of replacing it.
    pub is_append: bool,
    pub imports: Vec<ImportDescriptor>,
    pub symbols: Vec<Option<String>>,
}

/// An entry from a symbol table's `imports` list: the (name, version, max_id) triple used
/// to locate a shared table in the catalog.
#[derive(Debug, PartialEq)]
pub(crate) struct ImportDescriptor {
    pub name: String,
    pub version: usize,
    pub max_id: Option<usize>,
}

/// Resolves each import descriptor against the catalog, synthesizing substitute tables
/// where the catalog's best effort falls short of the declaration.
pub(crate) fn resolve_imports(
    descriptors: &[ImportDescriptor],
    catalog: &dyn Catalog,
) -> IonResult<Vec<Arc<SharedSymbolTable>>> {
    let mut resolved = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let ImportDescriptor {
            name,
            version,
            max_id,
        } = descriptor;
        let table = match catalog.get_table_with_version(name, *version) {
            Some(best_match) => {
                let exact_version = best_match.version() == *version;
                match max_id {
                    // An inexact match, or a max_id that disagrees with the matched table,
                    // requires a substitute padded or truncated to the declared ID range.
                    Some(max_id) if !exact_version || best_match.max_id() != *max_id => Arc::new(
                        SharedSymbolTable::substitute_of(&best_match, *version, *max_id),
                    ),
                    Some(_) => best_match,
                    None if exact_version => best_match,
                    None => {
                        return decoding_error(format!(
                            "import of '{name}' version {version} resolved inexactly (to version {}) \
                             and the import declared no max_id",
                            best_match.version()
                        ))
                    }
                }
            }
            None => match max_id {
                Some(max_id) => Arc::new(SharedSymbolTable::substitute(name, *version, *max_id)),
                None => {
                    return decoding_error(format!(
                        "cannot resolve import '{name}' version {version}: not in the catalog \
                         and the import declared no max_id"
                    ))
                }
            },
        };
        resolved.push(table);
    }
    Ok(resolved)
}

/// Applies a parsed symbol table declaration: a fresh declaration replaces the current
/// table with one built from its resolved imports, while an append declaration keeps the
/// current table. In both cases the declared symbols are assigned the next available IDs,
/// one slot per entry, with `None` entries occupying a slot with unknown text.
pub(crate) fn install_declaration(
    table: &mut LocalSymbolTable,
    declaration: LstDeclaration,
    catalog: &dyn Catalog,
) -> IonResult<()> {
    if !declaration.is_append {
        let imports = resolve_imports(&declaration.imports, catalog)?;
        *table = LocalSymbolTable::with_imports(imports);
    }
    for entry in declaration.symbols {
        match entry {
            Some(text) => {
                table.add_symbol_for_text(&text);
            }
            None => {
                table.add_placeholder();
            }
        }
    }
    Ok(())
}
