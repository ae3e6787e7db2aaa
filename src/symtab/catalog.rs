use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::symtab::shared::SharedSymbolTable;

/// A Catalog is a collection of shared symbol tables, keyed by name and version. Cursors
/// consult a catalog to resolve the imports declared by local symbol tables they encounter
/// mid-stream.
///
/// For more information about the concept of a catalog, see
/// [the `symbols` section of the specification](https://amazon-ion.github.io/ion-docs/docs/symbols.html#the-catalog).
pub trait Catalog {
    /// Returns the latest version of the table with the given name, or `None` if no table
    /// with that name (or an empty name) is known.
    fn get_table(&self, name: &str) -> Option<Arc<SharedSymbolTable>>;

    /// Returns the best available match for the given name and version: the exact version
    /// if present, otherwise the smallest version greater than the one requested, otherwise
    /// the largest version less than it. Returns `None` only when the name is unknown.
    fn get_table_with_version(&self, name: &str, version: usize)
        -> Option<Arc<SharedSymbolTable>>;
}

/// An in-memory [`Catalog`] backed by a map of name → version → table.
pub struct MapCatalog {
    tables_by_name: HashMap<String, BTreeMap<usize, Arc<SharedSymbolTable>>>,
}

impl MapCatalog {
    pub fn new() -> Self {
        Self {
            tables_by_name: HashMap::new(),
        }
    }

    /// Adds a shared symbol table to the catalog, replacing any existing table with the
    /// same name and version.
    pub fn insert_table(&mut self, table: impl Into<Arc<SharedSymbolTable>>) {
        let table = table.into();
        let versions = self
            .tables_by_name
            .entry(table.name().to_owned())
            .or_default();
        versions.insert(table.version(), table);
    }
}

impl Default for MapCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for MapCatalog {
    fn get_table(&self, name: &str) -> Option<Arc<SharedSymbolTable>> {
        if name.is_empty() {
            return None;
        }
        let versions = self.tables_by_name.get(name)?;
        let (_highest_version, table) = versions.iter().next_back()?;
        Some(Arc::clone(table))
    }

    fn get_table_with_version(
        &self,
        name: &str,
        version: usize,
    ) -> Option<Arc<SharedSymbolTable>> {
        if name.is_empty() {
            return None;
        }
        let versions = self.tables_by_name.get(name)?;
        if let Some(table) = versions.get(&version) {
            return Some(Arc::clone(table));
        }
        // No exact match; prefer the nearest version above, then the nearest below.
        if let Some((_version, table)) = versions.range(version..).next() {
            return Some(Arc::clone(table));
        }
        versions
            .range(..version)
            .next_back()
            .map(|(_version, table)| Arc::clone(table))
    }
}

/// A [`Catalog`] with no tables in it. Imports resolved against it always produce
/// substitute tables.
#[derive(Debug, Clone, Default)]
pub struct EmptyCatalog;

impl Catalog for EmptyCatalog {
    fn get_table(&self, _name: &str) -> Option<Arc<SharedSymbolTable>> {
        None
    }

    fn get_table_with_version(
        &self,
        _name: &str,
        _version: usize,
    ) -> Option<Arc<SharedSymbolTable>> {
        None
    }
}
