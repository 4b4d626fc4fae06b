//! Lookup of static symbols in the modules loaded by the inspected process.

use crate::{
    address::Address,
    error::{Error, SymbolNotFoundError},
};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::{io, sync::Arc};

/// Locates global and static variables of loaded modules.
pub trait SymbolResolver: Send + Sync {
    /// Find the address of `symbol` in the module named `module`.
    fn locate_static_symbol(&self, module: &str, symbol: &str)
        -> Result<Address, SymbolNotFoundError>;
}

impl<T> SymbolResolver for &T
where
    T: ?Sized + SymbolResolver,
{
    fn locate_static_symbol(
        &self,
        module: &str,
        symbol: &str,
    ) -> Result<Address, SymbolNotFoundError> {
        (**self).locate_static_symbol(module, symbol)
    }
}

impl<T> SymbolResolver for Box<T>
where
    T: ?Sized + SymbolResolver,
{
    fn locate_static_symbol(
        &self,
        module: &str,
        symbol: &str,
    ) -> Result<Address, SymbolNotFoundError> {
        (**self).locate_static_symbol(module, symbol)
    }
}

impl<T> SymbolResolver for Arc<T>
where
    T: ?Sized + SymbolResolver,
{
    fn locate_static_symbol(
        &self,
        module: &str,
        symbol: &str,
    ) -> Result<Address, SymbolNotFoundError> {
        (**self).locate_static_symbol(module, symbol)
    }
}

/// A fixed table of symbol addresses, grouped by module.
///
/// Serializes as `{"<module>": {"<symbol>": <address>}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolTable {
    modules: HashMap<String, HashMap<String, Address>>,
}

impl SymbolTable {
    /// Construct an empty symbol table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a symbol table from JSON.
    pub fn from_reader<R>(reader: R) -> Result<Self, Error>
    where
        R: io::Read,
    {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Register the address of a symbol.
    pub fn insert(&mut self, module: &str, symbol: &str, address: Address) {
        self.modules
            .entry(module.to_string())
            .or_insert_with(HashMap::new)
            .insert(symbol.to_string(), address);
    }

    /// Merge another table into this one, its addresses take precedence.
    pub fn extend(&mut self, other: SymbolTable) {
        for (module, symbols) in other.modules {
            self.modules
                .entry(module)
                .or_insert_with(HashMap::new)
                .extend(symbols);
        }
    }
}

impl SymbolResolver for SymbolTable {
    fn locate_static_symbol(
        &self,
        module: &str,
        symbol: &str,
    ) -> Result<Address, SymbolNotFoundError> {
        self.modules
            .get(module)
            .and_then(|symbols| symbols.get(symbol))
            .copied()
            .ok_or_else(|| SymbolNotFoundError {
                module: module.to_string(),
                symbol: symbol.to_string(),
            })
    }
}
