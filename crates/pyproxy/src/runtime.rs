//! Resolution of the interpreter's global singletons.
//!
//! Static symbols are looked up once per process and kept in its
//! [DataItems][crate::DataItems], the proxies built from them read memory
//! afresh every time.

use crate::{
    address::Address,
    error::Error,
    process_handle::ProcessHandle,
    proxy::{PointerProxy, Struct, StructProxy},
    structs::{PyInterpreterState, PyRuntimeState},
    version::PythonVersion,
};

/// The static `PyInterpreterState *` heading the interpreter list before 3.7.
pub const INTERP_HEAD: &str = "interp_head";
/// The static `_PyRuntimeState` since 3.7.
pub const PY_RUNTIME: &str = "_PyRuntime";

/// First version keeping interpreters in `_PyRuntime`.
const RUNTIME_STATE_SINCE: PythonVersion = PythonVersion::new(3, 7);

impl ProcessHandle {
    /// Locate a static symbol in the runtime module.
    ///
    /// Successful lookups are cached for as long as the process is attached.
    pub fn static_address(&self, symbol: &str) -> Result<Address, Error> {
        let module = &self.runtime().module;
        let key = format!("{}!{}", module, symbol);

        self.data_items().get_or_try_insert_with(&key, || {
            let address = self.symbols().locate_static_symbol(module, symbol)?;
            log::debug!("{}: located at {}", key, address);
            Ok(address)
        })
    }

    /// Access a static pointer to a struct of kind `S`.
    pub fn static_pointer<S>(&self, symbol: &str) -> Result<PointerProxy<'_, S>, Error>
    where
        S: Struct,
    {
        Ok(PointerProxy::at(self, self.static_address(symbol)?))
    }

    /// Access a static struct of kind `S`.
    pub fn static_struct<S>(&self, symbol: &str) -> Result<StructProxy<'_, S>, Error>
    where
        S: Struct,
    {
        Ok(StructProxy::new(self, self.static_address(symbol)?))
    }
}

/// Access the pointer to the first interpreter of the process.
///
/// The location of the pointer depends on the version of the runtime, but
/// it's always read lazily.
pub fn interp_head(handle: &ProcessHandle) -> Result<PointerProxy<'_, PyInterpreterState>, Error> {
    if handle.version().python >= RUNTIME_STATE_SINCE {
        let runtime = handle.static_struct::<PyRuntimeState>(PY_RUNTIME)?;
        return runtime.interpreters()?.head();
    }

    handle.static_pointer(INTERP_HEAD)
}
