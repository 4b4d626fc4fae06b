//! High-level interface to an inspected process.

use crate::{
    address::{Address, Size},
    data_items::DataItems,
    error::{Error, MemoryAccessError},
    layout::{FieldLayout, LayoutRegistry, StructKind, StructLayout},
    memory::MemoryReader,
    proxy::{Struct, StructProxy},
    symbols::SymbolResolver,
    version::BuildVersion,
};
use std::{fmt, sync::Arc};

pub type ProcessId = u32;

/// How strings are read in chunks, chunks never cross a page boundary.
const STRING_CHUNK: usize = 0x40;

/// The interpreter runtime loaded in the inspected process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    /// The detected build of the runtime.
    pub version: BuildVersion,
    /// The module the runtime is loaded from, like `libpython3.7m.so.1.0` or
    /// `python27.dll`. Static symbols are looked up in it.
    pub module: String,
}

/// A handle for an inspected process.
///
/// Owns everything which is scoped to one process attachment: the memory
/// reader, symbol lookup and the [DataItems] cache. Dropping the handle
/// discards the cache.
pub struct ProcessHandle {
    id: ProcessId,
    runtime: RuntimeInfo,
    reader: Box<dyn MemoryReader>,
    symbols: Box<dyn SymbolResolver>,
    layouts: Arc<LayoutRegistry>,
    data_items: Arc<DataItems>,
}

impl ProcessHandle {
    /// Start building a handle for the given process.
    pub fn builder(id: ProcessId, runtime: RuntimeInfo) -> ProcessHandleBuilder {
        ProcessHandleBuilder {
            id,
            runtime,
            layouts: None,
            data_items: None,
        }
    }

    /// The id of the process.
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Information on the runtime loaded in the process.
    pub fn runtime(&self) -> &RuntimeInfo {
        &self.runtime
    }

    /// The build of the interpreter running in the process.
    pub fn version(&self) -> &BuildVersion {
        &self.runtime.version
    }

    /// The layouts used to interpret the memory of this process.
    pub fn layouts(&self) -> &LayoutRegistry {
        &self.layouts
    }

    /// The per-process cache.
    pub fn data_items(&self) -> &DataItems {
        &self.data_items
    }

    pub(crate) fn symbols(&self) -> &dyn SymbolResolver {
        &*self.symbols
    }

    /// Get the layout of a struct for the build of this process.
    pub fn layout(&self, kind: StructKind) -> Result<Arc<StructLayout>, Error> {
        Ok(self.layouts.layout(kind, &self.runtime.version)?)
    }

    /// Resolve a field of a struct for the build of this process.
    pub fn resolve_field(&self, kind: StructKind, field: &str) -> Result<FieldLayout, Error> {
        Ok(self.layouts.resolve(kind, field, &self.runtime.version)?)
    }

    /// Construct a proxy for the struct at the given address.
    ///
    /// This doesn't read any memory.
    pub fn struct_proxy<S>(&self, address: Address) -> StructProxy<'_, S>
    where
        S: Struct,
    {
        StructProxy::new(self, address)
    }

    /// Read process memory at the specified address.
    pub fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<(), MemoryAccessError> {
        log::trace!("read {} bytes at {}", buf.len(), address);
        self.reader.read_memory(address, buf)
    }

    /// Read a nul-terminated string of at most `max` bytes.
    ///
    /// Strings without a terminator within `max` bytes are truncated.
    pub fn read_c_string(&self, address: Address, max: usize) -> Result<String, Error> {
        let mut out = Vec::new();
        let mut current = address;
        let mut chunk = [0u8; STRING_CHUNK];

        while out.len() < max {
            // NB: stay within the current chunk-aligned block.
            let misalign = (current.0 % STRING_CHUNK as u64) as usize;
            let len = usize::min(STRING_CHUNK - misalign, max - out.len());
            let buf = &mut chunk[..len];

            self.read_memory(current, buf)?;

            if let Some(end) = buf.iter().position(|b| *b == 0) {
                out.extend_from_slice(&buf[..end]);
                break;
            }

            out.extend_from_slice(buf);
            current = current.add(Size::new(len as u64))?;
        }

        String::from_utf8(out).map_err(|_| Error::NonUtf8(address))
    }

    /// Detach from the process, discarding everything cached for it.
    pub fn detach(self) {
        log::debug!("detaching from process {}", self.id);
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.data_items.clear();
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("ProcessHandle")
            .field("id", &self.id)
            .field("runtime", &self.runtime)
            .field("data_items", &self.data_items)
            .finish()
    }
}

/// Builder for a [ProcessHandle].
pub struct ProcessHandleBuilder {
    id: ProcessId,
    runtime: RuntimeInfo,
    layouts: Option<Arc<LayoutRegistry>>,
    data_items: Option<Arc<DataItems>>,
}

impl ProcessHandleBuilder {
    /// Use the given layout registry, which can be shared between processes.
    ///
    /// Defaults to a registry with the built-in declarations.
    pub fn layouts(self, layouts: Arc<LayoutRegistry>) -> Self {
        Self {
            layouts: Some(layouts),
            ..self
        }
    }

    /// Use the given cache for process-scoped items.
    ///
    /// Defaults to a new, empty cache.
    pub fn data_items(self, data_items: Arc<DataItems>) -> Self {
        Self {
            data_items: Some(data_items),
            ..self
        }
    }

    /// Build the process handle.
    pub fn build<R, S>(self, reader: R, symbols: S) -> ProcessHandle
    where
        R: 'static + MemoryReader,
        S: 'static + SymbolResolver,
    {
        ProcessHandle {
            id: self.id,
            runtime: self.runtime,
            reader: Box::new(reader),
            symbols: Box::new(symbols),
            layouts: self
                .layouts
                .unwrap_or_else(|| Arc::new(LayoutRegistry::new())),
            data_items: self.data_items.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ProcessHandle, RuntimeInfo};
    use crate::{
        data_items::DataItems,
        memory::MemoryMap,
        symbols::SymbolTable,
        version::{BuildVersion, PythonVersion, Target},
        Address,
    };
    use std::sync::Arc;

    fn runtime() -> RuntimeInfo {
        RuntimeInfo {
            version: BuildVersion::new(PythonVersion::new(3, 7), Target::lp64()),
            module: String::from("libpython3.7m.so"),
        }
    }

    #[test]
    fn test_read_c_string() {
        let mut map = MemoryMap::new();
        map.insert(Address::new(0x1000), vec![0xff; 0x100]);
        map.insert(Address::new(0x2000), vec![0xff; 0x100]);

        let mut text = b"a rather long type name which spans several chunks".to_vec();
        text.push(0);
        map.insert(Address::new(0x1038), text);
        map.insert(Address::new(0x2000), b"dict\0".to_vec());

        let handle = ProcessHandle::builder(1, runtime()).build(map, SymbolTable::new());

        assert_eq!(
            "a rather long type name which spans several chunks",
            handle.read_c_string(Address::new(0x1038), 256).unwrap()
        );
        assert_eq!("dict", handle.read_c_string(Address::new(0x2000), 256).unwrap());
        assert_eq!("di", handle.read_c_string(Address::new(0x2000), 2).unwrap());
        assert!(handle.read_c_string(Address::new(0x3000), 256).is_err());
    }

    #[test]
    fn test_drop_discards_data_items() {
        let data_items = Arc::new(DataItems::new());

        let handle = ProcessHandle::builder(1, runtime())
            .data_items(data_items.clone())
            .build(MemoryMap::new(), SymbolTable::new());

        handle
            .data_items()
            .get_or_try_insert_with::<u64, (), _>("item", || Ok(1))
            .unwrap();
        assert_eq!(1, data_items.len());

        handle.detach();
        assert!(data_items.is_empty());
    }
}
