#![allow(dead_code)]

use parking_lot::Mutex;
use pyproxy::{
    Address, BuildVersion, LayoutRegistry, MemoryAccessError, MemoryMap, MemoryReader,
    ProcessHandle, PythonVersion, RuntimeInfo, StructKind, SymbolNotFoundError, SymbolResolver,
    SymbolTable, Target,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

pub const MODULE: &str = "libpython";

/// Reads from a shared memory map, counting reads and failing on poisoned
/// addresses.
#[derive(Clone, Default)]
pub struct FakeReader {
    memory: Arc<Mutex<MemoryMap>>,
    poisoned: Arc<Mutex<Vec<Address>>>,
    reads: Arc<AtomicUsize>,
}

impl MemoryReader for FakeReader {
    fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<(), MemoryAccessError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let start = address.into_inner();
        let end = start + buf.len() as u64;

        let poisoned = self.poisoned.lock().iter().any(|p| {
            let p = p.into_inner();
            start <= p && p < end
        });

        if poisoned {
            return Err(MemoryAccessError::new(address, buf.len()));
        }

        self.memory.lock().read_memory(address, buf)
    }
}

/// Looks up symbols, counting lookups.
#[derive(Clone, Default)]
pub struct FakeSymbols {
    table: Arc<Mutex<SymbolTable>>,
    lookups: Arc<AtomicUsize>,
}

impl SymbolResolver for FakeSymbols {
    fn locate_static_symbol(
        &self,
        module: &str,
        symbol: &str,
    ) -> Result<Address, SymbolNotFoundError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.table.lock().locate_static_symbol(module, symbol)
    }
}

/// A process image assembled in memory, laid out according to the same
/// layouts the proxies use.
pub struct FakeProcess {
    pub version: BuildVersion,
    pub layouts: Arc<LayoutRegistry>,
    reader: FakeReader,
    symbols: FakeSymbols,
}

impl FakeProcess {
    pub fn new(major: u8, minor: u8) -> Self {
        Self {
            version: BuildVersion::new(PythonVersion::new(major, minor), Target::lp64()),
            layouts: Arc::new(LayoutRegistry::new()),
            reader: FakeReader::default(),
            symbols: FakeSymbols::default(),
        }
    }

    /// Build a handle for the process.
    pub fn handle(&self) -> ProcessHandle {
        let runtime = RuntimeInfo {
            version: self.version,
            module: MODULE.to_string(),
        };

        ProcessHandle::builder(42, runtime)
            .layouts(self.layouts.clone())
            .build(self.reader.clone(), self.symbols.clone())
    }

    /// Number of memory reads performed so far.
    pub fn reads(&self) -> usize {
        self.reader.reads.load(Ordering::SeqCst)
    }

    /// Number of symbol lookups performed so far.
    pub fn lookups(&self) -> usize {
        self.symbols.lookups.load(Ordering::SeqCst)
    }

    pub fn symbol(&self, name: &str, address: u64) {
        self.symbols
            .table
            .lock()
            .insert(MODULE, name, Address::new(address));
    }

    /// Make every read covering the given address fail.
    pub fn poison(&self, address: u64) {
        self.reader.poisoned.lock().push(Address::new(address));
    }

    /// Map zeroed memory.
    pub fn map(&self, address: u64, len: usize) {
        self.reader
            .memory
            .lock()
            .insert(Address::new(address), vec![0u8; len]);
    }

    /// Write raw bytes into mapped memory.
    pub fn write(&self, address: u64, bytes: &[u8]) {
        self.reader
            .memory
            .lock()
            .insert(Address::new(address), bytes.to_vec());
    }

    /// Map a zeroed struct of the given kind.
    pub fn alloc(&self, kind: StructKind, address: u64) {
        let layout = self.layouts.layout(kind, &self.version).unwrap();
        self.map(address, layout.size() as usize);
    }

    /// The offset of a field.
    pub fn offset(&self, kind: StructKind, field: &str) -> u64 {
        self.layouts.resolve(kind, field, &self.version).unwrap().offset
    }

    /// Write a scalar or pointer field of the struct at `base`.
    pub fn set(&self, kind: StructKind, base: u64, field: &str, value: u64) {
        let field = self.layouts.resolve(kind, field, &self.version).unwrap();
        let bytes = value.to_le_bytes();
        self.write(base + field.offset, &bytes[..field.size as usize]);
    }
}
