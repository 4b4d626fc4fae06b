//! Read and traverse the runtime state of a live Python interpreter from
//! outside of the process running it.
//!
//! Everything is exposed through typed, lazy proxies. Constructing a proxy
//! never reads memory, reading one of its fields always reads the current
//! value from the process.
//!
//! ```no_run
//! use pyproxy::{
//!     list_interpreter_states, BuildVersion, MemoryMap, ProcessHandle, PythonVersion,
//!     RuntimeInfo, SymbolTable, Target,
//! };
//!
//! # fn main() -> Result<(), pyproxy::Error> {
//! let runtime = RuntimeInfo {
//!     version: BuildVersion::new(PythonVersion::new(3, 6), Target::lp64()),
//!     module: String::from("python3.6"),
//! };
//!
//! let handle = ProcessHandle::builder(1234, runtime).build(MemoryMap::new(), SymbolTable::new());
//!
//! for interp in list_interpreter_states(&handle)? {
//!     let interp = interp?;
//!
//!     for thread in interp.thread_states()? {
//!         println!("{:?}: {}", thread?, interp.modules()?.read()?);
//!     }
//! }
//! # Ok(()) }
//! ```

#[macro_use]
mod utils;
mod address;
mod data_items;
mod error;
pub mod layout;
mod memory;
pub mod opts;
mod process_handle;
mod proxy;
pub mod runtime;
pub mod structs;
mod symbols;
mod traversal;
mod version;

pub use self::address::{Address, Size};
pub use self::data_items::DataItems;
pub use self::error::{Error, LayoutError, MemoryAccessError, SymbolNotFoundError};
pub use self::layout::{LayoutRegistry, LayoutSource, LayoutTable, StructKind, StructLayout};
#[cfg(unix)]
pub use self::memory::ProcMemReader;
pub use self::memory::{MemoryMap, MemoryReader};
pub use self::process_handle::{ProcessHandle, ProcessHandleBuilder, ProcessId, RuntimeInfo};
pub use self::proxy::{Decode, FieldProxy, PointerProxy, Struct, StructProxy};
pub use self::symbols::{SymbolResolver, SymbolTable};
pub use self::traversal::{list_interpreter_states, Linked, LinkedList};
pub use self::version::{BuildVersion, Endianness, PythonVersion, Target, Width};
