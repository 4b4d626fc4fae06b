//! Readers for the memory of the inspected process.

use crate::{address::Address, error::MemoryAccessError};
use std::{collections::BTreeMap, convert::TryFrom, sync::Arc};

/// Reads raw bytes out of the address space of another process.
///
/// Every call is a blocking round trip to whatever transport backs the reader.
pub trait MemoryReader: Send + Sync {
    /// Fill `buf` with the memory at `address`.
    ///
    /// A read which can only be partially satisfied is an error.
    fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<(), MemoryAccessError>;
}

impl<T> MemoryReader for &T
where
    T: ?Sized + MemoryReader,
{
    fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<(), MemoryAccessError> {
        (**self).read_memory(address, buf)
    }
}

impl<T> MemoryReader for Box<T>
where
    T: ?Sized + MemoryReader,
{
    fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<(), MemoryAccessError> {
        (**self).read_memory(address, buf)
    }
}

impl<T> MemoryReader for Arc<T>
where
    T: ?Sized + MemoryReader,
{
    fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<(), MemoryAccessError> {
        (**self).read_memory(address, buf)
    }
}

/// A sparse set of memory regions, like the ones stored in a core dump.
///
/// Regions never overlap, inserting bytes replaces whatever they cover.
#[derive(Debug, Clone, Default)]
pub struct MemoryMap {
    regions: BTreeMap<u64, Vec<u8>>,
}

impl MemoryMap {
    /// Construct an empty memory map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Test if the map contains no memory.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Map the given bytes at `address`.
    pub fn insert(&mut self, address: Address, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();

        if bytes.is_empty() {
            return;
        }

        let start = address.0;
        let end = start.saturating_add(bytes.len() as u64);

        // Writes within an existing region are patched in place.
        if let Some((base, data)) = self.regions.range_mut(..=start).next_back() {
            let s = (start - *base) as usize;

            if let Some(target) = data.get_mut(s..s + bytes.len()) {
                target.copy_from_slice(&bytes);
                return;
            }
        }

        // Cut away whatever the new region shadows.
        let overlapping = self
            .regions
            .range(..end)
            .filter(|(base, data)| base.saturating_add(data.len() as u64) > start)
            .map(|(base, _)| *base)
            .collect::<Vec<_>>();

        for base in overlapping {
            let data = match self.regions.remove(&base) {
                Some(data) => data,
                None => continue,
            };

            let data_end = base + data.len() as u64;

            if base < start {
                let head = data[..(start - base) as usize].to_vec();
                self.regions.insert(base, head);
            }

            if data_end > end {
                let tail = data[(end - base) as usize..].to_vec();
                self.regions.insert(end, tail);
            }
        }

        self.regions.insert(start, bytes);
    }

    /// Unmap the region that starts at the given address.
    pub fn remove(&mut self, address: Address) -> Option<Vec<u8>> {
        self.regions.remove(&address.0)
    }

    /// The bytes mapped from `address` up to the end of the region holding
    /// it.
    fn region(&self, address: u64) -> Option<&[u8]> {
        let (base, data) = self.regions.range(..=address).next_back()?;
        let s = usize::try_from(address - base).ok()?;
        data.get(s..).filter(|rest| !rest.is_empty())
    }
}

impl MemoryReader for MemoryMap {
    /// Reads may span any number of adjacent regions.
    fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<(), MemoryAccessError> {
        let len = buf.len();
        let error = || MemoryAccessError::new(address, len);

        let mut filled = 0;

        while filled < len {
            let current = address.0.checked_add(filled as u64).ok_or_else(error)?;
            let data = self.region(current).ok_or_else(error)?;
            let n = usize::min(data.len(), len - filled);
            buf[filled..filled + n].copy_from_slice(&data[..n]);
            filled += n;
        }

        Ok(())
    }
}

#[cfg(unix)]
pub use self::proc_mem::ProcMemReader;

#[cfg(unix)]
mod proc_mem {
    use super::MemoryReader;
    use crate::{address::Address, error::MemoryAccessError};
    use std::{fs::File, io, os::unix::fs::FileExt as _, path::PathBuf};

    /// Reads the memory of a live process through `/proc/<pid>/mem`.
    ///
    /// The caller needs ptrace access to the process, either by being its
    /// tracer or through a permissive `ptrace_scope`.
    #[derive(Debug)]
    pub struct ProcMemReader {
        pid: u32,
        file: File,
    }

    impl ProcMemReader {
        /// Open the memory of the given process.
        pub fn open(pid: u32) -> io::Result<Self> {
            let path = PathBuf::from(format!("/proc/{}/mem", pid));
            let file = File::open(&path)?;
            Ok(Self { pid, file })
        }

        /// The process this reader reads from.
        pub fn pid(&self) -> u32 {
            self.pid
        }
    }

    impl MemoryReader for ProcMemReader {
        fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<(), MemoryAccessError> {
            self.file
                .read_exact_at(buf, address.0)
                .map_err(|e| MemoryAccessError::with_source(address, buf.len(), e))
        }
    }
}
