use crate::{
    address::{Address, Size},
    layout::{FieldKind, StructKind},
    version::BuildVersion,
};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    MemoryAccess(#[from] MemoryAccessError),
    #[error(transparent)]
    SymbolNotFound(#[from] SymbolNotFoundError),
    #[error("dereferenced null pointer to {0}")]
    NullPointer(StructKind),
    #[error("value {0} does not fit within type {1}")]
    ValueConversion(i128, &'static str),
    #[error("address add operation `{0} + {1}` overflowed")]
    AddressAdd(Address, Size),
    #[error("traversal of {0} list stopped after {1} elements")]
    TraversalLimit(StructKind, usize),
    #[error("failed to convert string to address")]
    AddressFromStr,
    #[error("bad python version `{0}`, expected something like `3.7`")]
    VersionFromStr(String),
    #[error("failed to decode utf-8 string at {0}")]
    NonUtf8(Address),
    #[error("failed to parse table")]
    TableFormat(#[source] serde_json::Error),
    #[error("system error: {0}")]
    System(#[source] io::Error),
}

impl Error {
    /// Test if the error signals an interpreter build we don't know how to
    /// inspect, as opposed to a transient process condition.
    pub fn is_unsupported_build(&self) -> bool {
        match self {
            Self::Layout(..) | Self::SymbolNotFound(..) => true,
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Self::System(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::TableFormat(error)
    }
}

/// A struct or field is not described for the detected interpreter build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("struct {kind} is not supported for {version}")]
    UnsupportedStruct {
        kind: StructKind,
        version: BuildVersion,
    },
    #[error("struct {kind} has no field `{field}` in {version}")]
    UnknownField {
        kind: StructKind,
        field: String,
        version: BuildVersion,
    },
    #[error("field {kind}.{field} is a {actual}, not a {expected}")]
    FieldKind {
        kind: StructKind,
        field: String,
        expected: &'static str,
        actual: FieldKind,
    },
    #[error("field {kind}.{field} is {size} bytes wide, which does not fit in {ty}")]
    FieldWidth {
        kind: StructKind,
        field: String,
        size: u64,
        ty: &'static str,
    },
    #[error("struct {0} contains itself")]
    Recursive(StructKind),
    #[error("field {kind}.{field} lies outside of the address space")]
    Overflow { kind: StructKind, field: String },
}

/// A read of remote memory could not be completed.
#[derive(Debug, Error)]
#[error("failed to read {len} bytes at {address}")]
pub struct MemoryAccessError {
    pub address: Address,
    pub len: usize,
    #[source]
    pub source: Option<io::Error>,
}

impl MemoryAccessError {
    /// Construct a read error without an underlying cause.
    pub fn new(address: Address, len: usize) -> Self {
        Self {
            address,
            len,
            source: None,
        }
    }

    /// Construct a read error caused by a system error.
    pub fn with_source(address: Address, len: usize, source: io::Error) -> Self {
        Self {
            address,
            len,
            source: Some(source),
        }
    }
}

/// The attached runtime image does not export an expected symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("symbol `{symbol}` not found in module `{module}`")]
pub struct SymbolNotFoundError {
    pub module: String,
    pub symbol: String,
}
