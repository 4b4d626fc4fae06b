//! Layouts of the native interpreter structs we know how to read.
//!
//! Struct shapes differ between interpreter versions and platforms. Callers
//! name fields, and the [LayoutRegistry] translates `(struct, field, build)`
//! into an offset and a size. Layouts are derived from declarations provided
//! by a [LayoutSource] using C layout rules, unless the declaration carries
//! explicit offsets (like tables extracted from debug information).

mod builtin;
mod table;

pub use self::builtin::Builtin;
pub use self::table::{LayoutTable, TableStruct};

use crate::{
    error::LayoutError,
    version::{BuildVersion, Target},
};
use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// The native structs this crate knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StructKind {
    PyObject,
    PyVarObject,
    PyTypeObject,
    PyDictObject,
    PyInterpreterState,
    PyThreadState,
    PyRuntimeState,
    PyInterpreters,
}

impl StructKind {
    /// The name of the struct.
    pub fn name(self) -> &'static str {
        match self {
            Self::PyObject => "PyObject",
            Self::PyVarObject => "PyVarObject",
            Self::PyTypeObject => "PyTypeObject",
            Self::PyDictObject => "PyDictObject",
            Self::PyInterpreterState => "PyInterpreterState",
            Self::PyThreadState => "PyThreadState",
            Self::PyRuntimeState => "_PyRuntimeState",
            Self::PyInterpreters => "pyinterpreters",
        }
    }
}

impl fmt::Display for StructKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

/// The C type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    /// C `int`.
    Int,
    /// C `unsigned int`.
    #[serde(rename = "uint")]
    UInt,
    /// C `long`, which varies with the data model.
    Long,
    /// C `unsigned long`.
    #[serde(rename = "ulong")]
    ULong,
    /// `Py_ssize_t`.
    #[serde(rename = "ssize")]
    SSize,
    /// `size_t`.
    #[serde(rename = "usize")]
    USize,
    /// A pointer, to a known struct or to something opaque.
    Pointer(Option<StructKind>),
    /// A struct embedded by value.
    Struct(StructKind),
}

impl CType {
    /// Size and signedness of scalar types for the given target.
    fn scalar(self, target: &Target) -> Option<(u64, bool)> {
        Some(match self {
            Self::I8 => (1, true),
            Self::U8 => (1, false),
            Self::I16 => (2, true),
            Self::U16 => (2, false),
            Self::I32 | Self::Int => (4, true),
            Self::U32 | Self::UInt => (4, false),
            Self::I64 => (8, true),
            Self::U64 => (8, false),
            Self::Long => (target.long.size() as u64, true),
            Self::ULong => (target.long.size() as u64, false),
            Self::SSize => (target.pointer.size() as u64, true),
            Self::USize => (target.pointer.size() as u64, false),
            Self::Pointer(..) | Self::Struct(..) => return None,
        })
    }
}

/// Declaration of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: CType,
    /// Explicit offset, overriding the one derived from C layout rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl FieldDecl {
    pub fn new(name: &str, ty: CType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            offset: None,
        }
    }
}

/// Declaration of a struct for one interpreter build.
///
/// Declarations may stop after the last field of interest, in which case the
/// derived size only covers that prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDecl {
    pub kind: StructKind,
    pub fields: Vec<FieldDecl>,
    /// Explicit size of the struct.
    pub size: Option<u64>,
}

/// What a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// An integer, enum or flag set.
    Scalar { signed: bool },
    /// The address of something else.
    Pointer(Option<StructKind>),
    /// A struct embedded by value.
    Struct(StructKind),
}

impl fmt::Display for FieldKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar { signed: true } => write!(fmt, "signed scalar"),
            Self::Scalar { signed: false } => write!(fmt, "unsigned scalar"),
            Self::Pointer(Some(kind)) => write!(fmt, "pointer to {}", kind),
            Self::Pointer(None) => write!(fmt, "pointer"),
            Self::Struct(kind) => write!(fmt, "struct {}", kind),
        }
    }
}

/// Location of a field inside of its struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldLayout {
    pub offset: u64,
    pub size: u64,
    pub kind: FieldKind,
}

/// The resolved layout of a struct for one interpreter build.
#[derive(Debug, Clone)]
pub struct StructLayout {
    kind: StructKind,
    version: BuildVersion,
    size: u64,
    align: u64,
    fields: HashMap<String, FieldLayout>,
}

impl StructLayout {
    /// The struct this is the layout of.
    pub fn kind(&self) -> StructKind {
        self.kind
    }

    /// The build this layout applies to.
    pub fn version(&self) -> &BuildVersion {
        &self.version
    }

    /// Size of the struct in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Alignment of the struct in bytes.
    pub fn align(&self) -> u64 {
        self.align
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Result<FieldLayout, LayoutError> {
        self.fields
            .get(name)
            .copied()
            .ok_or_else(|| LayoutError::UnknownField {
                kind: self.kind,
                field: name.to_string(),
                version: self.version,
            })
    }

    /// Iterate over all fields in offset order.
    pub fn fields(&self) -> Vec<(&str, FieldLayout)> {
        let mut fields = self
            .fields
            .iter()
            .map(|(name, field)| (name.as_str(), *field))
            .collect::<Vec<_>>();

        fields.sort_by_key(|(_, field)| field.offset);
        fields
    }
}

/// Provides struct declarations for interpreter builds.
pub trait LayoutSource: Send + Sync {
    /// Declare `kind` for `version`, or `None` if the source doesn't know it.
    fn declare(&self, kind: StructKind, version: &BuildVersion) -> Option<StructDecl>;
}

impl<T> LayoutSource for Arc<T>
where
    T: ?Sized + LayoutSource,
{
    fn declare(&self, kind: StructKind, version: &BuildVersion) -> Option<StructDecl> {
        (**self).declare(kind, version)
    }
}

/// Resolves and memoizes struct layouts per `(struct, build)`.
pub struct LayoutRegistry {
    /// Sources, in the order they are consulted.
    sources: Vec<Box<dyn LayoutSource>>,
    layouts: RwLock<HashMap<(StructKind, BuildVersion), Arc<StructLayout>>>,
}

impl LayoutRegistry {
    /// A registry backed by the built-in declarations.
    pub fn new() -> Self {
        Self::empty().with_source(Builtin)
    }

    /// A registry without any sources.
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            layouts: RwLock::new(HashMap::new()),
        }
    }

    /// Add a source, consulted after every source added before it.
    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: 'static + LayoutSource,
    {
        self.sources.push(Box::new(source));
        self
    }

    /// Add a source, consulted before every source added before it.
    pub fn with_override<S>(mut self, source: S) -> Self
    where
        S: 'static + LayoutSource,
    {
        self.sources.insert(0, Box::new(source));
        self
    }

    /// Resolve a single field.
    pub fn resolve(
        &self,
        kind: StructKind,
        field: &str,
        version: &BuildVersion,
    ) -> Result<FieldLayout, LayoutError> {
        self.layout(kind, version)?.field(field)
    }

    /// Get the layout of the given struct.
    pub fn layout(
        &self,
        kind: StructKind,
        version: &BuildVersion,
    ) -> Result<Arc<StructLayout>, LayoutError> {
        self.derive(kind, version, &mut Vec::new())
    }

    fn derive(
        &self,
        kind: StructKind,
        version: &BuildVersion,
        stack: &mut Vec<StructKind>,
    ) -> Result<Arc<StructLayout>, LayoutError> {
        if let Some(layout) = self.layouts.read().get(&(kind, *version)) {
            return Ok(layout.clone());
        }

        if stack.contains(&kind) {
            return Err(LayoutError::Recursive(kind));
        }

        let decl = self
            .sources
            .iter()
            .find_map(|s| s.declare(kind, version))
            .ok_or_else(|| LayoutError::UnsupportedStruct {
                kind,
                version: *version,
            })?;

        stack.push(kind);
        let layout = self.compute(decl, version, stack);
        stack.pop();
        let layout = layout?;

        log::debug!(
            "derived layout of {} for {}: {} fields, {} bytes",
            kind,
            version,
            layout.fields.len(),
            layout.size
        );

        let mut layouts = self.layouts.write();
        let layout = layouts
            .entry((kind, *version))
            .or_insert_with(|| Arc::new(layout));
        Ok(layout.clone())
    }

    fn compute(
        &self,
        decl: StructDecl,
        version: &BuildVersion,
        stack: &mut Vec<StructKind>,
    ) -> Result<StructLayout, LayoutError> {
        let target = &version.target;
        let pointer = target.pointer.size() as u64;

        let kind = decl.kind;
        let mut fields = HashMap::with_capacity(decl.fields.len());
        let mut end = 0u64;
        let mut align = 1u64;
        // The field which extends the furthest.
        let mut last = None;

        for field in decl.fields {
            let (size, field_align, field_kind) = match field.ty {
                CType::Pointer(to) => (pointer, pointer, FieldKind::Pointer(to)),
                CType::Struct(nested) => {
                    let nested_layout = self.derive(nested, version, stack)?;
                    (
                        nested_layout.size,
                        nested_layout.align,
                        FieldKind::Struct(nested),
                    )
                }
                ty => match ty.scalar(target) {
                    Some((size, signed)) => (size, size, FieldKind::Scalar { signed }),
                    None => unreachable!("non-scalar types are handled above"),
                },
            };

            let overflow = || LayoutError::Overflow {
                kind,
                field: field.name.clone(),
            };

            let offset = match field.offset {
                Some(offset) => offset,
                None => align_up(end, field_align).ok_or_else(overflow)?,
            };

            let field_end = offset.checked_add(size).ok_or_else(overflow)?;

            if field_end >= end {
                end = field_end;
                last = Some(field.name.clone());
            }

            align = u64::max(align, field_align);

            fields.insert(
                field.name,
                FieldLayout {
                    offset,
                    size,
                    kind: field_kind,
                },
            );
        }

        let size = match decl.size {
            Some(size) => size,
            None => align_up(end, align).ok_or_else(|| LayoutError::Overflow {
                kind,
                field: last.unwrap_or_default(),
            })?,
        };

        Ok(StructLayout {
            kind,
            version: *version,
            size,
            align,
            fields,
        })
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LayoutRegistry {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("LayoutRegistry")
            .field("sources", &self.sources.len())
            .field("layouts", &self.layouts.read().len())
            .finish()
    }
}

fn align_up(value: u64, align: u64) -> Option<u64> {
    match value % align {
        0 => Some(value),
        rem => value.checked_add(align - rem),
    }
}
