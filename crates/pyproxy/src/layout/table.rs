use super::{FieldDecl, LayoutSource, StructDecl, StructKind};
use crate::{
    error::Error,
    version::{BuildVersion, PythonVersion, Target},
};
use serde::{Deserialize, Serialize};
use std::io;

/// Struct declarations for a single interpreter build, typically extracted
/// from the debug information of the interpreter binary.
///
/// ```json
/// {
///     "python": {"major": 3, "minor": 8},
///     "structs": [
///         {
///             "kind": "PyThreadState",
///             "fields": [
///                 {"name": "next", "type": {"pointer": "PyThreadState"}, "offset": 8}
///             ]
///         }
///     ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutTable {
    pub python: PythonVersion,
    /// Restrict the table to one target, otherwise it applies to all of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    pub structs: Vec<TableStruct>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStruct {
    pub kind: StructKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub fields: Vec<FieldDecl>,
}

impl LayoutTable {
    /// Load a single table from JSON.
    pub fn from_reader<R>(reader: R) -> Result<Self, Error>
    where
        R: io::Read,
    {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load a list of tables from JSON.
    pub fn list_from_reader<R>(reader: R) -> Result<Vec<Self>, Error>
    where
        R: io::Read,
    {
        Ok(serde_json::from_reader(reader)?)
    }

    fn applies_to(&self, version: &BuildVersion) -> bool {
        if self.python != version.python {
            return false;
        }

        match &self.target {
            Some(target) => *target == version.target,
            None => true,
        }
    }
}

impl LayoutSource for LayoutTable {
    fn declare(&self, kind: StructKind, version: &BuildVersion) -> Option<StructDecl> {
        if !self.applies_to(version) {
            return None;
        }

        let s = self.structs.iter().find(|s| s.kind == kind)?;

        Some(StructDecl {
            kind,
            fields: s.fields.clone(),
            size: s.size,
        })
    }
}

impl LayoutSource for Vec<LayoutTable> {
    fn declare(&self, kind: StructKind, version: &BuildVersion) -> Option<StructDecl> {
        self.iter().find_map(|table| table.declare(kind, version))
    }
}
