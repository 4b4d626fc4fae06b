//! Declarations of CPython structs, as found in the headers of each release.
//!
//! Only the leading fields up to the last one this crate reads are declared.

use super::{CType, FieldDecl, LayoutSource, StructDecl, StructKind};
use crate::version::{BuildVersion, PythonVersion};

use self::CType::*;
use self::StructKind::*;

/// Opaque `PyObject *`.
const OBJECT: CType = Pointer(Some(PyObject));
/// Pointer to something we never look into.
const OPAQUE: CType = Pointer(None);

/// Built-in declarations for CPython 2.7, 3.5, 3.6 and 3.7 release builds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Builtin;

impl Builtin {
    /// Test if the given python version has built-in declarations.
    pub fn supports(version: PythonVersion) -> bool {
        match (version.major, version.minor) {
            (2, 7) | (3, 5) | (3, 6) | (3, 7) => true,
            _ => false,
        }
    }
}

impl LayoutSource for Builtin {
    fn declare(&self, kind: StructKind, version: &BuildVersion) -> Option<StructDecl> {
        let python = version.python;

        if !Self::supports(python) {
            return None;
        }

        let py3 = python.major == 3;
        let minor = python.minor;

        let fields: Vec<(&str, CType)> = match kind {
            PyObject => vec![("ob_refcnt", SSize), ("ob_type", Pointer(Some(PyTypeObject)))],
            PyVarObject => vec![("ob_base", Struct(PyObject)), ("ob_size", SSize)],
            PyTypeObject => vec![
                ("ob_base", Struct(PyVarObject)),
                ("tp_name", OPAQUE),
                ("tp_basicsize", SSize),
                ("tp_itemsize", SSize),
                ("tp_dealloc", OPAQUE),
                ("tp_print", OPAQUE),
                ("tp_getattr", OPAQUE),
                ("tp_setattr", OPAQUE),
                // `tp_compare` in 2.7, `tp_as_async` since 3.5.
                (if py3 { "tp_as_async" } else { "tp_compare" }, OPAQUE),
                ("tp_repr", OPAQUE),
                ("tp_as_number", OPAQUE),
                ("tp_as_sequence", OPAQUE),
                ("tp_as_mapping", OPAQUE),
                ("tp_hash", OPAQUE),
                ("tp_call", OPAQUE),
                ("tp_str", OPAQUE),
                ("tp_getattro", OPAQUE),
                ("tp_setattro", OPAQUE),
                ("tp_as_buffer", OPAQUE),
                ("tp_flags", if py3 { ULong } else { Long }),
                ("tp_doc", OPAQUE),
            ],
            PyDictObject if !py3 => vec![
                ("ob_base", Struct(PyObject)),
                ("ma_fill", SSize),
                ("ma_used", SSize),
                ("ma_mask", SSize),
                ("ma_table", OPAQUE),
            ],
            PyDictObject if minor == 5 => vec![
                ("ob_base", Struct(PyObject)),
                ("ma_used", SSize),
                ("ma_keys", OPAQUE),
                ("ma_values", OPAQUE),
            ],
            PyDictObject => vec![
                ("ob_base", Struct(PyObject)),
                ("ma_used", SSize),
                ("ma_version_tag", U64),
                ("ma_keys", OPAQUE),
                ("ma_values", OPAQUE),
            ],
            PyInterpreterState => interpreter_state(python),
            PyThreadState => thread_state(python),
            PyRuntimeState if minor >= 7 && py3 => vec![
                ("initialized", Int),
                ("core_initialized", Int),
                ("finalizing", Pointer(Some(PyThreadState))),
                ("interpreters", Struct(PyInterpreters)),
            ],
            PyInterpreters if minor >= 7 && py3 => vec![
                ("mutex", OPAQUE),
                ("head", Pointer(Some(PyInterpreterState))),
                ("main", Pointer(Some(PyInterpreterState))),
                ("next_id", I64),
            ],
            PyRuntimeState | PyInterpreters => return None,
        };

        Some(StructDecl {
            kind,
            fields: fields
                .into_iter()
                .map(|(name, ty)| FieldDecl::new(name, ty))
                .collect(),
            size: None,
        })
    }
}

fn interpreter_state(python: PythonVersion) -> Vec<(&'static str, CType)> {
    let mut fields = vec![
        ("next", Pointer(Some(PyInterpreterState))),
        ("tstate_head", Pointer(Some(PyThreadState))),
    ];

    match (python.major, python.minor) {
        (2, _) => {
            fields.extend(vec![
                ("modules", Pointer(Some(PyDictObject))),
                ("sysdict", OBJECT),
                ("builtins", OBJECT),
                ("modules_reloading", OBJECT),
                ("codec_search_path", OBJECT),
                ("codec_search_cache", OBJECT),
                ("codec_error_registry", OBJECT),
                ("dlopenflags", Int),
            ]);
        }
        (3, 5) | (3, 6) => {
            fields.extend(vec![
                ("modules", Pointer(Some(PyDictObject))),
                ("modules_by_index", OBJECT),
                ("sysdict", OBJECT),
                ("builtins", OBJECT),
                ("importlib", OBJECT),
                ("codec_search_path", OBJECT),
                ("codec_search_cache", OBJECT),
                ("codec_error_registry", OBJECT),
                ("codecs_initialized", Int),
                ("fscodec_initialized", Int),
                ("dlopenflags", Int),
                ("builtins_copy", OBJECT),
                ("import_func", OBJECT),
            ]);

            if python.minor == 6 {
                fields.push(("eval_frame", OPAQUE));
            }
        }
        _ => {
            fields.extend(vec![
                ("id", I64),
                ("modules", Pointer(Some(PyDictObject))),
                ("modules_by_index", OBJECT),
                ("sysdict", OBJECT),
                ("builtins", OBJECT),
                ("importlib", OBJECT),
                ("check_interval", Int),
                ("num_threads", Long),
                ("pythread_stacksize", USize),
                ("codec_search_path", OBJECT),
                ("codec_search_cache", OBJECT),
                ("codec_error_registry", OBJECT),
                ("codecs_initialized", Int),
                ("fscodec_initialized", Int),
            ]);
        }
    }

    fields
}

fn thread_state(python: PythonVersion) -> Vec<(&'static str, CType)> {
    let mut fields = Vec::new();

    if python.major == 3 {
        fields.push(("prev", Pointer(Some(PyThreadState))));
    }

    fields.extend(vec![
        ("next", Pointer(Some(PyThreadState))),
        ("interp", Pointer(Some(PyInterpreterState))),
        ("frame", OPAQUE),
        ("recursion_depth", Int),
    ]);

    if python.major == 3 {
        fields.push(("overflowed", I8));
        fields.push(("recursion_critical", I8));
    }

    if python.major == 3 && python.minor >= 7 {
        fields.push(("stackcheck_counter", Int));
    }

    fields.extend(vec![
        ("tracing", Int),
        ("use_tracing", Int),
        ("c_profilefunc", OPAQUE),
        ("c_tracefunc", OPAQUE),
        ("c_profileobj", OBJECT),
        ("c_traceobj", OBJECT),
        ("curexc_type", OBJECT),
        ("curexc_value", OBJECT),
        ("curexc_traceback", OBJECT),
    ]);

    if python.major == 3 && python.minor >= 7 {
        // members of the embedded `exc_state` stack item.
        fields.extend(vec![
            ("exc_type", OBJECT),
            ("exc_value", OBJECT),
            ("exc_traceback", OBJECT),
            ("exc_previous_item", OPAQUE),
            ("exc_info", OPAQUE),
        ]);
    } else {
        fields.extend(vec![
            ("exc_type", OBJECT),
            ("exc_value", OBJECT),
            ("exc_traceback", OBJECT),
        ]);
    }

    fields.push(("dict", OBJECT));

    if python.major == 2 {
        fields.push(("tick_counter", Int));
    }

    fields.extend(vec![("gilstate_counter", Int), ("async_exc", OBJECT)]);

    if python.major == 3 && python.minor >= 7 {
        fields.push(("thread_id", ULong));
    } else {
        fields.push(("thread_id", Long));
    }

    fields
}

#[cfg(test)]
mod tests {
    use crate::{
        layout::{FieldKind, LayoutRegistry, StructKind},
        version::{BuildVersion, PythonVersion, Target},
    };

    fn offset(registry: &LayoutRegistry, python: (u8, u8), kind: StructKind, field: &str) -> u64 {
        let version = BuildVersion::new(PythonVersion::new(python.0, python.1), Target::lp64());
        registry.resolve(kind, field, &version).unwrap().offset
    }

    #[test]
    fn test_known_offsets() {
        use StructKind::*;

        let registry = LayoutRegistry::new();

        assert_eq!(168, offset(&registry, (2, 7), PyTypeObject, "tp_flags"));
        assert_eq!(168, offset(&registry, (3, 7), PyTypeObject, "tp_flags"));
        assert_eq!(24, offset(&registry, (3, 6), PyTypeObject, "tp_name"));

        assert_eq!(0, offset(&registry, (2, 7), PyThreadState, "next"));
        assert_eq!(8, offset(&registry, (3, 6), PyThreadState, "next"));
        assert_eq!(144, offset(&registry, (2, 7), PyThreadState, "thread_id"));
        assert_eq!(152, offset(&registry, (3, 6), PyThreadState, "thread_id"));
        assert_eq!(176, offset(&registry, (3, 7), PyThreadState, "thread_id"));

        assert_eq!(16, offset(&registry, (2, 7), PyInterpreterState, "modules"));
        assert_eq!(24, offset(&registry, (3, 7), PyInterpreterState, "modules"));

        assert_eq!(16, offset(&registry, (3, 7), PyRuntimeState, "interpreters"));
        assert_eq!(8, offset(&registry, (3, 7), PyInterpreters, "head"));
    }

    #[test]
    fn test_nested_runtime_state() {
        let registry = LayoutRegistry::new();
        let version = BuildVersion::new(PythonVersion::new(3, 7), Target::lp64());

        let field = registry
            .resolve(StructKind::PyRuntimeState, "interpreters", &version)
            .unwrap();

        assert_eq!(FieldKind::Struct(StructKind::PyInterpreters), field.kind);
        assert_eq!(32, field.size);
    }

    #[test]
    fn test_unsupported() {
        let registry = LayoutRegistry::new();

        let old = BuildVersion::new(PythonVersion::new(3, 6), Target::lp64());
        assert!(registry.layout(StructKind::PyRuntimeState, &old).is_err());

        let new = BuildVersion::new(PythonVersion::new(3, 12), Target::lp64());
        assert!(registry.layout(StructKind::PyThreadState, &new).is_err());
    }
}
