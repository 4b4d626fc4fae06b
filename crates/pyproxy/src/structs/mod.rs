//! Typed proxies for the interpreter structs.
//!
//! Each struct is an uninhabited marker type implementing [Struct], its
//! fields are accessed through inherent methods on the corresponding
//! [StructProxy][crate::StructProxy].

mod interpreter;
mod object;
mod runtime_state;
mod thread;

pub use self::interpreter::PyInterpreterState;
pub use self::object::{PyDictObject, PyObject, PyTypeObject, PyVarObject, TypeFlags};
pub use self::runtime_state::{PyInterpreters, PyRuntimeState};
pub use self::thread::PyThreadState;
