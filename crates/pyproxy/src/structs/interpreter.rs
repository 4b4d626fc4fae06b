use crate::{
    error::Error,
    layout::StructKind,
    process_handle::ProcessHandle,
    proxy::{FieldProxy, PointerProxy, Struct, StructProxy},
    runtime,
    structs::{PyDictObject, PyThreadState},
    traversal::{Linked, LinkedList},
};

/// The state of one interpreter in the process, `PyInterpreterState`.
pub enum PyInterpreterState {}

impl Struct for PyInterpreterState {
    const KIND: StructKind = StructKind::PyInterpreterState;
}

impl Linked for PyInterpreterState {
    const NEXT: &'static str = "next";
}

impl PyInterpreterState {
    /// Access the pointer to the first interpreter of the process.
    ///
    /// See [runtime::interp_head].
    pub fn interp_head(handle: &ProcessHandle) -> Result<PointerProxy<'_, Self>, Error> {
        runtime::interp_head(handle)
    }
}

impl<'a> StructProxy<'a, PyInterpreterState> {
    /// The next interpreter.
    pub fn next(&self) -> Result<PointerProxy<'a, PyInterpreterState>, Error> {
        self.pointer("next")
    }

    /// The first thread of this interpreter.
    pub fn tstate_head(&self) -> Result<PointerProxy<'a, PyThreadState>, Error> {
        self.pointer("tstate_head")
    }

    /// The `sys.modules` dictionary.
    pub fn modules(&self) -> Result<PointerProxy<'a, PyDictObject>, Error> {
        self.pointer("modules")
    }

    /// Unique id of the interpreter, only available since 3.7.
    pub fn id(&self) -> Result<FieldProxy<'a, i64>, Error> {
        self.scalar("id")
    }

    /// Iterate over the threads of this interpreter.
    ///
    /// The list is read lazily from the live process, starting over from the
    /// head every time this is called.
    pub fn thread_states(&self) -> Result<LinkedList<'a, PyThreadState>, Error> {
        Ok(LinkedList::new(self.tstate_head()?))
    }
}
