use crate::{
    error::Error,
    layout::StructKind,
    proxy::{FieldProxy, PointerProxy, Struct, StructProxy},
    structs::{PyInterpreterState, PyThreadState},
};

/// The global runtime state, `_PyRuntimeState`. Only exists since 3.7.
pub enum PyRuntimeState {}

impl Struct for PyRuntimeState {
    const KIND: StructKind = StructKind::PyRuntimeState;
}

/// The `interpreters` member embedded in `_PyRuntimeState`.
pub enum PyInterpreters {}

impl Struct for PyInterpreters {
    const KIND: StructKind = StructKind::PyInterpreters;
}

impl<'a> StructProxy<'a, PyRuntimeState> {
    pub fn initialized(&self) -> Result<FieldProxy<'a, bool>, Error> {
        self.scalar("initialized")
    }

    /// The thread finalizing the runtime, if any.
    pub fn finalizing(&self) -> Result<PointerProxy<'a, PyThreadState>, Error> {
        self.pointer("finalizing")
    }

    pub fn interpreters(&self) -> Result<StructProxy<'a, PyInterpreters>, Error> {
        self.nested("interpreters")
    }
}

impl<'a> StructProxy<'a, PyInterpreters> {
    /// The first interpreter.
    pub fn head(&self) -> Result<PointerProxy<'a, PyInterpreterState>, Error> {
        self.pointer("head")
    }

    /// The main interpreter.
    pub fn main(&self) -> Result<PointerProxy<'a, PyInterpreterState>, Error> {
        self.pointer("main")
    }

    pub fn next_id(&self) -> Result<FieldProxy<'a, i64>, Error> {
        self.scalar("next_id")
    }
}
