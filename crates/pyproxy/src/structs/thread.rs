use crate::{
    address::Address,
    error::Error,
    layout::StructKind,
    proxy::{FieldProxy, PointerProxy, Struct, StructProxy},
    structs::PyInterpreterState,
    traversal::Linked,
};

/// The state of one thread, `PyThreadState`.
pub enum PyThreadState {}

impl Struct for PyThreadState {
    const KIND: StructKind = StructKind::PyThreadState;
}

impl Linked for PyThreadState {
    const NEXT: &'static str = "next";
}

impl<'a> StructProxy<'a, PyThreadState> {
    /// The next thread of the same interpreter.
    pub fn next(&self) -> Result<PointerProxy<'a, PyThreadState>, Error> {
        self.pointer("next")
    }

    /// The previous thread, python 3 only.
    pub fn prev(&self) -> Result<PointerProxy<'a, PyThreadState>, Error> {
        self.pointer("prev")
    }

    /// The interpreter this thread belongs to.
    pub fn interp(&self) -> Result<PointerProxy<'a, PyInterpreterState>, Error> {
        self.pointer("interp")
    }

    /// The frame currently executing, null if the thread is idle.
    pub fn frame(&self) -> Result<FieldProxy<'a, Address>, Error> {
        self.raw_pointer("frame")
    }

    pub fn recursion_depth(&self) -> Result<FieldProxy<'a, i32>, Error> {
        self.scalar("recursion_depth")
    }

    pub fn gilstate_counter(&self) -> Result<FieldProxy<'a, i32>, Error> {
        self.scalar("gilstate_counter")
    }

    /// The identifier of the native thread, as returned by
    /// `PyThread_get_thread_ident`.
    pub fn thread_id(&self) -> Result<FieldProxy<'a, u64>, Error> {
        self.scalar("thread_id")
    }
}
