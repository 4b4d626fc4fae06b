//! Lazy traversal of the intrusive linked lists kept by the interpreter.

use crate::{
    error::Error,
    process_handle::ProcessHandle,
    proxy::{PointerProxy, Struct, StructProxy},
    runtime,
    structs::PyInterpreterState,
};
use std::{fmt, iter::FusedIterator, mem};

/// A struct which links to the next struct of the same kind.
pub trait Linked: Struct {
    /// The name of the field pointing to the next element.
    const NEXT: &'static str;
}

enum State<'a, S> {
    /// Nothing has been read yet.
    Head(PointerProxy<'a, S>),
    /// The last element produced.
    Node(StructProxy<'a, S>),
    Done,
}

/// An iterator over a linked list in the inspected process.
///
/// Nothing is read until the iterator is advanced, and every step reads one
/// link from the live process. A failed read is produced as an error and
/// ends the iteration. If the process is changing the list concurrently the
/// elements produced might not correspond to any one consistent state of it.
pub struct LinkedList<'a, S> {
    state: State<'a, S>,
    limit: Option<usize>,
    count: usize,
}

impl<'a, S> LinkedList<'a, S>
where
    S: Linked,
{
    /// Construct a list starting from the given head pointer.
    pub fn new(head: PointerProxy<'a, S>) -> Self {
        Self {
            state: State::Head(head),
            limit: None,
            count: 0,
        }
    }

    /// Fail with [Error::TraversalLimit] instead of producing more than
    /// `limit` elements, like when walking a list which is cyclic.
    pub fn with_limit(self, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }

    /// Number of elements produced so far.
    pub fn count_so_far(&self) -> usize {
        self.count
    }

    fn step(&mut self) -> Option<Result<StructProxy<'a, S>, Error>> {
        let pointer = match mem::replace(&mut self.state, State::Done) {
            State::Head(head) => head,
            State::Node(node) => try_iter!(node.pointer::<S>(S::NEXT)),
            State::Done => return None,
        };

        let node = try_iter!(pointer.try_deref())?;

        if let Some(limit) = self.limit {
            if self.count >= limit {
                return Some(Err(Error::TraversalLimit(S::KIND, limit)));
            }
        }

        self.count += 1;
        self.state = State::Node(node);
        Some(Ok(node))
    }
}

impl<'a, S> Iterator for LinkedList<'a, S>
where
    S: Linked,
{
    type Item = Result<StructProxy<'a, S>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}

impl<S> FusedIterator for LinkedList<'_, S> where S: Linked {}

impl<S> fmt::Debug for LinkedList<'_, S>
where
    S: Linked,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Head(head) => format!("head {:?}", head),
            State::Node(node) => format!("at {:?}", node),
            State::Done => String::from("done"),
        };

        fmt.debug_struct("LinkedList")
            .field("state", &state)
            .field("limit", &self.limit)
            .field("count", &self.count)
            .finish()
    }
}

/// Iterate over every interpreter of the process.
///
/// Locating the head of the list might require looking up a symbol, which
/// is the only thing that can fail before iteration starts.
pub fn list_interpreter_states(
    handle: &ProcessHandle,
) -> Result<LinkedList<'_, PyInterpreterState>, Error> {
    Ok(LinkedList::new(runtime::interp_head(handle)?))
}
