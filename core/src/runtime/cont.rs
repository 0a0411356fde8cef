//! Continuations as values

use super::types::{Flow, Frame, Signal, Stack, Unwind};
use crate::values::Val;
use std::rc::Rc;

/// A callable continuation bound to a captured stack.
///
/// Invocable any number of times; the captured stack is shared and never
/// mutated, so every invocation replays the same extent.
#[derive(Clone)]
pub struct Continuation {
    stack: Rc<Stack>,
}

impl Continuation {
    pub fn new(stack: Stack) -> Self {
        Self {
            stack: Rc::new(stack),
        }
    }

    /// Number of frames in the captured stack
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn same_as(&self, other: &Continuation) -> bool {
        Rc::ptr_eq(&self.stack, &other.stack)
    }

    /// Resume the captured extent with `v` as the result of its capture point.
    pub fn invoke(&self, v: Val) -> Flow {
        self.restore_with(Ok(v))
    }

    /// Resume the captured extent by raising `err` at its capture point.
    pub fn throw(&self, err: Val) -> Flow {
        self.restore_with(Err(err))
    }

    fn restore_with(&self, outcome: Result<Val, Val>) -> Flow {
        let mut stack = Vec::with_capacity(self.stack.len() + 1);
        stack.push(Frame::restart(outcome));
        stack.extend(self.stack.iter().cloned());
        Err(Unwind::Signal(Signal::Restore {
            stack,
            saved: Vec::new(),
        }))
    }
}
