//! Lazy capture
//!
//! A capture starts with an empty stack. As the signal propagates out through
//! each call site, that site appends its own frame, so only activations on the
//! active call path are ever reified.

use super::types::{Flow, Frame, Handler, Signal, Stack, Thunk, Unwind};
use super::{Mode, Runtime, RuntimeState, Strategy};
use tracing::trace;

pub struct LazyRuntime {
    state: RuntimeState,
}

impl LazyRuntime {
    pub fn new(stack_size: Option<usize>) -> Self {
        Self {
            state: RuntimeState::new(stack_size),
        }
    }
}

impl Runtime for LazyRuntime {
    fn strategy(&self) -> Strategy {
        Strategy::Lazy
    }

    fn state(&self) -> &RuntimeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuntimeState {
        &mut self.state
    }

    fn capture_cc(&mut self, handler: Handler) -> Flow {
        trace!("lazy capture");
        Err(Unwind::Signal(Signal::Capture {
            handler,
            stack: Vec::new(),
        }))
    }

    fn abort_cc(&mut self, handler: Thunk) -> Flow {
        trace!("abort");
        Err(Unwind::Signal(Signal::Discard { handler }))
    }

    fn enter_frame(
        &mut self,
        frame: &dyn Fn() -> Frame,
        body: &mut dyn FnMut(&mut dyn Runtime) -> Flow,
    ) -> Flow {
        match body(self) {
            Err(Unwind::Signal(Signal::Capture { handler, mut stack })) => {
                stack.push(frame());
                Err(Unwind::Signal(Signal::Capture { handler, stack }))
            }
            other => other,
        }
    }

    fn install(&mut self, stack: Stack, _saved: Stack) {
        self.state.stack = stack;
        self.state.mode = Mode::Restoring;
    }
}
