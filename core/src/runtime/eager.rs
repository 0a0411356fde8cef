//! Eager capture
//!
//! Every call site records its frame on a shadow stack before the call and
//! drops it afterwards. A capture snapshots the whole shadow stack at once:
//! costlier per capture, but the snapshot is ready to replay as many times as
//! the continuation is invoked. Each `runtime()` invocation starts from an
//! empty shadow stack, so a snapshot never reaches past its delimiter.

use super::types::{Flow, Frame, Handler, Signal, Stack, Thunk, Unwind};
use super::{Mode, Runtime, RuntimeState, Strategy};
use crate::errors::RuntimeError;
use tracing::trace;

pub struct EagerRuntime {
    state: RuntimeState,
    /// Live frames, outermost first
    eager_stack: Vec<Frame>,
}

impl EagerRuntime {
    pub fn new(stack_size: Option<usize>) -> Self {
        Self {
            state: RuntimeState::new(stack_size),
            eager_stack: Vec::new(),
        }
    }

    /// Number of frames currently on the shadow stack
    pub fn live_frames(&self) -> usize {
        self.eager_stack.len()
    }
}

impl Runtime for EagerRuntime {
    fn strategy(&self) -> Strategy {
        Strategy::Eager
    }

    fn state(&self) -> &RuntimeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RuntimeState {
        &mut self.state
    }

    fn capture_cc(&mut self, handler: Handler) -> Flow {
        // Captured stacks are innermost first
        let stack: Stack = self.eager_stack.iter().rev().cloned().collect();
        trace!(frames = stack.len(), "eager capture");
        Err(Unwind::Signal(Signal::Capture { handler, stack }))
    }

    fn abort_cc(&mut self, _handler: Thunk) -> Flow {
        Err(RuntimeError::Unsupported("abort_cc", "eager").into())
    }

    fn enter_frame(
        &mut self,
        frame: &dyn Fn() -> Frame,
        body: &mut dyn FnMut(&mut dyn Runtime) -> Flow,
    ) -> Flow {
        self.eager_stack.push(frame());
        let result = body(self);
        self.eager_stack.pop();
        result
    }

    fn enter_delimiter(&mut self) -> Stack {
        std::mem::take(&mut self.eager_stack)
    }

    fn exit_delimiter(&mut self, outer: Stack) {
        self.eager_stack = outer;
    }

    fn install(&mut self, stack: Stack, saved: Stack) {
        // Replayed activations push their frames again as they re-enter
        self.eager_stack = saved.into_iter().rev().collect();
        self.state.stack = stack;
        self.state.mode = Mode::Restoring;
    }
}
