//! # Continuation Runtime
//!
//! Reifies the logical call stack of cooperating ("instrumented") code into
//! data, so it can be discarded, stored and restored later.
//!
//! ## Core Principles
//!
//! 1. **Return-value unwinding**: instrumented code returns `Flow`; capture,
//!    discard, restore and end-of-turn travel as `Unwind::Signal` and are
//!    consumed only by the trampoline.
//! 2. **Explicit context**: the runtime is passed as `&mut dyn Runtime` to
//!    every instrumented call; there is no ambient "current runtime".
//! 3. **Two strategies, one trampoline**: `EagerRuntime` keeps a shadow stack
//!    and snapshots it on capture, `LazyRuntime` lets each enclosing call site
//!    append its frame while a capture propagates. The trampoline is a free
//!    function shared by both.
//! 4. **Replay**: a restored stack is re-entered outermost first; each
//!    activation pops its own frame and jumps to its saved call site until the
//!    restart frame hands back the continuation's value.

pub mod calls;
pub mod cont;
pub mod eager;
pub mod lazy;
pub mod trampoline;
pub mod types;

#[cfg(test)]
mod tests;

use crate::config::RuntimeConfig;
use serde::{Deserialize, Serialize};

pub use calls::{handle_new, set_line, try_catch, Activation, Constructor};
pub use cont::Continuation;
pub use eager::EagerRuntime;
pub use lazy::LazyRuntime;
pub use trampoline::{abstract_run, resume_from_suspension, runtime, trampoline, Settled};
pub use types::{
    Completion, Flow, Frame, FrameKind, Handler, OnDone, Resume, RunResult, Signal, Stack, Thunk,
    TurnCallback, Unwind,
};

/* ===================== Strategy & Mode ===================== */

/// Capture strategy, selected at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Eager,
    #[default]
    Lazy,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Eager => "eager",
            Strategy::Lazy => "lazy",
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eager" => Ok(Strategy::Eager),
            "lazy" => Ok(Strategy::Lazy),
            other => Err(format!("unknown strategy '{}' (expected eager or lazy)", other)),
        }
    }
}

/// Whether call sites run fresh or replay a captured stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Restoring,
}

/* ===================== Shared State ===================== */

/// Bookkeeping common to both strategies
#[derive(Debug)]
pub struct RuntimeState {
    pub mode: Mode,

    /// Replay stack installed by the last restore
    pub stack: Stack,

    /// Logical frame budget; `None` disables budget bounces
    pub stack_size: Option<usize>,

    /// Frames left before a budget bounce is forced
    pub remaining_stack: i64,

    /// Nesting depth of `runtime()` invocations
    pub delimit_depth: usize,

    pub is_suspended: bool,

    /// Current source position, published by instrumented code
    pub linenum: Option<u32>,
}

impl RuntimeState {
    pub fn new(stack_size: Option<usize>) -> Self {
        Self {
            mode: Mode::Normal,
            stack: Vec::new(),
            stack_size,
            remaining_stack: stack_size.map(|n| n as i64).unwrap_or(i64::MAX),
            delimit_depth: 0,
            is_suspended: false,
            linenum: None,
        }
    }

    /// Refill the frame budget, if one is configured
    pub fn reset_budget(&mut self) {
        if let Some(size) = self.stack_size {
            self.remaining_stack = size as i64;
        }
    }

    pub fn budget_exhausted(&self) -> bool {
        self.stack_size.is_some() && self.remaining_stack <= 0
    }

    /// Abandon any half-finished replay
    pub(crate) fn clear_replay(&mut self) {
        self.mode = Mode::Normal;
        self.stack.clear();
    }
}

/* ===================== Runtime Trait ===================== */

/// Capture strategy interface
///
/// Everything that differs between eager and lazy capture lives here; the
/// trampoline, continuations and the call protocol are shared.
pub trait Runtime {
    fn strategy(&self) -> Strategy;

    fn state(&self) -> &RuntimeState;

    fn state_mut(&mut self) -> &mut RuntimeState;

    /// Capture the current continuation and hand it to `handler`.
    ///
    /// Never returns `Ok`.
    fn capture_cc(&mut self, handler: Handler) -> Flow;

    /// Discard the current continuation and run `handler` in its place.
    fn abort_cc(&mut self, handler: Thunk) -> Flow;

    /// End the current turn, surfacing `callback` to the caller of the
    /// trampoline.
    fn end_turn(&mut self, callback: TurnCallback) -> Flow {
        tracing::trace!("end of turn requested");
        Err(Unwind::Signal(Signal::EndTurn { callback }))
    }

    /// Build a continuation bound to `stack`.
    fn make_cont(&self, stack: Stack) -> Continuation {
        Continuation::new(stack)
    }

    /// Run `body` as the callee of a call site described by `frame`.
    fn enter_frame(
        &mut self,
        frame: &dyn Fn() -> Frame,
        body: &mut dyn FnMut(&mut dyn Runtime) -> Flow,
    ) -> Flow;

    /// Install a stack for replay and switch to restoring mode.
    fn install(&mut self, stack: Stack, saved: Stack);

    /// Open the delimited context of a `runtime()` invocation.
    ///
    /// Returns whatever the strategy tracks for the enclosing context, so a
    /// capture inside stops at this delimiter.
    fn enter_delimiter(&mut self) -> Stack {
        Vec::new()
    }

    /// Close the context opened by the matching `enter_delimiter`.
    fn exit_delimiter(&mut self, _outer: Stack) {}
}

/// Create the runtime selected by `config`
pub fn make_runtime(config: &RuntimeConfig) -> Box<dyn Runtime> {
    match config.strategy {
        Strategy::Eager => Box::new(EagerRuntime::new(config.stack_size)),
        Strategy::Lazy => Box::new(LazyRuntime::new(config.stack_size)),
    }
}
