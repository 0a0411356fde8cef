//! Control signals and run outcomes
//!
//! Signals travel through the `Err` side of `Flow` alongside user-level
//! throws, but as a separate variant. User code can only ever catch
//! `Unwind::Throw`; signals and faults pass through every user-level handler.

use super::frame::Stack;
use crate::errors::RuntimeError;
use crate::runtime::{Continuation, Runtime};
use crate::values::Val;
use std::fmt;

/// Result of running instrumented code
pub type Flow = Result<Val, Unwind>;

/// Deferred computation run by the trampoline
pub type Thunk = Box<dyn FnOnce(&mut dyn Runtime) -> Flow>;

/// Receives the reified continuation of a `capture_cc`
pub type Handler = Box<dyn FnOnce(&mut dyn Runtime, Continuation) -> Flow>;

/// Completion callback of a top-level run
pub type OnDone = Box<dyn FnOnce(&mut dyn Runtime, Completion) -> Result<(), RuntimeError>>;

/// Surfaced by an end of turn; receives the completion callback of the run
/// that was interrupted so it can be handed to whoever resumes it.
pub type TurnCallback = Box<dyn FnOnce(&mut dyn Runtime, OnDone) -> Result<(), RuntimeError>>;

/* ===================== Signals ===================== */

/// Internal control-flow condition raised by the runtime
pub enum Signal {
    Capture { handler: Handler, stack: Stack },
    Discard { handler: Thunk },
    Restore { stack: Stack, saved: Stack },
    EndTurn { callback: TurnCallback },
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Capture { .. } => "capture",
            Signal::Discard { .. } => "discard",
            Signal::Restore { .. } => "restore",
            Signal::EndTurn { .. } => "end-turn",
        }
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Capture { stack, .. } => write!(f, "Capture({} frames)", stack.len()),
            Signal::Discard { .. } => write!(f, "Discard"),
            Signal::Restore { stack, saved } => {
                write!(f, "Restore({} frames, {} saved)", stack.len(), saved.len())
            }
            Signal::EndTurn { .. } => write!(f, "EndTurn"),
        }
    }
}

/// Why instrumented code stopped returning normally
#[derive(Debug)]
pub enum Unwind {
    /// Runtime control signal; consumed by the trampoline
    Signal(Signal),
    /// User-level failure; delivered as `Completion::Exception`
    Throw(Val),
    /// Structural defect; surfaces from the host entry point as `Err`
    Fault(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Fault(err)
    }
}

impl From<Signal> for Unwind {
    fn from(signal: Signal) -> Self {
        Unwind::Signal(signal)
    }
}

/* ===================== Outcomes ===================== */

/// Outcome of one trampoline step
pub enum RunResult {
    Normal(Val),
    Capture { stack: Stack, handler: Handler },
    Restore { stack: Stack, saved: Stack },
    Discard(Thunk),
    EndTurn(TurnCallback),
    Exception(Val),
}

impl fmt::Debug for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunResult::Normal(v) => f.debug_tuple("Normal").field(v).finish(),
            RunResult::Capture { stack, .. } => write!(f, "Capture({} frames)", stack.len()),
            RunResult::Restore { stack, saved } => {
                write!(f, "Restore({} frames, {} saved)", stack.len(), saved.len())
            }
            RunResult::Discard(_) => write!(f, "Discard"),
            RunResult::EndTurn(_) => write!(f, "EndTurn"),
            RunResult::Exception(v) => f.debug_tuple("Exception").field(v).finish(),
        }
    }
}

/// What a top-level run delivers to its completion callback, exactly once
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Normal(Val),
    Exception(Val),
}

impl Completion {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Completion::Normal(v) => serde_json::json!({ "type": "normal", "value": v.to_json() }),
            Completion::Exception(v) => {
                serde_json::json!({ "type": "exception", "value": v.to_json() })
            }
        }
    }
}
