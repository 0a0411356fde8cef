//! Type definitions for the continuation runtime
//!
//! - Frames and stacks (the reified call stack)
//! - Signals, the unwind channel and run outcomes

pub mod frame;
pub mod signal;

pub use frame::{Frame, FrameKind, Resume, Stack};
pub use signal::{Completion, Flow, Handler, OnDone, RunResult, Signal, Thunk, TurnCallback, Unwind};
