//! Error types
//!
//! Two kinds of failure live here and they never mix:
//! - `RuntimeError`: structural defects in how the runtime is driven
//!   (empty restore, double resume, wrong coordinator state). These halt loudly.
//! - `ErrorInfo`: user-level error values carried by `Val::Error` and
//!   delivered to completion callbacks as data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/* ===================== Structural Defects ===================== */

/// A defect in the way the runtime is being driven.
///
/// These are programmer errors in the caller of the runtime. They are never
/// delivered to `onDone` and never caught by user-level `try_catch`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("can't restore from empty stack")]
    EmptyRestore,

    #[error("program is not paused (did you call resume() twice?)")]
    NotPaused,

    #[error("the program is already paused")]
    AlreadyPaused,

    #[error("resume() invoked while the program is running")]
    ResumeWhileRunning,

    #[error("suspend() invoked while already suspended")]
    AlreadySuspended,

    #[error("expected a {expected} frame on the replay stack, found {found}")]
    UnexpectedFrame {
        expected: &'static str,
        found: &'static str,
    },

    #[error("execution completed in restoring mode")]
    CompletedWhileRestoring,

    #[error("{0} is not supported by the {1} strategy")]
    Unsupported(&'static str, &'static str),

    #[error("runtime is already executing; host entry points are not re-entrant")]
    Busy,

    #[error("continue_immediate() invoked with no held continuation")]
    NothingHeld,

    #[error("call site re-entered after its callee was consumed")]
    CallSiteReentered,

    #[error("onYield invoked while paused and waiting")]
    YieldWhileIdle,
}

/* ===================== User Error Values ===================== */

pub const INTERNAL_ERROR: &str = "InternalError";
pub const TYPE_ERROR: &str = "TypeError";
pub const WRONG_ARG_COUNT: &str = "WrongArgumentCount";
pub const USER_ERROR: &str = "Error";

/// Error value with code and message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
