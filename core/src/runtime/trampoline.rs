//! The trampoline
//!
//! Drives instrumented code, consuming the control signals it raises.
//! Re-entry is a loop, so nested captures and restores run in constant host
//! stack depth.
//!
//! ## Function Organization
//! 1. runtime() - Top-level driver (depth tracking + completion dispatch)
//! 2. trampoline() - Signal loop
//! 3. abstract_run() - One step: run a thunk and classify how it ended

use super::calls::resume_next;
use super::types::{Completion, Flow, OnDone, RunResult, Signal, Stack, Thunk, TurnCallback, Unwind};
use super::{Continuation, Mode, Runtime};
use crate::errors::RuntimeError;
use crate::values::Val;
use tracing::{debug, trace};

/// How a trampoline invocation settled
pub enum Settled {
    /// The computation finished, normally or with a user-level exception
    Done(Completion),
    /// The computation ended its turn; control goes back to the host
    EndTurn(TurnCallback),
}

/* ===================== Public API ===================== */

/// Run `body` to the end of its turn and dispatch the outcome.
///
/// A finished computation hands its completion to `on_done`. An end of turn
/// instead passes `on_done` to the turn callback, which keeps it until the
/// computation is resumed.
pub fn runtime(rt: &mut dyn Runtime, body: Thunk, on_done: OnDone) -> Result<(), RuntimeError> {
    rt.state_mut().delimit_depth += 1;
    let outer = rt.enter_delimiter();
    let settled = trampoline(rt, body);
    rt.exit_delimiter(outer);
    rt.state_mut().delimit_depth -= 1;

    let settled = match settled {
        Ok(settled) => settled,
        Err(err) => {
            rt.state_mut().clear_replay();
            return Err(err);
        }
    };

    match settled {
        Settled::Done(completion) => on_done(rt, completion),
        Settled::EndTurn(callback) => callback(rt, on_done),
    }
}

/// Resume a continuation persisted by a suspension.
pub fn resume_from_suspension(
    rt: &mut dyn Runtime,
    k: Continuation,
    on_done: OnDone,
) -> Result<(), RuntimeError> {
    rt.state_mut().is_suspended = false;
    runtime(rt, Box::new(move |_: &mut dyn Runtime| k.invoke(Val::Null)), on_done)
}

/// Repeatedly run thunks until the computation finishes or ends its turn.
pub fn trampoline(rt: &mut dyn Runtime, body: Thunk) -> Result<Settled, RuntimeError> {
    let mut next = body;
    loop {
        match abstract_run(rt, next)? {
            RunResult::Normal(v) => {
                if rt.state().mode == Mode::Restoring {
                    return Err(RuntimeError::CompletedWhileRestoring);
                }
                return Ok(Settled::Done(Completion::Normal(v)));
            }

            RunResult::Exception(e) => {
                rt.state_mut().clear_replay();
                return Ok(Settled::Done(Completion::Exception(e)));
            }

            RunResult::Capture { stack, handler } => {
                // The captured stack has no frame that performs the restore
                // itself; only here is the whole stack available.
                debug!(frames = stack.len(), "continuation captured");
                let k = rt.make_cont(stack);
                next = Box::new(move |rt: &mut dyn Runtime| handler(rt, k));
            }

            RunResult::Discard(handler) => {
                debug!("continuation discarded");
                next = handler;
            }

            RunResult::Restore { stack, saved } => {
                debug!(frames = stack.len(), "restoring continuation");
                next = Box::new(move |rt: &mut dyn Runtime| restore(rt, stack, saved));
            }

            RunResult::EndTurn(callback) => {
                trace!("turn ended");
                return Ok(Settled::EndTurn(callback));
            }
        }
    }
}

/// Run one thunk and classify how it ended.
///
/// Faults are structural defects and leave as `Err`.
pub fn abstract_run(rt: &mut dyn Runtime, body: Thunk) -> Result<RunResult, RuntimeError> {
    match body(rt) {
        Ok(v) => Ok(RunResult::Normal(v)),
        Err(Unwind::Throw(e)) => Ok(RunResult::Exception(e)),
        Err(Unwind::Fault(err)) => Err(err),
        Err(Unwind::Signal(signal)) => Ok(match signal {
            Signal::Capture { handler, stack } => RunResult::Capture { stack, handler },
            Signal::Discard { handler } => RunResult::Discard(handler),
            Signal::Restore { stack, saved } => RunResult::Restore { stack, saved },
            Signal::EndTurn { callback } => RunResult::EndTurn(callback),
        }),
    }
}

/* ===================== Restore ===================== */

fn restore(rt: &mut dyn Runtime, stack: Stack, saved: Stack) -> Flow {
    if stack.is_empty() {
        return Err(RuntimeError::EmptyRestore.into());
    }
    rt.install(stack, saved);
    resume_next(rt)
}
