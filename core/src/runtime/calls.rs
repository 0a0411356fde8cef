//! Call protocol for instrumented code
//!
//! Instrumented functions are written as small state machines:
//!
//! ```ignore
//! fn countdown(rt: &mut dyn Runtime, s: &Suspender, n: f64) -> Flow {
//!     let resume = ...; // re-enters countdown with the saved args
//!     let mut act = Activation::enter(rt, resume, None, vec![Val::Num(n)], || vec![Val::Num(n)])?;
//!     loop {
//!         match act.index {
//!             0 => { ...; act.index = 1; }
//!             1 => { act.call(rt, |rt| s.suspend(rt, false))?; act.index = 0; }
//!             _ => return Ok(Val::Null),
//!         }
//!     }
//! }
//! ```
//!
//! Every call that may capture goes through `Activation::call`, which is what
//! lets the runtime record and later replay the activation.

use super::types::{Flow, Frame, FrameKind, Resume, Unwind};
use super::{Mode, Runtime};
use crate::errors::RuntimeError;
use crate::values::{ObjRef, Object, Val};
use std::rc::Rc;

/* ===================== Activations ===================== */

/// A live activation of an instrumented function
pub struct Activation {
    resume: Resume,
    receiver: Option<ObjRef>,
    args: Vec<Val>,
    /// Call site the activation is at (or will resume at)
    pub index: usize,
    pub locals: Vec<Val>,
}

impl Activation {
    /// Enter a function.
    ///
    /// While replaying, the function's own frame is on top of the replay
    /// stack: it is popped and its index and locals restored. Otherwise the
    /// activation starts at index 0 with `locals()`.
    pub fn enter(
        rt: &mut dyn Runtime,
        resume: Resume,
        receiver: Option<ObjRef>,
        args: Vec<Val>,
        locals: impl FnOnce() -> Vec<Val>,
    ) -> Result<Self, Unwind> {
        if rt.state().mode == Mode::Restoring {
            let frame = pop_frame(rt, FrameKind::Continuation)?;
            return Ok(Self {
                resume,
                receiver,
                args,
                index: frame.index,
                locals: frame.locals,
            });
        }

        Ok(Self {
            resume,
            receiver,
            args,
            index: 0,
            locals: locals(),
        })
    }

    pub fn local(&self, i: usize) -> Val {
        self.locals.get(i).cloned().unwrap_or(Val::Null)
    }

    pub fn set_local(&mut self, i: usize, v: Val) {
        if i >= self.locals.len() {
            self.locals.resize(i + 1, Val::Null);
        }
        self.locals[i] = v;
    }

    /// Reify this activation at its current call site
    pub fn frame(&self) -> Frame {
        Frame {
            kind: FrameKind::Continuation,
            resume: self.resume.clone(),
            receiver: self.receiver.clone(),
            args: self.args.clone(),
            locals: self.locals.clone(),
            index: self.index,
        }
    }

    /// Call `callee` from the current call site.
    ///
    /// While replaying, `callee` is not evaluated; the next saved frame is
    /// re-entered instead. Each call holds one unit of the logical stack
    /// budget until it returns.
    pub fn call(&self, rt: &mut dyn Runtime, callee: impl FnOnce(&mut dyn Runtime) -> Flow) -> Flow {
        let mut callee = Some(callee);
        let frame = || self.frame();

        rt.state_mut().remaining_stack -= 1;
        let result = rt.enter_frame(&frame, &mut |rt: &mut dyn Runtime| {
            if rt.state().mode == Mode::Restoring {
                return resume_next(rt);
            }
            match callee.take() {
                Some(f) => f(rt),
                None => Err(RuntimeError::CallSiteReentered.into()),
            }
        });
        rt.state_mut().remaining_stack += 1;
        result
    }
}

/// Re-enter the frame on top of the replay stack with its saved receiver
/// and arguments.
pub(crate) fn resume_next(rt: &mut dyn Runtime) -> Flow {
    let (resume, receiver, args) = match rt.state().stack.last() {
        Some(frame) => (frame.resume.clone(), frame.receiver.clone(), frame.args.clone()),
        None => return Err(RuntimeError::EmptyRestore.into()),
    };
    resume(rt, receiver, &args)
}

fn pop_frame(rt: &mut dyn Runtime, expected: FrameKind) -> Result<Frame, Unwind> {
    let frame = rt
        .state_mut()
        .stack
        .pop()
        .ok_or(RuntimeError::EmptyRestore)?;
    if frame.kind != expected {
        return Err(RuntimeError::UnexpectedFrame {
            expected: expected.name(),
            found: frame.kind.name(),
        }
        .into());
    }
    Ok(frame)
}

/* ===================== Construction ===================== */

/// Constructor body: initialises `receiver` from the arguments.
pub type ConstructorBody = Rc<dyn Fn(&mut dyn Runtime, &ObjRef, &[Val]) -> Flow>;

/// A class constructor that may capture mid-body
#[derive(Clone)]
pub struct Constructor {
    pub class: String,
    pub body: ConstructorBody,
}

impl Constructor {
    pub fn new(
        class: impl Into<String>,
        body: impl Fn(&mut dyn Runtime, &ObjRef, &[Val]) -> Flow + 'static,
    ) -> Self {
        Self {
            class: class.into(),
            body: Rc::new(body),
        }
    }
}

/// Construct an object in a way that survives a capture inside the
/// constructor body.
///
/// The first run allocates a fresh receiver. If the body captures, a
/// pending-construction frame records the receiver and arguments, so a replay
/// reuses the same object instead of allocating another. A body that returns
/// an object replaces the receiver.
pub fn handle_new(rt: &mut dyn Runtime, ctor: &Constructor, args: Vec<Val>) -> Flow {
    let (obj, args) = if rt.state().mode == Mode::Restoring {
        let frame = pop_frame(rt, FrameKind::PendingConstruction)?;
        let obj = frame.receiver.ok_or(RuntimeError::UnexpectedFrame {
            expected: "pending-construction",
            found: "frame without receiver",
        })?;
        (obj, frame.args)
    } else {
        (Object::alloc(ctor.class.clone()), args)
    };

    let frame = || {
        let retry = ctor.clone();
        let resume: Resume = Rc::new(
            move |rt: &mut dyn Runtime, _: Option<ObjRef>, _: &[Val]| {
                handle_new(rt, &retry, Vec::new())
            },
        );
        Frame {
            kind: FrameKind::PendingConstruction,
            resume,
            receiver: Some(obj.clone()),
            args: args.clone(),
            locals: Vec::new(),
            index: 0,
        }
    };

    let result = rt.enter_frame(&frame, &mut |rt: &mut dyn Runtime| (ctor.body)(rt, &obj, &args))?;

    match result {
        Val::Obj(replacement) => Ok(Val::Obj(replacement)),
        _ => Ok(Val::Obj(obj.clone())),
    }
}

/* ===================== Helpers ===================== */

/// Publish the current source position
pub fn set_line(rt: &mut dyn Runtime, line: u32) {
    rt.state_mut().linenum = Some(line);
}

/// User-level try/catch.
///
/// `handler` only ever sees `Unwind::Throw`; runtime signals and faults pass
/// through. Wrap the call site (`act.call`), not the callee, so the handler
/// is still in place when the call site is replayed.
pub fn try_catch(
    rt: &mut dyn Runtime,
    body: impl FnOnce(&mut dyn Runtime) -> Flow,
    handler: impl FnOnce(&mut dyn Runtime, Val) -> Flow,
) -> Flow {
    match body(rt) {
        Err(Unwind::Throw(e)) => handler(rt, e),
        other => other,
    }
}
