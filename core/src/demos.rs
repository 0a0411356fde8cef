//! Instrumented sample programs
//!
//! Hand-written in the shape an instrumenting front-end would emit: every
//! function is an `Activation` state machine and every call that may capture
//! goes through `Activation::call`. Used by the CLI and the test suites.

use crate::errors::{ErrorInfo, USER_ERROR};
use crate::runtime::{
    handle_new, set_line, try_catch, Activation, Constructor, Continuation, Flow, Resume, Runtime,
    Unwind,
};
use crate::suspend::Suspender;
use crate::values::{ObjRef, Val};
use std::cell::RefCell;
use std::rc::Rc;

/// Ordered record of user-visible side effects
#[derive(Debug, Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// Slot a program can stash a continuation in
pub type ContSlot = Rc<RefCell<Option<Continuation>>>;

fn num_arg(args: &[Val], i: usize) -> f64 {
    args.get(i).and_then(Val::as_num).unwrap_or(0.0)
}

/* ===================== count ===================== */

/// Records 0..n, reaching a suspension point after each value.
///
/// Line 1 records, line 2 suspends. Returns `n`.
pub fn count_to(rt: &mut dyn Runtime, s: &Suspender, trace: &Trace, n: u32) -> Flow {
    let resume: Resume = {
        let (s, trace) = (s.clone(), trace.clone());
        Rc::new(move |rt: &mut dyn Runtime, _: Option<ObjRef>, args: &[Val]| {
            count_to(rt, &s, &trace, num_arg(args, 0) as u32)
        })
    };
    let mut act = Activation::enter(rt, resume, None, vec![Val::Num(n as f64)], || {
        vec![Val::Num(0.0)]
    })?;

    loop {
        let i = act.local(0).as_num().unwrap_or(0.0);
        match act.index {
            0 => {
                if i >= n as f64 {
                    return Ok(Val::Num(i));
                }
                set_line(rt, 1);
                trace.push(format!("{}", i));
                act.index = 1;
            }
            _ => {
                set_line(rt, 2);
                act.call(rt, |rt: &mut dyn Runtime| s.suspend(rt, false))?;
                act.set_local(0, Val::Num(i + 1.0));
                act.index = 0;
            }
        }
    }
}

/* ===================== lines ===================== */

/// Straight-line program: lines 1..=n, each recording itself and then
/// reaching a suspension point. Returns `n`.
pub fn lines(rt: &mut dyn Runtime, s: &Suspender, trace: &Trace, n: u32) -> Flow {
    let resume: Resume = {
        let (s, trace) = (s.clone(), trace.clone());
        Rc::new(move |rt: &mut dyn Runtime, _: Option<ObjRef>, args: &[Val]| {
            lines(rt, &s, &trace, num_arg(args, 0) as u32)
        })
    };
    let mut act = Activation::enter(rt, resume, None, vec![Val::Num(n as f64)], Vec::new)?;

    // Even indices execute a line, odd indices are its suspension point
    loop {
        let line = (act.index / 2) as u32 + 1;
        if line > n {
            return Ok(Val::Num(n as f64));
        }
        if act.index % 2 == 0 {
            set_line(rt, line);
            trace.push(format!("line {}", line));
        } else {
            act.call(rt, |rt: &mut dyn Runtime| s.suspend(rt, false))?;
        }
        act.index += 1;
    }
}

/* ===================== nested capture ===================== */

/// Recurses `depth` times, then captures. The handler stashes the
/// continuation in `slot` and escapes with `"escaped"`; every resumption
/// returns `value + depth` from the outermost call.
pub fn nested_capture(rt: &mut dyn Runtime, slot: &ContSlot, trace: &Trace, depth: u32) -> Flow {
    let resume: Resume = {
        let (slot, trace) = (slot.clone(), trace.clone());
        Rc::new(move |rt: &mut dyn Runtime, _: Option<ObjRef>, args: &[Val]| {
            nested_capture(rt, &slot, &trace, num_arg(args, 0) as u32)
        })
    };
    let act = Activation::enter(rt, resume, None, vec![Val::Num(depth as f64)], Vec::new)?;

    if depth == 0 {
        let slot = slot.clone();
        let v = act.call(rt, move |rt: &mut dyn Runtime| {
            rt.capture_cc(Box::new(move |_rt: &mut dyn Runtime, k: Continuation| {
                *slot.borrow_mut() = Some(k);
                Ok(Val::from("escaped"))
            }))
        })?;
        trace.push(format!("resumed with {:?}", v));
        return Ok(v);
    }

    let v = act.call(rt, |rt: &mut dyn Runtime| nested_capture(rt, slot, trace, depth - 1))?;
    trace.push(format!("unwind depth {}", depth));
    Ok(Val::Num(v.as_num().unwrap_or(0.0) + 1.0))
}

/// Captures at `depth` and immediately resumes with `value` inside the
/// capture handler. Returns `value + depth`.
pub fn capture_and_resume(rt: &mut dyn Runtime, trace: &Trace, depth: u32, value: f64) -> Flow {
    let resume: Resume = {
        let trace = trace.clone();
        Rc::new(move |rt: &mut dyn Runtime, _: Option<ObjRef>, args: &[Val]| {
            capture_and_resume(rt, &trace, num_arg(args, 0) as u32, num_arg(args, 1))
        })
    };
    let args = vec![Val::Num(depth as f64), Val::Num(value)];
    let mut act = Activation::enter(rt, resume, None, args, Vec::new)?;

    if act.index == 0 {
        trace.push(if depth == 0 { "capturing".to_string() } else { format!("enter {}", depth) });
        act.index = 1;
    }

    if depth == 0 {
        let v = act.call(rt, move |rt: &mut dyn Runtime| {
            rt.capture_cc(Box::new(move |_rt: &mut dyn Runtime, k: Continuation| {
                k.invoke(Val::Num(value))
            }))
        })?;
        trace.push(format!("got {:?}", v));
        return Ok(v);
    }

    let v = act.call(rt, |rt: &mut dyn Runtime| capture_and_resume(rt, trace, depth - 1, value))?;
    trace.push(format!("leave {}", depth));
    Ok(Val::Num(v.as_num().unwrap_or(0.0) + 1.0))
}

/* ===================== construct ===================== */

/// `Point(x, y)`: assigns `x`, reaches a suspension point, then assigns `y`.
/// The receiver is recorded in `seen` on both sides of the suspension.
pub fn point_constructor(s: &Suspender, seen: &Rc<RefCell<Vec<ObjRef>>>) -> Constructor {
    let (s, seen) = (s.clone(), seen.clone());
    Constructor::new("Point", move |rt: &mut dyn Runtime, this: &ObjRef, args: &[Val]| {
        point_body(rt, &s, &seen, this, args)
    })
}

fn point_body(
    rt: &mut dyn Runtime,
    s: &Suspender,
    seen: &Rc<RefCell<Vec<ObjRef>>>,
    this: &ObjRef,
    args: &[Val],
) -> Flow {
    let resume: Resume = {
        let (s, seen) = (s.clone(), seen.clone());
        Rc::new(move |rt: &mut dyn Runtime, this: Option<ObjRef>, args: &[Val]| match this {
            Some(this) => point_body(rt, &s, &seen, &this, args),
            None => Err(Unwind::Throw(Val::Error(ErrorInfo::new(
                USER_ERROR,
                "Point body resumed without a receiver",
            )))),
        })
    };
    let mut act = Activation::enter(rt, resume, Some(this.clone()), args.to_vec(), Vec::new)?;

    loop {
        match act.index {
            0 => {
                set_line(rt, 1);
                this.borrow_mut().fields.insert("x".into(), args.first().cloned().unwrap_or(Val::Null));
                seen.borrow_mut().push(this.clone());
                act.index = 1;
            }
            1 => {
                act.call(rt, |rt: &mut dyn Runtime| s.suspend(rt, true))?;
                act.index = 2;
            }
            _ => {
                set_line(rt, 2);
                this.borrow_mut().fields.insert("y".into(), args.get(1).cloned().unwrap_or(Val::Null));
                seen.borrow_mut().push(this.clone());
                return Ok(Val::Null);
            }
        }
    }
}

/// Constructs `Point(x, y)` through a call site and returns it.
pub fn make_point(rt: &mut dyn Runtime, ctor: &Constructor, x: f64, y: f64) -> Flow {
    let resume: Resume = {
        let ctor = ctor.clone();
        Rc::new(move |rt: &mut dyn Runtime, _: Option<ObjRef>, args: &[Val]| {
            make_point(rt, &ctor, num_arg(args, 0), num_arg(args, 1))
        })
    };
    let args = vec![Val::Num(x), Val::Num(y)];
    let act = Activation::enter(rt, resume, None, args.clone(), Vec::new)?;
    act.call(rt, |rt: &mut dyn Runtime| handle_new(rt, ctor, args))
}

/* ===================== guarded ===================== */

/// Suspends, then fails with a user error. The failure is caught by a
/// handler wrapped around the call site, so it still applies after the
/// suspended call is replayed. Returns the caught message.
pub fn guarded(rt: &mut dyn Runtime, s: &Suspender, trace: &Trace) -> Flow {
    let resume: Resume = {
        let (s, trace) = (s.clone(), trace.clone());
        Rc::new(move |rt: &mut dyn Runtime, _: Option<ObjRef>, _: &[Val]| guarded(rt, &s, &trace))
    };
    let act = Activation::enter(rt, resume, None, Vec::new(), Vec::new)?;

    try_catch(
        rt,
        |rt: &mut dyn Runtime| act.call(rt, |rt: &mut dyn Runtime| failing(rt, s, trace)),
        |_rt: &mut dyn Runtime, err: Val| {
            trace.push("caught");
            match err {
                Val::Error(info) => Ok(Val::Str(info.message)),
                other => Ok(other),
            }
        },
    )
}

fn failing(rt: &mut dyn Runtime, s: &Suspender, trace: &Trace) -> Flow {
    let resume: Resume = {
        let (s, trace) = (s.clone(), trace.clone());
        Rc::new(move |rt: &mut dyn Runtime, _: Option<ObjRef>, _: &[Val]| failing(rt, &s, &trace))
    };
    let mut act = Activation::enter(rt, resume, None, Vec::new(), Vec::new)?;

    if act.index == 0 {
        trace.push("before suspend");
        act.index = 1;
    }
    act.call(rt, |rt: &mut dyn Runtime| s.suspend(rt, true))?;
    trace.push("throwing");
    Err(Unwind::Throw(Val::Error(ErrorInfo::new(USER_ERROR, "boom"))))
}
