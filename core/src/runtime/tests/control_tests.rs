//! Tests for the signal channel, faults and user exceptions

use super::helpers::{collect, run_to_completion, runtimes, Outcome};
use crate::errors::RuntimeError;
use crate::runtime::{
    abstract_run, runtime, try_catch, Activation, Completion, Continuation, EagerRuntime, Frame,
    FrameKind, LazyRuntime, Mode, OnDone, Resume, RunResult, Runtime, Signal, Unwind,
};
use crate::values::{ObjRef, Val};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn frame_of(kind: FrameKind, resume: Resume) -> Frame {
    Frame {
        kind,
        resume,
        receiver: None,
        args: Vec::new(),
        locals: Vec::new(),
        index: 0,
    }
}

fn restore_signal(stack: Vec<Frame>) -> Unwind {
    Unwind::Signal(Signal::Restore {
        stack,
        saved: Vec::new(),
    })
}

/* ===================== Faults ===================== */

#[test]
fn test_restoring_an_empty_stack_is_a_fault() {
    for mut rt in runtimes() {
        let outcome: Outcome = Rc::new(RefCell::new(None));
        let result = runtime(
            &mut *rt,
            Box::new(|_: &mut dyn Runtime| Err(restore_signal(Vec::new()))),
            collect(&outcome),
        );

        assert_eq!(result, Err(RuntimeError::EmptyRestore));
        assert!(outcome.borrow().is_none());
        assert_eq!(rt.state().delimit_depth, 0);
    }
}

#[test]
fn test_completing_while_restoring_is_a_fault() {
    for mut rt in runtimes() {
        // A frame that neither pops itself nor ends the replay
        let resume: Resume = Rc::new(|_: &mut dyn Runtime, _: Option<ObjRef>, _: &[Val]| Ok(Val::Null));
        let stack = vec![frame_of(FrameKind::Continuation, resume)];

        let outcome: Outcome = Rc::new(RefCell::new(None));
        let result = runtime(&mut *rt, Box::new(move |_: &mut dyn Runtime| Err(restore_signal(stack))), collect(&outcome));

        assert_eq!(result, Err(RuntimeError::CompletedWhileRestoring));
        assert_eq!(rt.state().mode, Mode::Normal);
        assert!(rt.state().stack.is_empty());
    }
}

#[test]
fn test_replaying_the_wrong_frame_kind_is_a_fault() {
    let noop: Resume = Rc::new(|_: &mut dyn Runtime, _: Option<ObjRef>, _: &[Val]| Ok(Val::Null));
    let enters_function: Resume = Rc::new(move |rt: &mut dyn Runtime, _: Option<ObjRef>, _: &[Val]| {
        Activation::enter(rt, noop.clone(), None, Vec::new(), Vec::new)?;
        Ok(Val::Null)
    });
    let stack = vec![frame_of(FrameKind::PendingConstruction, enters_function)];

    let mut rt = LazyRuntime::new(None);
    let outcome: Outcome = Rc::new(RefCell::new(None));
    let result = runtime(&mut rt, Box::new(move |_: &mut dyn Runtime| Err(restore_signal(stack))), collect(&outcome));

    assert_eq!(
        result,
        Err(RuntimeError::UnexpectedFrame {
            expected: "continuation",
            found: "pending-construction",
        })
    );
}

/* ===================== Abort ===================== */

#[test]
fn test_abort_discards_the_current_continuation() {
    let mut rt = LazyRuntime::new(None);
    let after = Rc::new(Cell::new(false));

    let flag = after.clone();
    let completion = run_to_completion(
        &mut rt,
        Box::new(move |rt: &mut dyn Runtime| {
            let v = rt.abort_cc(Box::new(|_: &mut dyn Runtime| Ok(Val::from("replacement"))))?;
            flag.set(true);
            Ok(v)
        }),
    );

    assert_eq!(completion, Completion::Normal(Val::from("replacement")));
    assert!(!after.get());
}

#[test]
fn test_abort_is_unsupported_under_eager_capture() {
    let mut rt = EagerRuntime::new(None);
    let outcome: Outcome = Rc::new(RefCell::new(None));
    let result = runtime(
        &mut rt,
        Box::new(|rt: &mut dyn Runtime| rt.abort_cc(Box::new(|_: &mut dyn Runtime| Ok(Val::Null)))),
        collect(&outcome),
    );

    assert_eq!(result, Err(RuntimeError::Unsupported("abort_cc", "eager")));
    assert!(outcome.borrow().is_none());
}

/* ===================== User Exceptions ===================== */

#[test]
fn test_uncaught_user_exception_is_delivered_as_completion() {
    for mut rt in runtimes() {
        let completion = run_to_completion(
            &mut *rt,
            Box::new(|_: &mut dyn Runtime| Err(Unwind::Throw(Val::from("bad input")))),
        );
        assert_eq!(completion, Completion::Exception(Val::from("bad input")));
    }
}

#[test]
fn test_user_handlers_only_see_user_exceptions() {
    for mut rt in runtimes() {
        let caught = Rc::new(Cell::new(false));

        let flag = caught.clone();
        let completion = run_to_completion(
            &mut *rt,
            Box::new(move |rt: &mut dyn Runtime| {
                try_catch(
                    rt,
                    |rt: &mut dyn Runtime| {
                        rt.capture_cc(Box::new(|_: &mut dyn Runtime, _: Continuation| {
                            Ok(Val::Num(7.0))
                        }))
                    },
                    |_rt: &mut dyn Runtime, _err: Val| {
                        flag.set(true);
                        Ok(Val::Null)
                    },
                )
            }),
        );

        assert_eq!(completion, Completion::Normal(Val::Num(7.0)));
        assert!(!caught.get(), "capture signal reached a user handler");
    }
}

#[test]
fn test_user_handler_catches_thrown_value() {
    let mut rt = LazyRuntime::new(None);
    let completion = run_to_completion(
        &mut rt,
        Box::new(|rt: &mut dyn Runtime| {
            try_catch(
                rt,
                |_| Err(Unwind::Throw(Val::Num(1.0))),
                |_rt: &mut dyn Runtime, err: Val| Ok(Val::Num(err.as_num().unwrap_or(0.0) + 1.0)),
            )
        }),
    );
    assert_eq!(completion, Completion::Normal(Val::Num(2.0)));
}

/* ===================== Classification ===================== */

#[test]
fn test_abstract_run_classifies_outcomes() {
    let mut rt = LazyRuntime::new(None);

    let normal = abstract_run(&mut rt, Box::new(|_: &mut dyn Runtime| Ok(Val::Bool(true)))).unwrap();
    assert!(matches!(normal, RunResult::Normal(Val::Bool(true))));

    let thrown = abstract_run(&mut rt, Box::new(|_: &mut dyn Runtime| Err(Unwind::Throw(Val::Null)))).unwrap();
    assert!(matches!(thrown, RunResult::Exception(Val::Null)));

    let captured = abstract_run(
        &mut rt,
        Box::new(|rt: &mut dyn Runtime| {
            rt.capture_cc(Box::new(|_: &mut dyn Runtime, _: Continuation| Ok(Val::Null)))
        }),
    )
    .unwrap();
    assert!(matches!(captured, RunResult::Capture { .. }));

    let ended = abstract_run(
        &mut rt,
        Box::new(|rt: &mut dyn Runtime| {
            rt.end_turn(Box::new(|_: &mut dyn Runtime, _: OnDone| Ok(())))
        }),
    )
    .unwrap();
    assert!(matches!(ended, RunResult::EndTurn(_)));

    let fault = abstract_run(&mut rt, Box::new(|_: &mut dyn Runtime| Err(RuntimeError::Busy.into())));
    assert!(matches!(fault, Err(RuntimeError::Busy)));
}

#[test]
fn test_call_sites_hold_budget_only_while_active() {
    let mut rt = LazyRuntime::new(Some(10));
    let noop: Resume = Rc::new(|_: &mut dyn Runtime, _: Option<ObjRef>, _: &[Val]| Ok(Val::Null));
    let act = Activation::enter(&mut rt, noop, None, Vec::new(), Vec::new).unwrap();

    let inside = act
        .call(&mut rt, |rt: &mut dyn Runtime| Ok(Val::Num(rt.state().remaining_stack as f64)))
        .unwrap();

    assert_eq!(inside, Val::Num(9.0));
    assert_eq!(rt.state().remaining_stack, 10);
}
