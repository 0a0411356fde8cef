//! Tests for suspension and replay across turns

use super::helpers::{collect, forced_only, runtimes, Outcome};
use crate::demos::{count_to, guarded, lines, Trace};
use crate::estimator::CountdownEstimator;
use crate::runtime::{Completion, Mode, Runtime};
use crate::scheduler::EventLoop;
use crate::suspend::{SharedRuntime, Suspender};
use crate::values::Val;
use std::cell::RefCell;
use std::rc::Rc;

fn every(rt: Box<dyn Runtime>, n: u64) -> (Suspender, EventLoop) {
    let event_loop = EventLoop::new();
    let shared: SharedRuntime = Rc::new(RefCell::new(rt));
    let s = Suspender::with_estimator(
        shared,
        Rc::new(event_loop.clone()),
        100,
        Box::new(CountdownEstimator::new(n)),
    );
    (s, event_loop)
}

#[test]
fn test_loop_state_survives_every_yield() {
    for rt in runtimes() {
        let strategy = rt.strategy();
        let (s, event_loop) = every(rt, 1);
        let trace = Trace::default();
        let outcome: Outcome = Rc::new(RefCell::new(None));

        let (s2, t2) = (s.clone(), trace.clone());
        s.run(
            Box::new(move |rt: &mut dyn Runtime| count_to(rt, &s2, &t2, 6)),
            collect(&outcome),
        )
        .unwrap();

        // One value per turn
        let mut turns = 1;
        while event_loop.run_once() {
            turns += 1;
        }

        assert_eq!(turns, 7, "{:?}", strategy);
        assert_eq!(*outcome.borrow(), Some(Completion::Normal(Val::Num(6.0))));
        assert_eq!(trace.entries(), vec!["0", "1", "2", "3", "4", "5"]);

        let rt = s.runtime();
        let rt = rt.borrow();
        assert_eq!(rt.state().mode, Mode::Normal);
        assert!(!rt.state().is_suspended);
        assert_eq!(rt.state().delimit_depth, 0);
    }
}

#[test]
fn test_each_line_runs_exactly_once() {
    for rt in runtimes() {
        let (s, event_loop) = every(rt, 2);
        let trace = Trace::default();
        let outcome: Outcome = Rc::new(RefCell::new(None));

        let (s2, t2) = (s.clone(), trace.clone());
        s.run(
            Box::new(move |rt: &mut dyn Runtime| lines(rt, &s2, &t2, 5)),
            collect(&outcome),
        )
        .unwrap();
        event_loop.run_until_idle();

        assert_eq!(*outcome.borrow(), Some(Completion::Normal(Val::Num(5.0))));
        assert_eq!(
            trace.entries(),
            vec!["line 1", "line 2", "line 3", "line 4", "line 5"]
        );
        assert_eq!(s.runtime().borrow().state().linenum, Some(5));
    }
}

#[test]
fn test_handler_around_call_site_survives_replay() {
    for rt in runtimes() {
        let (s, event_loop) = forced_only(rt);
        let trace = Trace::default();
        let outcome: Outcome = Rc::new(RefCell::new(None));

        let (s2, t2) = (s.clone(), trace.clone());
        s.run(
            Box::new(move |rt: &mut dyn Runtime| guarded(rt, &s2, &t2)),
            collect(&outcome),
        )
        .unwrap();
        assert_eq!(trace.entries(), vec!["before suspend"]);

        event_loop.run_until_idle();

        assert_eq!(*outcome.borrow(), Some(Completion::Normal(Val::from("boom"))));
        assert_eq!(trace.entries(), vec!["before suspend", "throwing", "caught"]);
    }
}
