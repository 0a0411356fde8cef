//! Test helpers for runtime tests
//!
//! Builders for both strategies and collectors for completions.

use crate::estimator::CountdownEstimator;
use crate::runtime::{runtime, Completion, EagerRuntime, LazyRuntime, OnDone, Runtime, Thunk};
use crate::scheduler::EventLoop;
use crate::suspend::{SharedRuntime, Suspender};
use std::cell::RefCell;
use std::rc::Rc;

pub type Outcome = Rc<RefCell<Option<Completion>>>;

/// One runtime of each strategy
pub fn runtimes() -> Vec<Box<dyn Runtime>> {
    vec![
        Box::new(EagerRuntime::new(None)),
        Box::new(LazyRuntime::new(None)),
    ]
}

/// Completion callback that stores what it receives
pub fn collect(outcome: &Outcome) -> OnDone {
    let outcome = outcome.clone();
    Box::new(move |_rt: &mut dyn Runtime, completion: Completion| {
        let previous = outcome.borrow_mut().replace(completion);
        assert!(previous.is_none(), "completion delivered twice");
        Ok(())
    })
}

/// Run `body` in a fresh delimited context and return its completion.
///
/// Panics on a fault or if the body ended its turn instead of completing.
pub fn run_to_completion(rt: &mut dyn Runtime, body: Thunk) -> Completion {
    let outcome: Outcome = Rc::new(RefCell::new(None));
    runtime(rt, body, collect(&outcome)).expect("run faulted");
    let completion = outcome.borrow_mut().take();
    completion.expect("run did not complete within one turn")
}

/// Suspender over `rt` that only yields when forced
pub fn forced_only(rt: Box<dyn Runtime>) -> (Suspender, EventLoop) {
    let event_loop = EventLoop::new();
    let shared: SharedRuntime = Rc::new(RefCell::new(rt));
    let s = Suspender::with_estimator(
        shared,
        Rc::new(event_loop.clone()),
        100,
        Box::new(CountdownEstimator::new(u64::MAX)),
    );
    (s, event_loop)
}
