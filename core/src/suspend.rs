//! Suspend controller
//!
//! Decides when a running program gives control back to the host, and keeps
//! the one continuation that is waiting to be resumed.
//!
//! At a `suspend()` point:
//! 1. Inside a nested `runtime()` (delimit depth > 1): never yield.
//! 2. Frame budget exhausted: capture and immediately resume in the same
//!    turn, which resets the budget without involving the host.
//! 3. Forced, `may_yield()`, or the estimated turn length reached the yield
//!    interval: capture, end the turn, park the continuation and (if
//!    `on_yield()` approves) schedule its resumption on the host.

use crate::config::RuntimeConfig;
use crate::errors::RuntimeError;
use crate::estimator::{make_estimator, ElapsedTimeEstimator};
use crate::runtime::{resume_from_suspension, runtime, Continuation, Flow, OnDone, Runtime, Thunk};
use crate::scheduler::Scheduler;
use crate::values::Val;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, error, trace};

/// The runtime shared between the host entry points and scheduled tasks
pub type SharedRuntime = Rc<RefCell<Box<dyn Runtime>>>;

/// Yield policy consulted at suspension points
pub trait YieldHooks {
    /// Force a yield regardless of elapsed time
    fn may_yield(&self, _rt: &dyn Runtime) -> bool {
        false
    }

    /// Called with the continuation parked. `false` keeps the program
    /// suspended until it is resumed explicitly.
    fn on_yield(&self, _rt: &dyn Runtime) -> bool {
        true
    }
}

/// Yield on time only, always resume
#[derive(Debug, Default)]
pub struct DefaultHooks;

impl YieldHooks for DefaultHooks {}

/// A parked continuation and the completion callback of its run
struct Captured {
    continuation: Continuation,
    on_done: OnDone,
    generation: u64,
}

struct Inner {
    runtime: SharedRuntime,
    scheduler: Rc<dyn Scheduler>,
    yield_interval_ms: u64,
    estimator: RefCell<Box<dyn ElapsedTimeEstimator>>,
    hooks: RefCell<Rc<dyn YieldHooks>>,
    captured: RefCell<Option<Captured>>,
    generation: Cell<u64>,
}

/// Cheap handle to the suspend controller; clones share state
#[derive(Clone)]
pub struct Suspender {
    inner: Rc<Inner>,
}

impl Suspender {
    pub fn new(runtime: SharedRuntime, scheduler: Rc<dyn Scheduler>, config: &RuntimeConfig) -> Self {
        Self::with_estimator(runtime, scheduler, config.yield_interval_ms, make_estimator(config))
    }

    pub fn with_estimator(
        runtime: SharedRuntime,
        scheduler: Rc<dyn Scheduler>,
        yield_interval_ms: u64,
        estimator: Box<dyn ElapsedTimeEstimator>,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                runtime,
                scheduler,
                yield_interval_ms,
                estimator: RefCell::new(estimator),
                hooks: RefCell::new(Rc::new(DefaultHooks)),
                captured: RefCell::new(None),
                generation: Cell::new(0),
            }),
        }
    }

    pub fn runtime(&self) -> SharedRuntime {
        self.inner.runtime.clone()
    }

    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        self.inner.scheduler.clone()
    }

    pub fn set_hooks(&self, hooks: Rc<dyn YieldHooks>) {
        *self.inner.hooks.borrow_mut() = hooks;
    }

    /// Whether a continuation is parked, waiting to be resumed
    pub fn has_captured(&self) -> bool {
        self.inner.captured.borrow().is_some()
    }

    /* ===================== Host Entry Points ===================== */

    /// Start a top-level run of `body`.
    pub fn run(&self, body: Thunk, on_done: OnDone) -> Result<(), RuntimeError> {
        let mut rt = self
            .inner
            .runtime
            .try_borrow_mut()
            .map_err(|_| RuntimeError::Busy)?;
        runtime(&mut **rt, body, on_done)
    }

    /// Resume the parked continuation.
    ///
    /// The parked pair is consumed first, so a second call without an
    /// intervening suspension fails with `NotPaused` instead of restarting.
    pub fn resume_from_captured(&self) -> Result<(), RuntimeError> {
        let mut rt = self
            .inner
            .runtime
            .try_borrow_mut()
            .map_err(|_| RuntimeError::Busy)?;
        let captured = self
            .inner
            .captured
            .borrow_mut()
            .take()
            .ok_or(RuntimeError::NotPaused)?;
        debug!(generation = captured.generation, "resuming parked continuation");
        resume_from_suspension(&mut **rt, captured.continuation, captured.on_done)
    }

    fn resume_scheduled(&self, generation: u64) {
        let parked = self.inner.captured.borrow().as_ref().map(|c| c.generation);
        if parked != Some(generation) {
            trace!(generation, "stale scheduled resumption skipped");
            return;
        }
        if let Err(err) = self.resume_from_captured() {
            error!(%err, "scheduled resumption failed");
        }
    }

    /* ===================== Suspension ===================== */

    /// Suspension point, called by instrumented code through a call site.
    pub fn suspend(&self, rt: &mut dyn Runtime, force: bool) -> Flow {
        if rt.state().is_suspended {
            return Err(RuntimeError::AlreadySuspended.into());
        }

        if rt.state().delimit_depth > 1 {
            return Ok(Val::Null);
        }

        if rt.state().budget_exhausted() {
            trace!("frame budget exhausted, bouncing");
            let state = rt.state_mut();
            state.reset_budget();
            state.is_suspended = true;
            return rt.capture_cc(Box::new(|rt: &mut dyn Runtime, k: Continuation| {
                rt.state_mut().is_suspended = false;
                k.invoke(Val::Null)
            }));
        }

        let hooks = self.inner.hooks.borrow().clone();
        if !(force || hooks.may_yield(&*rt) || self.interval_elapsed()) {
            return Ok(Val::Null);
        }

        debug!(force, line = ?rt.state().linenum, "suspending");
        rt.state_mut().reset_budget();
        self.inner.estimator.borrow_mut().reset();
        rt.state_mut().is_suspended = true;

        let this = self.clone();
        rt.capture_cc(Box::new(move |rt: &mut dyn Runtime, k: Continuation| {
            rt.end_turn(Box::new(move |rt: &mut dyn Runtime, on_done: OnDone| {
                this.park(rt, k, on_done);
                Ok(())
            }))
        }))
    }

    fn interval_elapsed(&self) -> bool {
        self.inner.estimator.borrow_mut().elapsed_time() >= self.inner.yield_interval_ms
    }

    fn park(&self, rt: &mut dyn Runtime, continuation: Continuation, on_done: OnDone) {
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);
        *self.inner.captured.borrow_mut() = Some(Captured {
            continuation,
            on_done,
            generation,
        });

        let hooks = self.inner.hooks.borrow().clone();
        if hooks.on_yield(&*rt) {
            let this = self.clone();
            self.inner
                .scheduler
                .schedule(Box::new(move || this.resume_scheduled(generation)));
        } else {
            debug!(generation, "yield declined, staying suspended");
        }
    }
}
