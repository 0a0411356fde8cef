//! Execution coordinator
//!
//! Outward-facing controller for one instrumented program: run, pause,
//! resume, single-step, breakpoints, and a FIFO of externally submitted
//! events that run one at a time once the program is idle.
//!
//! ```text
//!            pause()                 resume() (nothing parked)
//! Running ───────────▶ Paused ────────────────────────▶ Waiting
//!    ▲  ◀───────────────┘ resume()                        │  ▲
//!    │                   step() stays Paused              │  │
//!    └──────────── queued event starts ◀──────────────────┘  │
//!    └──────────── turn completes ───────────────────────────┘
//! ```
//!
//! Host entry points borrow the shared runtime; calling them from inside a
//! callback that runs during a turn (onYield, onPaused, ...) fails with
//! `RuntimeError::Busy`. `process_event` is the exception: it defers the
//! queue drain through the scheduler instead.

use crate::config::RuntimeConfig;
use crate::errors::RuntimeError;
use crate::runtime::{make_runtime, runtime, Completion, Continuation, Flow, OnDone, Runtime, Thunk};
use crate::scheduler::Scheduler;
use crate::suspend::{SharedRuntime, Suspender, YieldHooks};
use crate::values::Val;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use tracing::{debug, error, warn};


/* ===================== Types ===================== */

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventProcessingMode {
    Running,
    Paused,
    Waiting,
}

/// Completion callback of a run or event
pub type Receiver = Box<dyn FnOnce(Completion)>;

/// An externally submitted unit of work and its completion callback
pub struct EventHandler {
    pub body: Thunk,
    pub receiver: Receiver,
}

/// Optional callbacks for `Runner::run`
#[derive(Default)]
pub struct RunHooks {
    /// Called each time the program yields to the host and continues
    pub on_yield: Option<Box<dyn FnMut()>>,
    /// Called with the line when the program stops at a breakpoint
    pub on_breakpoint: Option<Box<dyn FnMut(u32)>>,
}

/// What the yield hooks do at the next suspension point
enum YieldPolicy {
    /// Continue, stopping only at breakpoints
    Running,
    /// Stop at the next yield and report the position
    PauseRequested(Box<dyn FnOnce(Option<u32>)>),
    /// Paused while waiting; no yield is expected
    PausedIdle,
    /// Stop once the line differs from `from`
    Stepping {
        from: Option<u32>,
        on_step: Box<dyn FnOnce(u32)>,
    },
    /// Stopped; nothing left to report
    Halted,
}

/// Continuation held by `pause_immediate`
struct Held {
    continuation: Continuation,
    on_done: OnDone,
}

struct RunnerState {
    mode: EventProcessingMode,
    queue: VecDeque<EventHandler>,
    breakpoints: Vec<u32>,
    /// Breakpoint line just resumed from; not reported again until the
    /// program leaves it
    skip_line: Option<u32>,
    policy: YieldPolicy,
    /// Set when a pause raced completion; events wait for `resume()`
    queue_held: bool,
    on_yield: Option<Box<dyn FnMut()>>,
    on_breakpoint: Option<Box<dyn FnMut(u32)>>,
    held: Option<Held>,
}

struct Shared {
    suspender: Suspender,
    state: RefCell<RunnerState>,
}

/* ===================== Runner ===================== */

/// Handle to the coordinator; clones share state
#[derive(Clone)]
pub struct Runner {
    shared: Rc<Shared>,
}

impl Runner {
    pub fn new(config: &RuntimeConfig, scheduler: Rc<dyn Scheduler>) -> Self {
        let rt: SharedRuntime = Rc::new(RefCell::new(make_runtime(config)));
        Self::with_suspender(Suspender::new(rt, scheduler, config))
    }

    pub fn with_suspender(suspender: Suspender) -> Self {
        let shared = Rc::new(Shared {
            suspender,
            state: RefCell::new(RunnerState {
                mode: EventProcessingMode::Running,
                queue: VecDeque::new(),
                breakpoints: Vec::new(),
                skip_line: None,
                policy: YieldPolicy::Running,
                queue_held: false,
                on_yield: None,
                on_breakpoint: None,
                held: None,
            }),
        });
        shared
            .suspender
            .set_hooks(Rc::new(CoordinatorHooks(Rc::downgrade(&shared))));
        Self { shared }
    }

    pub fn suspender(&self) -> &Suspender {
        &self.shared.suspender
    }

    pub fn mode(&self) -> EventProcessingMode {
        self.shared.state.borrow().mode
    }

    /// Number of events waiting to start
    pub fn queued(&self) -> usize {
        self.shared.state.borrow().queue.len()
    }

    pub fn set_breakpoints(&self, lines: Vec<u32>) {
        self.shared.state.borrow_mut().breakpoints = lines;
    }

    /// Current source position of the program, if it published one
    pub fn current_line(&self) -> Option<u32> {
        let rt = self.shared.suspender.runtime();
        let line = rt.try_borrow().ok().and_then(|rt| rt.state().linenum);
        line
    }

    /* ===================== Lifecycle ===================== */

    /// Run the program's main body. `on_done` receives its completion
    /// exactly once, after which queued events start.
    pub fn run(
        &self,
        body: Thunk,
        on_done: impl FnOnce(Completion) + 'static,
        hooks: RunHooks,
    ) -> Result<(), RuntimeError> {
        {
            let mut st = self.shared.state.borrow_mut();
            st.mode = EventProcessingMode::Running;
            st.policy = YieldPolicy::Running;
            st.queue_held = false;
            st.on_yield = hooks.on_yield;
            st.on_breakpoint = hooks.on_breakpoint;
        }
        debug!("starting program");
        let on_done = finish(Rc::downgrade(&self.shared), Box::new(on_done));
        self.shared.suspender.run(body, on_done)
    }

    /// Suspension point for instrumented code
    pub fn suspend(&self, rt: &mut dyn Runtime) -> Flow {
        self.shared.suspender.suspend(rt, false)
    }

    /// Ask the program to stop at its next yield.
    ///
    /// `on_paused` receives the line it stopped at, or `None` when the
    /// program was idle or finished its turn first.
    pub fn pause(&self, on_paused: impl FnOnce(Option<u32>) + 'static) -> Result<(), RuntimeError> {
        let mut st = self.shared.state.borrow_mut();
        let mode = st.mode;
        match mode {
            EventProcessingMode::Paused => Err(RuntimeError::AlreadyPaused),
            EventProcessingMode::Waiting => {
                st.mode = EventProcessingMode::Paused;
                st.policy = YieldPolicy::PausedIdle;
                drop(st);
                debug!("paused while waiting");
                on_paused(None);
                Ok(())
            }
            EventProcessingMode::Running => {
                st.mode = EventProcessingMode::Paused;
                st.policy = YieldPolicy::PauseRequested(Box::new(on_paused));
                debug!("pause requested");
                Ok(())
            }
        }
    }

    /// Continue a paused program.
    pub fn resume(&self) -> Result<(), RuntimeError> {
        let mode = self.mode();
        match mode {
            EventProcessingMode::Running => Err(RuntimeError::ResumeWhileRunning),
            EventProcessingMode::Waiting => {
                self.shared.state.borrow_mut().queue_held = false;
                self.drain_from_host()
            }
            EventProcessingMode::Paused => {
                let line = self.current_line();
                let parked = self.shared.suspender.has_captured();
                {
                    let mut st = self.shared.state.borrow_mut();
                    st.policy = YieldPolicy::Running;
                    st.skip_line = line;
                    st.queue_held = false;
                    st.mode = if parked {
                        EventProcessingMode::Running
                    } else {
                        EventProcessingMode::Waiting
                    };
                }
                if parked {
                    debug!(?line, "resuming");
                    self.shared.suspender.resume_from_captured()
                } else {
                    // The pause raced with the end of the turn
                    debug!("resumed with nothing parked");
                    self.drain_from_host()
                }
            }
        }
    }

    /// Run until the line changes, then stop again and report the new line.
    /// The coordinator stays `Paused` throughout.
    pub fn step(&self, on_step: impl FnOnce(u32) + 'static) -> Result<(), RuntimeError> {
        if self.mode() != EventProcessingMode::Paused || !self.shared.suspender.has_captured() {
            return Err(RuntimeError::NotPaused);
        }
        let from = self.current_line();
        self.shared.state.borrow_mut().policy = YieldPolicy::Stepping {
            from,
            on_step: Box::new(on_step),
        };
        debug!(?from, "stepping");
        self.shared.suspender.resume_from_captured()
    }

    /* ===================== Events ===================== */

    /// Queue external work. It starts immediately if the program is waiting,
    /// otherwise after everything queued before it. While a pause that raced
    /// completion is outstanding, nothing starts until `resume()`.
    pub fn process_event(
        &self,
        body: Thunk,
        receiver: impl FnOnce(Completion) + 'static,
    ) -> Result<(), RuntimeError> {
        self.shared.state.borrow_mut().queue.push_back(EventHandler {
            body,
            receiver: Box::new(receiver),
        });
        self.drain_from_host()
    }

    fn drain_from_host(&self) -> Result<(), RuntimeError> {
        let rt = self.shared.suspender.runtime();
        let borrowed = rt.try_borrow_mut();
        match borrowed {
            Ok(mut rt) => drain(&self.shared, &mut **rt),
            Err(_) => {
                // Called from inside a turn; retry once control is back with the host
                let weak = Rc::downgrade(&self.shared);
                self.shared.suspender.scheduler().schedule(Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        if let Err(err) = (Runner { shared }).drain_from_host() {
                            error!(%err, "deferred event drain failed");
                        }
                    }
                }));
                Ok(())
            }
        }
    }

    /* ===================== Blocking Handshake ===================== */

    /// Park the current continuation without pausing the coordinator, then
    /// call `callback`. The program continues when `continue_immediate`
    /// supplies the result of the blocking operation.
    pub fn pause_immediate(&self, rt: &mut dyn Runtime, callback: impl FnOnce() + 'static) -> Flow {
        let weak = Rc::downgrade(&self.shared);
        rt.capture_cc(Box::new(move |rt: &mut dyn Runtime, k: Continuation| {
            rt.end_turn(Box::new(move |_rt: &mut dyn Runtime, on_done: OnDone| {
                if let Some(shared) = weak.upgrade() {
                    shared.state.borrow_mut().held = Some(Held {
                        continuation: k,
                        on_done,
                    });
                }
                callback();
                Ok(())
            }))
        }))
    }

    /// Resume the continuation held by `pause_immediate` with `result`.
    pub fn continue_immediate(&self, result: Val) -> Result<(), RuntimeError> {
        let rt = self.shared.suspender.runtime();
        let mut rt = rt.try_borrow_mut().map_err(|_| RuntimeError::Busy)?;
        let held = self
            .shared
            .state
            .borrow_mut()
            .held
            .take()
            .ok_or(RuntimeError::NothingHeld)?;
        let k = held.continuation;
        runtime(&mut **rt, Box::new(move |_: &mut dyn Runtime| k.invoke(result)), held.on_done)
    }
}

/* ===================== Completion & Queue ===================== */

/// Completion callback shared by the main body and queued events: the
/// program is idle again, so deliver the result and start the next event.
fn finish(weak: Weak<Shared>, deliver: Receiver) -> OnDone {
    Box::new(move |rt: &mut dyn Runtime, completion: Completion| {
        let Some(shared) = weak.upgrade() else {
            deliver(completion);
            return Ok(());
        };

        let pending_pause = {
            let mut st = shared.state.borrow_mut();
            st.mode = EventProcessingMode::Waiting;
            match std::mem::replace(&mut st.policy, YieldPolicy::Running) {
                YieldPolicy::PauseRequested(on_paused) => {
                    st.queue_held = true;
                    Some(on_paused)
                }
                _ => None,
            }
        };
        debug!(depth = rt.state().delimit_depth, "turn completed, waiting");

        deliver(completion);

        match pending_pause {
            Some(on_paused) => {
                // Pause raced with completion: report no position, hold the queue
                on_paused(None);
                Ok(())
            }
            None => drain(&shared, rt),
        }
    })
}

fn drain(shared: &Rc<Shared>, rt: &mut dyn Runtime) -> Result<(), RuntimeError> {
    let event = {
        let mut st = shared.state.borrow_mut();
        if st.mode != EventProcessingMode::Waiting || st.queue_held {
            return Ok(());
        }
        match st.queue.pop_front() {
            Some(event) => {
                st.mode = EventProcessingMode::Running;
                debug!(remaining = st.queue.len(), "starting queued event");
                event
            }
            None => return Ok(()),
        }
    };

    let on_done = finish(Rc::downgrade(shared), event.receiver);
    runtime(rt, event.body, on_done)
}

/* ===================== Yield Hooks ===================== */

struct CoordinatorHooks(Weak<Shared>);

impl CoordinatorHooks {
    fn breakpoint_hit(st: &mut RunnerState, line: Option<u32>) -> bool {
        let Some(line) = line else {
            return false;
        };
        if st.skip_line == Some(line) {
            return false;
        }
        st.skip_line = None;
        st.breakpoints.contains(&line)
    }
}

impl YieldHooks for CoordinatorHooks {
    fn may_yield(&self, rt: &dyn Runtime) -> bool {
        let Some(shared) = self.0.upgrade() else {
            return false;
        };
        let line = rt.state().linenum;
        let mut guard = shared.state.borrow_mut();
        let st = &mut *guard;
        match &st.policy {
            YieldPolicy::Running | YieldPolicy::PauseRequested(_) => {
                if st.skip_line.is_some() && st.skip_line != line {
                    st.skip_line = None;
                }
                line.is_some_and(|n| st.skip_line != Some(n) && st.breakpoints.contains(&n))
            }
            YieldPolicy::Stepping { from, .. } => line.is_some() && line != *from,
            YieldPolicy::PausedIdle | YieldPolicy::Halted => false,
        }
    }

    fn on_yield(&self, rt: &dyn Runtime) -> bool {
        let Some(shared) = self.0.upgrade() else {
            return true;
        };
        let line = rt.state().linenum;
        let mut st = shared.state.borrow_mut();

        match std::mem::replace(&mut st.policy, YieldPolicy::Halted) {
            YieldPolicy::Running => {
                st.policy = YieldPolicy::Running;
                if Self::breakpoint_hit(&mut st, line) {
                    st.mode = EventProcessingMode::Paused;
                    let callback = st.on_breakpoint.take();
                    drop(st);
                    debug!(?line, "breakpoint");
                    if let (Some(mut callback), Some(line)) = (callback, line) {
                        callback(line);
                        shared.state.borrow_mut().on_breakpoint.get_or_insert(callback);
                    }
                    return false;
                }
                let callback = st.on_yield.take();
                drop(st);
                if let Some(mut callback) = callback {
                    callback();
                    // Keep a replacement installed while the callback ran
                    shared.state.borrow_mut().on_yield.get_or_insert(callback);
                }
                true
            }
            YieldPolicy::PauseRequested(on_paused) => {
                drop(st);
                debug!(?line, "paused");
                on_paused(line);
                false
            }
            YieldPolicy::Stepping { from, on_step } => match line {
                Some(n) if line != from => {
                    drop(st);
                    debug!(line = n, "step complete");
                    on_step(n);
                    false
                }
                _ => {
                    // Timed yield on the same line: keep stepping
                    st.policy = YieldPolicy::Stepping { from, on_step };
                    true
                }
            },
            YieldPolicy::PausedIdle => {
                st.policy = YieldPolicy::PausedIdle;
                error!(err = %RuntimeError::YieldWhileIdle, "unexpected yield");
                false
            }
            YieldPolicy::Halted => {
                warn!("yield while halted; staying suspended");
                false
            }
        }
    }
}
