//! Host scheduling
//!
//! The runtime needs exactly one thing from its host: "run this callback
//! after control has returned to you". A real suspension uses it once.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Deferred task handed to the host
pub type Task = Box<dyn FnOnce()>;

pub trait Scheduler {
    /// Run `task` later, after the current call stack has unwound
    fn schedule(&self, task: Task);
}

/* ===================== In-Process Event Loop ===================== */

/// FIFO of deferred tasks, drained by whoever owns the loop
#[derive(Default, Clone)]
pub struct EventLoop {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Run one deferred task. Returns false when the queue was empty.
    pub fn run_once(&self) -> bool {
        let task = self.tasks.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run deferred tasks (including ones they schedule) until none remain.
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_once() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for EventLoop {
    fn schedule(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

/* ===================== Tokio ===================== */

/// Defers onto the current tokio `LocalSet`.
///
/// Tasks are `!Send`, so this only works inside `LocalSet::run_until` (or a
/// `LocalSet` driven by the runtime).
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: Task) {
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            task();
        });
    }
}
