//! Reified call frames

use super::signal::Flow;
use crate::runtime::Runtime;
use crate::values::{ObjRef, Val};
use std::fmt;
use std::rc::Rc;

/// Re-enters a suspended activation.
///
/// Called with the frame's saved receiver and arguments. A resumption closure
/// is responsible for popping its own frame off the replay stack on entry.
pub type Resume = Rc<dyn Fn(&mut dyn Runtime, Option<ObjRef>, &[Val]) -> Flow>;

/// Frame kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// An ordinary activation waiting at a call site
    Continuation,
    /// A constructor call whose receiver was allocated before the capture
    PendingConstruction,
}

impl FrameKind {
    pub fn name(self) -> &'static str {
        match self {
            FrameKind::Continuation => "continuation",
            FrameKind::PendingConstruction => "pending-construction",
        }
    }
}

/// One reified unit of suspended work
///
/// Immutable once captured; only `index` ever advances, and only in the live
/// activation rebuilt from it during replay.
#[derive(Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub resume: Resume,
    pub receiver: Option<ObjRef>,
    pub args: Vec<Val>,
    pub locals: Vec<Val>,
    pub index: usize,
}

impl Frame {
    /// The innermost frame of a restored continuation: supplies the value
    /// (or re-raises the error) handed to the continuation and ends replay.
    pub(crate) fn restart(outcome: Result<Val, Val>) -> Frame {
        let resume: Resume = Rc::new(move |rt: &mut dyn Runtime, _: Option<ObjRef>, _: &[Val]| {
            let state = rt.state_mut();
            state.stack.pop();
            state.mode = crate::runtime::Mode::Normal;
            match &outcome {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(super::Unwind::Throw(e.clone())),
            }
        });
        Frame {
            kind: FrameKind::Continuation,
            resume,
            receiver: None,
            args: Vec::new(),
            locals: Vec::new(),
            index: 0,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind)
            .field("index", &self.index)
            .field("locals", &self.locals)
            .field("args", &self.args)
            .field("has_receiver", &self.receiver.is_some())
            .finish()
    }
}

/// A (possibly partial) captured continuation.
///
/// Element 0 is the innermost frame; the last element is the outermost
/// activation and is re-entered first on restore.
pub type Stack = Vec<Frame>;
