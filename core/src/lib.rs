pub mod cli;
pub mod config;
pub mod demos;
pub mod errors;
pub mod estimator;
pub mod runner;
pub mod runtime;
pub mod scheduler;
pub mod suspend;
pub mod values;

// Re-export the embedding API
pub use config::RuntimeConfig;
pub use errors::{ErrorInfo, RuntimeError};
pub use runner::{EventProcessingMode, RunHooks, Runner};
pub use runtime::{make_runtime, Completion, Continuation, Flow, Runtime, Strategy, Unwind};
pub use scheduler::{EventLoop, Scheduler, TokioScheduler};
pub use suspend::{SharedRuntime, Suspender, YieldHooks};
pub use values::{ObjRef, Object, Val};
