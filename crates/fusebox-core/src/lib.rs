//! Core infrastructure for fusebox.
//!
//! This crate holds the collaborators a breaker leans on but does not own:
//! - Schedulers for fire-and-forget delayed actions
//! - Plain-text diagnostic sinks
//! - The event system used for observability

pub mod events;
pub mod scheduler;
pub mod sink;

pub use events::{EventListener, EventListeners, FnListener, FuseEvent};
pub use scheduler::{
    default_scheduler, Action, AutoScheduler, ManualScheduler, Scheduler, SharedScheduler,
    ThreadScheduler, TokioScheduler,
};
pub use sink::{FnSink, LogSink, MemorySink, SharedLogSink, WriterSink};
