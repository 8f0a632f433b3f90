//! Chime's notification scheduling engine.
//!
//! The engine accepts a notification definition (immediate, one-shot-future,
//! or recurring), computes when it must fire, arms a timer, dispatches
//! delivery through the configured [`Dispatcher`], records the outcome, and
//! re-arms itself for the next occurrence.
//!
//! Split into submodules:
//! - [`clock`] — injectable time source (virtual time in tests)
//! - [`recurrence`] — pure next-occurrence computation
//! - [`model`] — job and history data types
//! - [`validation`] — recurrence-rule validation at submission
//! - [`store`] — persistence contract + filesystem/in-memory stores
//! - [`dispatch`] — delivery contract
//! - [`scheduler`] — the orchestrator

pub mod clock;
pub mod dispatch;
pub mod model;
pub mod recurrence;
pub mod scheduler;
pub mod store;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::Dispatcher;
pub use model::{HistoryEntry, Job, JobEvent, JobStatus, JobView, Payload, Priority};
pub use recurrence::{next_occurrence, RecurrenceKind, RecurrenceRule};
pub use scheduler::Scheduler;
pub use store::{FsStore, MemoryStore, Store};
pub use validation::validate_rule;
