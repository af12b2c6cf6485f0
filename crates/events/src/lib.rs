//! Per-job event streams for the gifrev scheduler.
//!
//! - [`JobEvent`]: the typed progress / finished / error notifications a
//!   caller observes for one job.
//! - [`JobObservers`]: the observer list the dispatcher keeps next to each
//!   job it tracks.
//! - [`JobEventStream`]: the receiving end handed to callers.

pub mod observers;

pub use observers::{JobEvent, JobEventStream, JobObservers, JobOutcome};
