//! Shared types for the gifrev job scheduler.
//!
//! Zero internal dependencies: identifiers, the common error type, the
//! worker pool sizing policy and job event names.

pub mod error;
pub mod job_events;
pub mod types;
pub mod worker_pool;

pub use error::CoreError;
pub use types::{JobId, Timestamp, WorkerId};
