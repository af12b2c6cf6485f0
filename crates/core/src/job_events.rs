//! Event name constants for job lifecycle notifications.
//!
//! These are the `"event"` tags of a serialized `gifrev_events::JobEvent`,
//! for observers that match on names rather than variants.

/// A frame of the reversed image was written.
pub const EVENT_PROGRESS: &str = "progress";

/// The job completed and carries the output buffer.
pub const EVENT_FINISHED: &str = "finished";

/// The job failed inside the worker.
pub const EVENT_ERROR: &str = "error";
