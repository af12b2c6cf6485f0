use std::path::PathBuf;

use gifrev_core::{CoreError, JobId};
use gifrev_worker::TransportError;

/// Errors from the synchronous dispatcher core.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A wire message could not be parsed (bad JSON or unknown `type`).
    #[error("Malformed worker message: {0}")]
    Protocol(#[from] serde_json::Error),

    /// A caller-supplied id collides with a job that is still tracked.
    #[error("Job {0} is already queued or running")]
    DuplicateJob(JobId),
}

/// Errors surfaced by the async [`Scheduler`](crate::Scheduler).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Config(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The input file could not be read; no job was created.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scheduler loop is no longer running.
    #[error("Scheduler is not running")]
    Stopped,

    #[error("Scheduler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
