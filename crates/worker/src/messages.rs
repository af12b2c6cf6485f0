//! Worker wire protocol.
//!
//! The dispatcher hands a worker one [`WorkerRequest`] at a time. The
//! worker answers with [`WorkerMessage`]s tagged with the same job id:
//! zero or more progress messages followed by exactly one `finished` or
//! `error`. On the wire a message is JSON of the shape
//! `{"type": "<kind>", ...fields}`.

use bytes::Bytes;
use gifrev_core::{JobId, WorkerId};
use serde::{Deserialize, Serialize};

/// A job handed to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: JobId,
    pub name: String,
    pub payload: Bytes,
}

/// All messages a worker can send back about a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// The worker decoded the image and knows how many frames it has.
    RegisterProgress {
        id: JobId,
        name: String,
        frame_count: u32,
    },

    /// Frame `current_frame` (1-based) of the reversed image was written.
    ReportProgress {
        id: JobId,
        name: String,
        current_frame: u32,
    },

    /// The job completed; `input_buffer` is the original payload.
    Finished {
        id: JobId,
        name: String,
        input_buffer: Bytes,
        output_buffer: Bytes,
    },

    /// The computation failed for this job.
    Error {
        id: JobId,
        name: String,
        message: String,
        stack_trace: String,
    },
}

impl WorkerMessage {
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::RegisterProgress { id, .. }
            | Self::ReportProgress { id, .. }
            | Self::Finished { id, .. }
            | Self::Error { id, .. } => id,
        }
    }

    /// `finished` and `error` end the job and free the worker.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Error { .. })
    }
}

/// Parse a JSON-encoded worker message.
///
/// Returns `Err` for malformed JSON or an unknown `type` tag. Callers
/// should log and drop the message; it says nothing about the pool.
pub fn parse_message(text: &str) -> Result<WorkerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// What arrives on the dispatcher's side of the worker channels.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A protocol message from a live worker.
    Message {
        worker: WorkerId,
        message: WorkerMessage,
    },

    /// The execution context itself died. Not tied to any job message.
    Fault { worker: WorkerId, reason: String },
}
