//! Per-job observer list backed by unbounded `tokio::sync::mpsc` channels.
//!
//! Every job tracked by the dispatcher owns one [`JobObservers`]. Each
//! call to [`JobObservers::subscribe`] opens a fresh channel and returns
//! its receiving half as a [`JobEventStream`]. Subscribers only see events
//! emitted after they subscribed; nothing is replayed.
//!
//! Channels are unbounded so a slow observer never loses a progress
//! event and the dispatcher never waits on one.

use bytes::Bytes;
use gifrev_core::job_events::{EVENT_ERROR, EVENT_FINISHED, EVENT_PROGRESS};
use gifrev_core::worker_pool::progress_fraction;
use gifrev_core::JobId;
use serde::Serialize;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A notification about one job, as seen by its observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// One more frame of the reversed image was written.
    ///
    /// `frame_count` is whatever the worker last registered for the job,
    /// or 0 if it never did.
    Progress {
        id: JobId,
        name: String,
        current_frame: u32,
        frame_count: u32,
    },

    /// The job completed. Terminal.
    Finished {
        id: JobId,
        name: String,
        input_buffer: Bytes,
        output_buffer: Bytes,
    },

    /// The worker's computation failed for this job. Terminal.
    Error {
        id: JobId,
        name: String,
        message: String,
        stack_trace: String,
    },
}

impl JobEvent {
    pub fn id(&self) -> &JobId {
        match self {
            Self::Progress { id, .. } | Self::Finished { id, .. } | Self::Error { id, .. } => id,
        }
    }

    /// Event name, matching the serialized `"event"` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => EVENT_PROGRESS,
            Self::Finished { .. } => EVENT_FINISHED,
            Self::Error { .. } => EVENT_ERROR,
        }
    }

    /// Fraction of frames written for a progress event.
    ///
    /// `None` for terminal events and while the frame count is unknown.
    pub fn progress_fraction(&self) -> Option<f64> {
        match self {
            Self::Progress {
                current_frame,
                frame_count,
                ..
            } => progress_fraction(*current_frame, *frame_count),
            _ => None,
        }
    }

    /// `true` for `finished` and `error`; no event follows a terminal one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Error { .. })
    }
}

// ---------------------------------------------------------------------------
// JobObservers
// ---------------------------------------------------------------------------

/// Fan-out list of everyone watching a single job.
#[derive(Debug, Default)]
pub struct JobObservers {
    senders: Vec<mpsc::UnboundedSender<JobEvent>>,
}

impl JobObservers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer.
    pub fn subscribe(&mut self) -> JobEventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        JobEventStream { receiver: rx }
    }

    /// Deliver an event to every live observer.
    ///
    /// Observers whose stream was dropped are pruned. Emitting with no
    /// observers at all is not an error.
    pub fn emit(&mut self, event: JobEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
        if self.senders.is_empty() {
            tracing::trace!(job_id = %event.id(), kind = event.kind(), "No observers left for job event");
        }
    }

    /// Number of observers that have not been pruned yet.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

// ---------------------------------------------------------------------------
// JobEventStream
// ---------------------------------------------------------------------------

/// How a job ended, as observed through its stream.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Finished {
        input_buffer: Bytes,
        output_buffer: Bytes,
    },
    Failed {
        message: String,
        stack_trace: String,
    },
    /// The stream closed before a terminal event, e.g. the scheduler shut
    /// down while the job was still queued or running.
    Abandoned,
}

/// Receiving half of one observer registration.
#[derive(Debug)]
pub struct JobEventStream {
    receiver: mpsc::UnboundedReceiver<JobEvent>,
}

impl JobEventStream {
    /// Wait for the next event. `None` once the job is no longer tracked
    /// and every buffered event has been read.
    pub async fn next(&mut self) -> Option<JobEvent> {
        self.receiver.recv().await
    }

    /// Take the next buffered event without waiting.
    pub fn try_next(&mut self) -> Option<JobEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain the stream until the job's terminal event.
    ///
    /// Progress events are skipped. Note that a job stranded on a faulted
    /// worker never terminates, so this future never resolves for it.
    pub async fn outcome(mut self) -> JobOutcome {
        while let Some(event) = self.next().await {
            match event {
                JobEvent::Finished {
                    input_buffer,
                    output_buffer,
                    ..
                } => {
                    return JobOutcome::Finished {
                        input_buffer,
                        output_buffer,
                    }
                }
                JobEvent::Error {
                    message,
                    stack_trace,
                    ..
                } => {
                    return JobOutcome::Failed {
                        message,
                        stack_trace,
                    }
                }
                JobEvent::Progress { .. } => {}
            }
        }
        JobOutcome::Abandoned
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
