//! The job model.
//!
//! A submitted job exists twice: the dispatcher owns a [`TrackedJob`]
//! (payload, frame count, observers) for as long as the job is queued or
//! running, and the caller holds a [`Job`] handle to watch it.

use bytes::Bytes;
use gifrev_core::{JobId, Timestamp};
use gifrev_events::{JobEvent, JobEventStream, JobObservers, JobOutcome};
use gifrev_worker::WorkerRequest;
use serde::Serialize;

/// Caller-side handle returned by a submission.
///
/// The job's terminal state is observed through its event stream, which
/// was subscribed at creation and therefore sees every event.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    name: String,
    submitted_at: Timestamp,
    events: JobEventStream,
}

impl Job {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn submitted_at(&self) -> Timestamp {
        self.submitted_at
    }

    /// The job's event stream, for reading events one at a time.
    pub fn events(&mut self) -> &mut JobEventStream {
        &mut self.events
    }

    /// Give up the handle and keep only its event stream.
    pub fn into_events(self) -> JobEventStream {
        self.events
    }

    /// Wait for the job's terminal event.
    pub async fn outcome(self) -> JobOutcome {
        self.events.outcome().await
    }
}

/// Where a job currently is, from the dispatcher's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the queue for a worker.
    Queued,
    /// Sent to a worker, no terminal message yet.
    Running,
    /// Never submitted, or already finished or failed.
    Unknown,
}

/// The dispatcher's record of a job.
#[derive(Debug)]
pub(crate) struct TrackedJob {
    pub id: JobId,
    pub name: String,
    pub payload: Bytes,
    /// 0 until the worker registers it.
    pub frame_count: u32,
    pub observers: JobObservers,
}

impl TrackedJob {
    /// Create the record and the caller's handle, already subscribed.
    pub fn new(id: JobId, name: String, payload: Bytes) -> (Self, Job) {
        let mut observers = JobObservers::new();
        let events = observers.subscribe();

        let handle = Job {
            id: id.clone(),
            name: name.clone(),
            submitted_at: chrono::Utc::now(),
            events,
        };

        let tracked = Self {
            id,
            name,
            payload,
            frame_count: 0,
            observers,
        };

        (tracked, handle)
    }

    /// The message that hands this job to a worker.
    pub fn request(&self) -> WorkerRequest {
        WorkerRequest {
            id: self.id.clone(),
            name: self.name.clone(),
            payload: self.payload.clone(),
        }
    }

    pub fn emit(&mut self, event: JobEvent) {
        self.observers.emit(event);
    }
}
