//! Routing of worker messages and faults back into the dispatcher.
//!
//! Translates [`WorkerMessage`] variants into job events for observers and
//! returns workers to the pool when a job ends. Messages for jobs that are
//! no longer tracked are dropped.

use gifrev_core::{JobId, WorkerId};
use gifrev_events::JobEvent;
use gifrev_worker::{parse_message, WorkerEvent, WorkerMessage, WorkerTransport};

use crate::config::FaultPolicy;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::job::TrackedJob;

impl<T: WorkerTransport> Dispatcher<T> {
    /// Handle anything that arrived on the worker outbox.
    pub fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Message { worker, message } => self.handle_message(worker, message),
            WorkerEvent::Fault { worker, reason } => self.handle_fault(worker, &reason),
        }
    }

    /// Handle a JSON-encoded worker message.
    ///
    /// A message that does not parse is rejected on its own; pool and
    /// queue are left untouched.
    pub fn handle_raw_message(&mut self, worker: WorkerId, text: &str) -> Result<(), DispatchError> {
        let message = parse_message(text).inspect_err(|e| {
            tracing::warn!(worker, error = %e, "Dropping malformed worker message");
        })?;
        self.handle_message(worker, message);
        Ok(())
    }

    /// Route one protocol message to the job it names.
    pub fn handle_message(&mut self, worker: WorkerId, message: WorkerMessage) {
        match message {
            WorkerMessage::RegisterProgress {
                id, frame_count, ..
            } => {
                let Some(active) = self.active.lookup(&id) else {
                    tracing::debug!(job_id = %id, worker, "register_progress for untracked job");
                    return;
                };
                let job = &mut active.job;
                if job.frame_count != 0 && job.frame_count != frame_count {
                    tracing::warn!(
                        job_id = %id,
                        previous = job.frame_count,
                        frame_count,
                        "Frame count registered twice with different values",
                    );
                }
                job.frame_count = frame_count;
                tracing::debug!(job_id = %id, frame_count, "Frame count registered");
            }

            WorkerMessage::ReportProgress {
                id,
                name,
                current_frame,
            } => {
                let Some(active) = self.active.lookup(&id) else {
                    tracing::debug!(job_id = %id, worker, "report_progress for untracked job");
                    return;
                };
                let event = JobEvent::Progress {
                    id,
                    name,
                    current_frame,
                    frame_count: active.job.frame_count,
                };
                tracing::debug!(
                    job_id = %event.id(),
                    current_frame,
                    fraction = event.progress_fraction(),
                    "Job progress",
                );
                active.job.emit(event);
            }

            WorkerMessage::Finished {
                id,
                name,
                input_buffer,
                output_buffer,
            } => {
                let Some(mut job) = self.complete(&id, worker) else {
                    return;
                };
                tracing::info!(job_id = %id, bytes = output_buffer.len(), "Job finished");
                job.emit(JobEvent::Finished {
                    id,
                    name,
                    input_buffer,
                    output_buffer,
                });
            }

            WorkerMessage::Error {
                id,
                name,
                message,
                stack_trace,
            } => {
                let Some(mut job) = self.complete(&id, worker) else {
                    return;
                };
                tracing::info!(job_id = %id, error = %message, "Job failed");
                job.emit(JobEvent::Error {
                    id,
                    name,
                    message,
                    stack_trace,
                });
            }
        }
    }

    /// A worker's execution context died.
    pub fn handle_fault(&mut self, worker: WorkerId, reason: &str) {
        let in_flight = self.active.find_by_worker(worker);
        tracing::error!(
            worker,
            job_id = in_flight.as_ref().map(|id| id.as_str()),
            reason,
            "Worker execution context faulted",
        );

        if self.fault_policy == FaultPolicy::Replace && self.respawn(worker) {
            if let Some(active) = in_flight.and_then(|id| self.active.unregister(&id)) {
                tracing::info!(job_id = %active.job.id, "Requeueing job from faulted worker");
                self.queue.requeue_front(active.job);
            }
            self.pool.release(worker);
            self.distribute();
            return;
        }

        if self.pool.is_busy(worker) {
            tracing::warn!(
                worker,
                available = self.pool.available_count(),
                "Worker left busy, pool is one worker short",
            );
        }
        if let Some(id) = self.active.find_by_worker(worker) {
            tracing::warn!(job_id = %id, worker, "Job stranded on faulted worker");
        }
    }

    /// Drop a job from the registry and free its worker.
    ///
    /// The worker is released and matching re-runs before the caller emits
    /// the terminal event, so the freed worker is busy again by the time
    /// observers hear about it.
    fn complete(&mut self, id: &JobId, worker: WorkerId) -> Option<TrackedJob> {
        let Some(active) = self.active.unregister(id) else {
            tracing::debug!(job_id = %id, worker, "Terminal message for untracked job");
            return None;
        };
        if active.worker != worker {
            tracing::warn!(
                job_id = %id,
                assigned = active.worker,
                reported_by = worker,
                "Terminal message from unexpected worker",
            );
        }
        self.pool.release(active.worker);
        self.distribute();
        Some(active.job)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
