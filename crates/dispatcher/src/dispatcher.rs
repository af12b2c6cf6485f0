//! Job dispatcher: matches queued jobs with available workers.
//!
//! [`Dispatcher`] is a plain synchronous state machine over the worker
//! pool, the job queue and the active-job registry. It is driven by one
//! logical thread of control (the [`Scheduler`](crate::Scheduler) loop, or
//! a test) and never blocks on a worker: jobs leave through a
//! [`WorkerTransport`] and worker messages come back through
//! [`Dispatcher::handle_event`].

use bytes::Bytes;
use gifrev_core::{CoreError, JobId, WorkerId};
use gifrev_events::JobEventStream;
use gifrev_worker::WorkerTransport;
use serde::Serialize;

use crate::config::FaultPolicy;
use crate::error::DispatchError;
use crate::job::{Job, JobStatus, TrackedJob};
use crate::pool::WorkerPool;
use crate::queue::{ActiveJobs, JobQueue};

/// Point-in-time view of the dispatcher's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub workers: usize,
    pub available: usize,
    pub busy: usize,
    pub queued: usize,
    pub active: usize,
}

/// Single-threaded coordinator between jobs and workers.
pub struct Dispatcher<T> {
    pub(crate) pool: WorkerPool,
    pub(crate) queue: JobQueue,
    pub(crate) active: ActiveJobs,
    pub(crate) transport: T,
    pub(crate) fault_policy: FaultPolicy,
}

impl<T: WorkerTransport> Dispatcher<T> {
    /// Create a dispatcher over `worker_count` workers reachable through
    /// `transport` as ids `0..worker_count`.
    pub fn new(worker_count: usize, transport: T, fault_policy: FaultPolicy) -> Result<Self, CoreError> {
        Ok(Self {
            pool: WorkerPool::new(worker_count)?,
            queue: JobQueue::new(),
            active: ActiveJobs::new(),
            transport,
            fault_policy,
        })
    }

    /// Submit a job under a freshly generated id.
    pub fn submit(&mut self, name: impl Into<String>, payload: Bytes) -> Job {
        let (tracked, handle) = TrackedJob::new(JobId::generate(), name.into(), payload);
        self.admit(tracked);
        handle
    }

    /// Submit a job under a caller-chosen id.
    pub fn submit_with_id(
        &mut self,
        id: JobId,
        name: impl Into<String>,
        payload: Bytes,
    ) -> Result<Job, DispatchError> {
        if self.queue.contains(&id) || self.active.contains(&id) {
            return Err(DispatchError::DuplicateJob(id));
        }
        let (tracked, handle) = TrackedJob::new(id, name.into(), payload);
        self.admit(tracked);
        Ok(handle)
    }

    /// Add an observer to a job that is still queued or running.
    ///
    /// The new stream only sees events emitted from now on.
    pub fn subscribe(&mut self, id: &JobId) -> Option<JobEventStream> {
        if let Some(active) = self.active.lookup(id) {
            return Some(active.job.observers.subscribe());
        }
        self.queue.get_mut(id).map(|job| job.observers.subscribe())
    }

    pub fn status(&self, id: &JobId) -> JobStatus {
        if self.active.contains(id) {
            JobStatus::Running
        } else if self.queue.contains(id) {
            JobStatus::Queued
        } else {
            JobStatus::Unknown
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            workers: self.pool.size(),
            available: self.pool.available_count(),
            busy: self.pool.busy_count(),
            queued: self.queue.len(),
            active: self.active.len(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Tear down the dispatcher and hand back its transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Start as many queued jobs as there are available workers.
    ///
    /// Exactly `min(available, queued)` jobs are matched, in queue order.
    /// Jobs whose hand-off fails at the transport layer go back to the head
    /// of the queue and another pass runs over the workers that remain.
    /// Returns the number of jobs started.
    pub fn distribute(&mut self) -> usize {
        let n = self.pool.available_count().min(self.queue.len());
        let mut started = 0;
        let mut failed = 0;

        for _ in 0..n {
            let Some(job) = self.queue.dequeue() else {
                continue;
            };
            let Some(worker) = self.pool.acquire() else {
                self.queue.requeue_front(job);
                continue;
            };

            if self.start(worker, job) {
                started += 1;
            } else {
                failed += 1;
            }
        }

        // Every failed hand-off took a worker out of rotation for good or
        // replaced it, so this terminates.
        if failed > 0 {
            started += self.distribute();
        }

        started
    }

    fn admit(&mut self, job: TrackedJob) {
        tracing::info!(job_id = %job.id, name = %job.name, bytes = job.payload.len(), "Job queued");
        self.queue.enqueue(job);
        self.distribute();
    }

    /// Register `job` as running on `worker` and hand it over.
    fn start(&mut self, worker: WorkerId, job: TrackedJob) -> bool {
        let id = job.id.clone();
        let request = job.request();
        self.active.register(job, worker);

        let err = match self.transport.send(worker, request) {
            Ok(()) => {
                tracing::info!(job_id = %id, worker, "Job dispatched to worker");
                return true;
            }
            Err(err) => err,
        };

        tracing::error!(job_id = %id, worker, error = %err, "Failed to hand job to worker");

        if self.fault_policy == FaultPolicy::Replace && self.respawn(worker) {
            if let Some(active) = self.active.lookup(&id) {
                let retry = active.job.request();
                match self.transport.send(worker, retry) {
                    Ok(()) => {
                        tracing::info!(job_id = %id, worker, "Job dispatched to respawned worker");
                        return true;
                    }
                    Err(err) => {
                        tracing::error!(job_id = %id, worker, error = %err, "Respawned worker rejected job");
                    }
                }
            }
        }

        // The worker stays busy: it cannot take jobs and is not coming back.
        if let Some(active) = self.active.unregister(&id) {
            self.queue.requeue_front(active.job);
        }
        tracing::warn!(worker, "Worker taken out of rotation");
        false
    }

    /// Ask the transport for a fresh context in `worker`'s slot.
    pub(crate) fn respawn(&mut self, worker: WorkerId) -> bool {
        match self.transport.respawn(worker) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(worker, error = %err, "Failed to respawn worker");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::test_support::{dispatcher, finished, sent_ids, RecordingTransport};

    fn assert_conserved(dispatcher: &Dispatcher<RecordingTransport>) {
        let stats = dispatcher.stats();
        assert_eq!(stats.available + stats.busy, stats.workers);
    }

    #[test]
    fn submit_starts_immediately_when_a_worker_is_free() {
        let mut dispatcher = dispatcher(2, FaultPolicy::Preserve);

        let job = dispatcher.submit("cat.gif", Bytes::from_static(b"gif"));

        assert_eq!(dispatcher.status(job.id()), JobStatus::Running);
        assert_eq!(sent_ids(&dispatcher), [job.id().to_string()]);
        assert_eq!(dispatcher.transport().sent[0].1.payload, Bytes::from_static(b"gif"));
        assert_conserved(&dispatcher);
    }

    #[test]
    fn two_workers_five_jobs_start_two() {
        let mut dispatcher = dispatcher(2, FaultPolicy::Preserve);

        let jobs: Vec<Job> = (0..5)
            .map(|i| dispatcher.submit(format!("{i}.gif"), Bytes::new()))
            .collect();

        let stats = dispatcher.stats();
        assert_eq!(stats.busy, 2);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.queued, 3);
        assert_eq!(sent_ids(&dispatcher), [jobs[0].id().to_string(), jobs[1].id().to_string()]);
        assert_eq!(dispatcher.status(jobs[4].id()), JobStatus::Queued);
        assert_conserved(&dispatcher);
    }

    #[test]
    fn each_completion_starts_exactly_one_queued_job_in_order() {
        let mut dispatcher = dispatcher(2, FaultPolicy::Preserve);
        let jobs: Vec<Job> = (0..5)
            .map(|i| dispatcher.submit(format!("{i}.gif"), Bytes::new()))
            .collect();

        for (done, expected_next) in [(0, 2), (1, 3), (2, 4)] {
            let before = dispatcher.transport().sent.len();
            let worker = dispatcher.transport().worker_for(jobs[done].id());

            dispatcher.handle_message(worker, finished(jobs[done].id()));

            assert_eq!(dispatcher.transport().sent.len(), before + 1);
            assert_eq!(
                dispatcher.transport().sent.last().map(|(w, r)| (*w, r.id.clone())),
                Some((worker, jobs[expected_next].id().clone()))
            );
            assert_conserved(&dispatcher);
        }

        assert_eq!(dispatcher.stats().queued, 0);
    }

    #[test]
    fn no_job_is_sent_twice() {
        let mut dispatcher = dispatcher(3, FaultPolicy::Preserve);
        let jobs: Vec<Job> = (0..6)
            .map(|i| dispatcher.submit(format!("{i}.gif"), Bytes::new()))
            .collect();
        for job in &jobs {
            let worker = dispatcher.transport().worker_for(job.id());
            dispatcher.handle_message(worker, finished(job.id()));
        }

        let mut ids = sent_ids(&dispatcher);
        assert_eq!(ids.len(), 6);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn distribute_with_nothing_queued_starts_nothing() {
        let mut dispatcher = dispatcher(2, FaultPolicy::Preserve);
        assert_eq!(dispatcher.distribute(), 0);
        assert!(dispatcher.transport().sent.is_empty());
    }

    #[test]
    fn duplicate_caller_id_rejected() {
        let mut dispatcher = dispatcher(1, FaultPolicy::Preserve);
        dispatcher
            .submit_with_id(JobId::from("x1"), "a.gif", Bytes::new())
            .unwrap();

        assert_matches!(
            dispatcher.submit_with_id(JobId::from("x1"), "b.gif", Bytes::new()),
            Err(DispatchError::DuplicateJob(id)) if id.as_str() == "x1"
        );
    }

    #[test]
    fn subscribe_to_queued_job() {
        let mut dispatcher = dispatcher(1, FaultPolicy::Preserve);
        let _running = dispatcher.submit("a.gif", Bytes::new());
        let queued = dispatcher.submit("b.gif", Bytes::new());

        assert!(dispatcher.subscribe(queued.id()).is_some());
        assert!(dispatcher.subscribe(&JobId::from("ghost")).is_none());
    }

    #[test]
    fn send_failure_requeues_job_for_another_worker() {
        let mut dispatcher = dispatcher(2, FaultPolicy::Preserve);
        dispatcher.transport_mut().fail_workers.insert(0);

        let job = dispatcher.submit("a.gif", Bytes::new());

        // Worker 0 refused; the job went to worker 1 instead.
        assert_eq!(dispatcher.transport().worker_for(job.id()), 1);
        let stats = dispatcher.stats();
        assert_eq!(stats.busy, 2, "refusing worker stays out of rotation");
        assert_eq!(stats.queued, 0);
        assert_conserved(&dispatcher);
    }

    #[test]
    fn send_failure_with_no_other_worker_leaves_job_queued() {
        let mut dispatcher = dispatcher(1, FaultPolicy::Preserve);
        dispatcher.transport_mut().fail_workers.insert(0);

        let job = dispatcher.submit("a.gif", Bytes::new());

        assert_eq!(dispatcher.status(job.id()), JobStatus::Queued);
        assert_eq!(dispatcher.stats().busy, 1);
        assert!(dispatcher.transport().sent.is_empty());
    }

    #[test]
    fn send_failure_under_replace_retries_on_respawned_worker() {
        let mut dispatcher = dispatcher(1, FaultPolicy::Replace);
        dispatcher.transport_mut().fail_workers.insert(0);

        let job = dispatcher.submit("a.gif", Bytes::new());

        assert_eq!(dispatcher.transport().respawned, [0]);
        assert_eq!(dispatcher.status(job.id()), JobStatus::Running);
        assert_eq!(sent_ids(&dispatcher), [job.id().to_string()]);
    }
}
