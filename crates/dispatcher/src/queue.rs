//! FIFO backlog of unassigned jobs and the registry of running ones.
//!
//! A tracked job lives in exactly one of the two at a time: the
//! dispatcher moves it from [`JobQueue`] to [`ActiveJobs`] when it hands
//! the job to a worker, and drops it from [`ActiveJobs`] when the worker
//! reports a terminal message.

use std::collections::{HashMap, VecDeque};

use gifrev_core::{JobId, WorkerId};

use crate::job::TrackedJob;

// ---------------------------------------------------------------------------
// JobQueue
// ---------------------------------------------------------------------------

/// Unbounded FIFO of jobs waiting for a worker.
#[derive(Debug, Default)]
pub(crate) struct JobQueue {
    jobs: VecDeque<TrackedJob>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, job: TrackedJob) {
        self.jobs.push_back(job);
    }

    /// Remove the head. Never blocks.
    pub fn dequeue(&mut self) -> Option<TrackedJob> {
        self.jobs.pop_front()
    }

    /// Put a job back at the head, ahead of everything submitted after it.
    pub fn requeue_front(&mut self, job: TrackedJob) {
        self.jobs.push_front(job);
    }

    pub fn get_mut(&mut self, id: &JobId) -> Option<&mut TrackedJob> {
        self.jobs.iter_mut().find(|job| &job.id == id)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.iter().any(|job| &job.id == id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }
}

// ---------------------------------------------------------------------------
// ActiveJobs
// ---------------------------------------------------------------------------

/// A job in flight and the worker it was sent to.
#[derive(Debug)]
pub(crate) struct ActiveJob {
    pub job: TrackedJob,
    pub worker: WorkerId,
}

/// Registry of running jobs keyed by id.
#[derive(Debug, Default)]
pub(crate) struct ActiveJobs {
    jobs: HashMap<JobId, ActiveJob>,
}

impl ActiveJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: TrackedJob, worker: WorkerId) {
        self.jobs.insert(job.id.clone(), ActiveJob { job, worker });
    }

    pub fn unregister(&mut self, id: &JobId) -> Option<ActiveJob> {
        self.jobs.remove(id)
    }

    /// `None` is a normal outcome: late or duplicate worker messages refer
    /// to jobs that were already removed.
    pub fn lookup(&mut self, id: &JobId) -> Option<&mut ActiveJob> {
        self.jobs.get_mut(id)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    /// The job currently in flight on `worker`, if any.
    pub fn find_by_worker(&self, worker: WorkerId) -> Option<JobId> {
        self.jobs
            .values()
            .find(|active| active.worker == worker)
            .map(|active| active.job.id.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn job(id: &str) -> TrackedJob {
        TrackedJob::new(JobId::from(id), format!("{id}.gif"), Bytes::new()).0
    }

    fn ids(queue: &mut JobQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.dequeue())
            .map(|job| job.id.to_string())
            .collect()
    }

    // -- JobQueue -------------------------------------------------------------

    #[test]
    fn dequeue_is_fifo() {
        let mut queue = JobQueue::new();
        queue.enqueue(job("a"));
        queue.enqueue(job("b"));
        queue.enqueue(job("c"));

        assert_eq!(ids(&mut queue), ["a", "b", "c"]);
    }

    #[test]
    fn dequeue_on_empty_returns_none() {
        let mut queue = JobQueue::new();
        assert!(queue.dequeue().is_none());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn requeue_front_jumps_the_line() {
        let mut queue = JobQueue::new();
        queue.enqueue(job("b"));
        queue.requeue_front(job("a"));

        assert_eq!(ids(&mut queue), ["a", "b"]);
    }

    #[test]
    fn queued_job_is_found_by_id() {
        let mut queue = JobQueue::new();
        queue.enqueue(job("a"));

        assert!(queue.contains(&JobId::from("a")));
        assert!(queue.get_mut(&JobId::from("a")).is_some());
        assert!(queue.get_mut(&JobId::from("zz")).is_none());
    }

    // -- ActiveJobs -----------------------------------------------------------

    #[test]
    fn register_lookup_unregister() {
        let mut active = ActiveJobs::new();
        active.register(job("a"), 1);

        assert_eq!(active.lookup(&JobId::from("a")).map(|a| a.worker), Some(1));
        assert_eq!(active.find_by_worker(1), Some(JobId::from("a")));
        assert_eq!(active.len(), 1);

        assert!(active.unregister(&JobId::from("a")).is_some());
        assert!(active.lookup(&JobId::from("a")).is_none());
        assert!(!active.contains(&JobId::from("a")));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let mut active = ActiveJobs::new();
        assert!(active.lookup(&JobId::from("ghost")).is_none());
        assert!(active.unregister(&JobId::from("ghost")).is_none());
        assert_eq!(active.find_by_worker(0), None);
    }
}
