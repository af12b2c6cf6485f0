//! Transport between the dispatcher and its workers.
//!
//! The dispatcher never talks to threads directly. It sends requests
//! through a [`WorkerTransport`] addressed by [`WorkerId`], which keeps the
//! matching logic independent of how workers are hosted. [`ThreadWorkers`]
//! is the production implementation: one [`WorkerContext`] per slot.

use std::io;
use std::sync::Arc;

use gifrev_core::WorkerId;
use tokio::sync::mpsc;

use crate::context::WorkerContext;
use crate::messages::{WorkerEvent, WorkerRequest};
use crate::reverser::FrameReverser;

/// Errors raised while handing a job to a worker or rebuilding one.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No worker occupies this slot.
    #[error("Worker {0} does not exist")]
    UnknownWorker(WorkerId),

    /// The worker's execution context is gone and cannot take the job.
    #[error("Worker {0} is not accepting jobs")]
    Disconnected(WorkerId),

    /// A new execution context could not be started.
    #[error("Failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: WorkerId,
        #[source]
        source: io::Error,
    },
}

/// Fire-and-forget delivery of jobs to workers.
pub trait WorkerTransport {
    /// Post a request to a worker. Must not block on the worker.
    fn send(&mut self, worker: WorkerId, request: WorkerRequest) -> Result<(), TransportError>;

    /// Replace the execution context behind a slot with a fresh one.
    fn respawn(&mut self, worker: WorkerId) -> Result<(), TransportError>;
}

/// A fixed set of thread-backed workers sharing one outbox.
pub struct ThreadWorkers {
    contexts: Vec<WorkerContext>,
    reverser: Arc<dyn FrameReverser>,
    outbox: mpsc::UnboundedSender<WorkerEvent>,
}

impl ThreadWorkers {
    /// Start `count` workers, numbered `0..count`.
    pub fn spawn(
        count: usize,
        reverser: Arc<dyn FrameReverser>,
        outbox: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Result<Self, TransportError> {
        let mut contexts = Vec::with_capacity(count);
        for worker in 0..count {
            let context = WorkerContext::spawn(worker, Arc::clone(&reverser), outbox.clone())
                .map_err(|source| TransportError::Spawn { worker, source })?;
            contexts.push(context);
        }

        tracing::info!(count, "Worker contexts started");

        Ok(Self {
            contexts,
            reverser,
            outbox,
        })
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Close every inbox and wait for each thread to finish its current
    /// job. Blocks; call it off the async runtime.
    pub fn shutdown(self) {
        tracing::info!(count = self.contexts.len(), "Shutting down worker contexts");
        for context in self.contexts {
            context.join();
        }
    }
}

impl WorkerTransport for ThreadWorkers {
    fn send(&mut self, worker: WorkerId, request: WorkerRequest) -> Result<(), TransportError> {
        let context = self
            .contexts
            .get(worker)
            .ok_or(TransportError::UnknownWorker(worker))?;

        context
            .send(request)
            .map_err(|_| TransportError::Disconnected(worker))
    }

    fn respawn(&mut self, worker: WorkerId) -> Result<(), TransportError> {
        let slot = self
            .contexts
            .get_mut(worker)
            .ok_or(TransportError::UnknownWorker(worker))?;

        let fresh = WorkerContext::spawn(worker, Arc::clone(&self.reverser), self.outbox.clone())
            .map_err(|source| TransportError::Spawn { worker, source })?;

        // The old thread has already exited or will once its inbox
        // closes; dropping the handle detaches it.
        let _old = std::mem::replace(slot, fresh);

        tracing::info!(worker, "Worker context respawned");
        Ok(())
    }
}
