//! In-memory transport for exercising the dispatcher without threads.

use std::collections::HashSet;

use bytes::Bytes;
use gifrev_core::{JobId, WorkerId};
use gifrev_events::{JobEvent, JobEventStream};
use gifrev_worker::{TransportError, WorkerMessage, WorkerRequest, WorkerTransport};

use crate::config::FaultPolicy;
use crate::dispatcher::Dispatcher;

/// Records every request instead of delivering it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<(WorkerId, WorkerRequest)>,
    /// Workers whose `send` fails with `Disconnected`.
    pub fail_workers: HashSet<WorkerId>,
    pub respawned: Vec<WorkerId>,
    /// When set, `respawn` fails instead of reviving the slot.
    pub respawn_fails: bool,
    /// Observer drained on every successful send, to see what it had
    /// already received at hand-off time.
    pub watch: Option<JobEventStream>,
    pub seen_at_send: Vec<Vec<JobEvent>>,
}

impl RecordingTransport {
    /// The worker the most recent request for `id` went to.
    pub fn worker_for(&self, id: &JobId) -> WorkerId {
        self.sent
            .iter()
            .rev()
            .find(|(_, request)| &request.id == id)
            .map(|(worker, _)| *worker)
            .unwrap_or_else(|| panic!("job {id} was never sent"))
    }
}

impl WorkerTransport for RecordingTransport {
    fn send(&mut self, worker: WorkerId, request: WorkerRequest) -> Result<(), TransportError> {
        if self.fail_workers.contains(&worker) {
            return Err(TransportError::Disconnected(worker));
        }
        if let Some(watch) = self.watch.as_mut() {
            let seen = std::iter::from_fn(|| watch.try_next()).collect();
            self.seen_at_send.push(seen);
        }
        self.sent.push((worker, request));
        Ok(())
    }

    fn respawn(&mut self, worker: WorkerId) -> Result<(), TransportError> {
        if self.respawn_fails {
            return Err(TransportError::Spawn {
                worker,
                source: std::io::Error::other("no threads left"),
            });
        }
        self.fail_workers.remove(&worker);
        self.respawned.push(worker);
        Ok(())
    }
}

pub fn dispatcher(workers: usize, fault_policy: FaultPolicy) -> Dispatcher<RecordingTransport> {
    Dispatcher::new(workers, RecordingTransport::default(), fault_policy).expect("valid worker count")
}

pub fn sent_ids(dispatcher: &Dispatcher<RecordingTransport>) -> Vec<String> {
    dispatcher
        .transport()
        .sent
        .iter()
        .map(|(_, request)| request.id.to_string())
        .collect()
}

pub fn finished(id: &JobId) -> WorkerMessage {
    WorkerMessage::Finished {
        id: id.clone(),
        name: "out.gif".to_string(),
        input_buffer: Bytes::from_static(b"in"),
        output_buffer: Bytes::from_static(b"out"),
    }
}
