//! Thread-backed worker execution context.
//!
//! Each [`WorkerContext`] owns one dedicated OS thread that blocks on its
//! inbox, runs one [`FrameReverser`] call per [`WorkerRequest`] and posts
//! [`WorkerMessage`]s to the shared outbox. The thread shares no mutable
//! state with the dispatcher.
//!
//! A panic inside the reverser is caught at the thread boundary, reported
//! once as [`WorkerEvent::Fault`], and ends the thread. The inbox closes
//! with it, so later sends to the dead context fail at the transport
//! layer.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use gifrev_core::{JobId, WorkerId};
use tokio::sync::mpsc;

use crate::messages::{WorkerEvent, WorkerMessage, WorkerRequest};
use crate::reverser::{render_error_chain, FrameReverser, ProgressSink};

/// Handle to one live (or dead) execution context.
pub struct WorkerContext {
    worker: WorkerId,
    inbox: mpsc::UnboundedSender<WorkerRequest>,
    thread: thread::JoinHandle<()>,
}

impl WorkerContext {
    /// Start a context on a new OS thread named `gifrev-worker-<worker>`.
    pub fn spawn(
        worker: WorkerId,
        reverser: Arc<dyn FrameReverser>,
        outbox: mpsc::UnboundedSender<WorkerEvent>,
    ) -> io::Result<Self> {
        let (inbox, requests) = mpsc::unbounded_channel();

        let thread = thread::Builder::new()
            .name(format!("gifrev-worker-{worker}"))
            .spawn(move || run(worker, requests, reverser, outbox))?;

        Ok(Self {
            worker,
            inbox,
            thread,
        })
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Post a job to the context's inbox.
    ///
    /// Hands the request back if the context is gone.
    pub fn send(&self, request: WorkerRequest) -> Result<(), WorkerRequest> {
        self.inbox.send(request).map_err(|rejected| rejected.0)
    }

    /// `false` once the context's thread has stopped receiving.
    pub fn is_alive(&self) -> bool {
        !self.inbox.is_closed()
    }

    /// Close the inbox and wait for the thread to finish its current job.
    pub fn join(self) {
        let WorkerContext {
            worker,
            inbox,
            thread,
        } = self;
        drop(inbox);
        if thread.join().is_err() {
            tracing::warn!(worker, "Worker thread panicked during shutdown");
        }
    }
}

/// Body of a worker thread.
fn run(
    worker: WorkerId,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    reverser: Arc<dyn FrameReverser>,
    outbox: mpsc::UnboundedSender<WorkerEvent>,
) {
    tracing::debug!(worker, "Worker context started");

    while let Some(request) = requests.blocking_recv() {
        let job_id = request.id.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            process(worker, request, reverser.as_ref(), &outbox)
        }));

        if let Err(payload) = result {
            let reason = panic_message(payload.as_ref());
            tracing::error!(worker, job_id = %job_id, reason = %reason, "Worker context faulted");
            deliver(&outbox, worker, WorkerEvent::Fault { worker, reason });
            return;
        }
    }

    tracing::debug!(worker, "Worker inbox closed, context exiting");
}

/// Run one job to completion and post its terminal message.
fn process(
    worker: WorkerId,
    request: WorkerRequest,
    reverser: &dyn FrameReverser,
    outbox: &mpsc::UnboundedSender<WorkerEvent>,
) {
    let WorkerRequest { id, name, payload } = request;
    tracing::debug!(worker, job_id = %id, bytes = payload.len(), "Processing job");

    let mut progress = ChannelProgress {
        worker,
        id: &id,
        name: &name,
        outbox,
    };

    let message = match reverser.reverse(&payload, &mut progress) {
        Ok(output) => WorkerMessage::Finished {
            id,
            name,
            input_buffer: payload,
            output_buffer: Bytes::from(output),
        },
        Err(err) => WorkerMessage::Error {
            id,
            name,
            message: err.to_string(),
            stack_trace: render_error_chain(&*err),
        },
    };

    post(outbox, worker, message);
}

/// Forwards reverser progress callbacks as protocol messages.
struct ChannelProgress<'a> {
    worker: WorkerId,
    id: &'a JobId,
    name: &'a str,
    outbox: &'a mpsc::UnboundedSender<WorkerEvent>,
}

impl ProgressSink for ChannelProgress<'_> {
    fn register(&mut self, frame_count: u32) {
        post(
            self.outbox,
            self.worker,
            WorkerMessage::RegisterProgress {
                id: self.id.clone(),
                name: self.name.to_string(),
                frame_count,
            },
        );
    }

    fn report(&mut self, current_frame: u32) {
        post(
            self.outbox,
            self.worker,
            WorkerMessage::ReportProgress {
                id: self.id.clone(),
                name: self.name.to_string(),
                current_frame,
            },
        );
    }
}

fn post(outbox: &mpsc::UnboundedSender<WorkerEvent>, worker: WorkerId, message: WorkerMessage) {
    deliver(outbox, worker, WorkerEvent::Message { worker, message });
}

fn deliver(outbox: &mpsc::UnboundedSender<WorkerEvent>, worker: WorkerId, event: WorkerEvent) {
    if outbox.send(event).is_err() {
        // Dispatcher is gone; nobody is left to care.
        tracing::trace!(worker, "Dropping worker event, outbox closed");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
