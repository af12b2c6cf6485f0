//! Async front end for the dispatcher.
//!
//! [`Scheduler::start`] spawns the worker threads and a single long-lived
//! Tokio task that owns the [`Dispatcher`]. Callers talk to that task
//! through cloneable [`SchedulerHandle`]s; worker messages reach it on the
//! shared outbox. All dispatcher state is mutated on that one task, so
//! none of it is locked.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use gifrev_core::worker_pool::validate_worker_count;
use gifrev_core::JobId;
use gifrev_events::JobEventStream;
use gifrev_worker::{FrameReverser, ThreadWorkers, WorkerEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::SchedulerConfig;
use crate::dispatcher::{Dispatcher, SchedulerStats};
use crate::error::SchedulerError;
use crate::job::{Job, JobStatus};
use crate::reader::{display_name, read_as_byte_array};

/// Requests from handles to the dispatcher task.
enum Command {
    Submit {
        name: String,
        payload: Bytes,
        reply: oneshot::Sender<Job>,
    },
    Subscribe {
        id: JobId,
        reply: oneshot::Sender<Option<JobEventStream>>,
    },
    Status {
        id: JobId,
        reply: oneshot::Sender<JobStatus>,
    },
    Stats {
        reply: oneshot::Sender<SchedulerStats>,
    },
}

/// A running scheduler: worker threads plus the dispatcher task.
///
/// Dropping it stops the dispatcher task; worker threads then exit once
/// their current job is done. Use [`shutdown`](Self::shutdown) to wait for
/// them.
pub struct Scheduler {
    handle: SchedulerHandle,
    cancel: CancellationToken,
    task: JoinHandle<Dispatcher<ThreadWorkers>>,
    _stop_on_drop: DropGuard,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Start `config.worker_count` workers running `reverser` and the
    /// dispatcher task that feeds them.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: SchedulerConfig,
        reverser: Arc<dyn FrameReverser>,
    ) -> Result<Self, SchedulerError> {
        let worker_count = validate_worker_count(config.worker_count)?;

        let (outbox, events) = mpsc::unbounded_channel();
        let workers = ThreadWorkers::spawn(worker_count, reverser, outbox)?;
        let dispatcher = Dispatcher::new(worker_count, workers, config.fault_policy)?;

        let (commands_tx, commands) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(dispatcher, commands, events, cancel.clone()));

        tracing::info!(
            worker_count,
            fault_policy = %config.fault_policy,
            "Scheduler started",
        );

        Ok(Self {
            handle: SchedulerHandle {
                commands: commands_tx,
            },
            _stop_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
        })
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Stop the dispatcher task, close every worker inbox and wait for the
    /// worker threads to exit.
    ///
    /// Jobs still queued or running get no terminal event; their streams
    /// close and [`Job::outcome`] resolves to `Abandoned`.
    pub async fn shutdown(self) -> Result<(), SchedulerError> {
        self.cancel.cancel();
        let dispatcher = self.task.await?;

        let stats = dispatcher.stats();
        if stats.queued > 0 || stats.active > 0 {
            tracing::warn!(
                queued = stats.queued,
                active = stats.active,
                "Scheduler stopped with unfinished jobs",
            );
        }

        let workers = dispatcher.into_transport();
        tokio::task::spawn_blocking(move || workers.shutdown()).await?;

        tracing::info!("Scheduler shut down");
        Ok(())
    }
}

/// Cloneable client for a running [`Scheduler`].
///
/// Every call fails with [`SchedulerError::Stopped`] once the scheduler
/// has shut down.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SchedulerHandle {
    /// Read a file and submit it as a job named after the file.
    ///
    /// An unreadable file fails the call and creates no job.
    pub async fn submit(&self, path: impl AsRef<Path>) -> Result<Job, SchedulerError> {
        let path = path.as_ref();
        let payload = read_as_byte_array(path)
            .await
            .map_err(|source| SchedulerError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        self.submit_bytes(display_name(path), payload).await
    }

    /// Submit an already-loaded image.
    pub async fn submit_bytes(
        &self,
        name: impl Into<String>,
        payload: Bytes,
    ) -> Result<Job, SchedulerError> {
        let name = name.into();
        self.request(|reply| Command::Submit {
            name,
            payload,
            reply,
        })
        .await
    }

    /// Watch a job that is still queued or running. Only events emitted
    /// after this call are delivered.
    pub async fn subscribe(&self, id: &JobId) -> Result<Option<JobEventStream>, SchedulerError> {
        let id = id.clone();
        self.request(|reply| Command::Subscribe { id, reply }).await
    }

    pub async fn status(&self, id: &JobId) -> Result<JobStatus, SchedulerError> {
        let id = id.clone();
        self.request(|reply| Command::Status { id, reply }).await
    }

    pub async fn stats(&self) -> Result<SchedulerStats, SchedulerError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, SchedulerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| SchedulerError::Stopped)?;
        response.await.map_err(|_| SchedulerError::Stopped)
    }
}

/// The dispatcher task. Returns the dispatcher so shutdown can join its
/// workers.
async fn run(
    mut dispatcher: Dispatcher<ThreadWorkers>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    cancel: CancellationToken,
) -> Dispatcher<ThreadWorkers> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Dispatcher loop shutting down");
                break;
            }
            Some(event) = events.recv() => {
                dispatcher.handle_event(event);
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    tracing::info!("All scheduler handles dropped, dispatcher loop exiting");
                    break;
                };
                apply(&mut dispatcher, command);
            }
        }
    }
    dispatcher
}

fn apply(dispatcher: &mut Dispatcher<ThreadWorkers>, command: Command) {
    // A dropped reply receiver means the caller gave up; nothing to do.
    match command {
        Command::Submit {
            name,
            payload,
            reply,
        } => {
            let _ = reply.send(dispatcher.submit(name, payload));
        }
        Command::Subscribe { id, reply } => {
            let _ = reply.send(dispatcher.subscribe(&id));
        }
        Command::Status { id, reply } => {
            let _ = reply.send(dispatcher.status(&id));
        }
        Command::Stats { reply } => {
            let _ = reply.send(dispatcher.stats());
        }
    }
}
