//! Job scheduling for the gifrev frame reverser.
//!
//! Jobs are submitted through a [`SchedulerHandle`], queued FIFO and handed
//! to a fixed pool of worker threads, at most one job per worker. Each job
//! reports progress and exactly one terminal event on its own stream.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use gifrev_dispatcher::{Scheduler, SchedulerConfig};
//! # async fn demo() -> Result<(), gifrev_dispatcher::SchedulerError> {
//! let reverser = Arc::new(gifrev_worker::from_fn(|payload, _progress| Ok(payload.to_vec())));
//! let scheduler = Scheduler::start(SchedulerConfig::from_env()?, reverser)?;
//!
//! let job = scheduler.handle().submit("cat.gif").await?;
//! let outcome = job.outcome().await;
//! # let _ = outcome;
//! scheduler.shutdown().await
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod pool;
mod queue;
pub mod reader;
mod routing;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use config::{FaultPolicy, SchedulerConfig};
pub use dispatcher::{Dispatcher, SchedulerStats};
pub use error::{DispatchError, SchedulerError};
pub use job::{Job, JobStatus};
pub use pool::WorkerPool;
pub use reader::read_as_byte_array;
pub use scheduler::{Scheduler, SchedulerHandle};
