//! Isolated execution contexts for the gifrev scheduler.
//!
//! Provides the worker wire protocol, the [`FrameReverser`] seam the
//! actual frame-reversal code plugs into, thread-backed worker contexts,
//! and the [`WorkerTransport`] abstraction the dispatcher sends jobs
//! through.

pub mod context;
pub mod messages;
pub mod reverser;
pub mod transport;

pub use context::WorkerContext;
pub use messages::{parse_message, WorkerEvent, WorkerMessage, WorkerRequest};
pub use reverser::{from_fn, BoxError, FrameReverser, ProgressSink};
pub use transport::{ThreadWorkers, TransportError, WorkerTransport};
