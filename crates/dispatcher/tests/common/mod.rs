#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use gifrev_dispatcher::{FaultPolicy, Scheduler, SchedulerConfig};
use gifrev_worker::{from_fn, FrameReverser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound for any single wait on a worker thread.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Install a test-friendly subscriber once; `RUST_LOG` controls output.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gifrev_dispatcher=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub fn start(workers: usize, fault_policy: FaultPolicy, reverser: Arc<dyn FrameReverser>) -> Scheduler {
    init_tracing();
    let config = SchedulerConfig::default()
        .with_worker_count(workers)
        .with_fault_policy(fault_policy);
    Scheduler::start(config, reverser).expect("scheduler should start")
}

/// Treats every payload byte as a frame and emits them in reverse order.
pub fn byte_reverser() -> Arc<dyn FrameReverser> {
    Arc::new(from_fn(|payload, progress| {
        progress.register(payload.len() as u32);
        let mut out = payload.to_vec();
        out.reverse();
        for frame in 1..=out.len() as u32 {
            progress.report(frame);
        }
        Ok(out)
    }))
}

/// Like [`byte_reverser`], but panics on payloads starting with `!`.
pub fn fragile_reverser() -> Arc<dyn FrameReverser> {
    let inner = byte_reverser();
    Arc::new(from_fn(move |payload, progress| {
        if payload.first() == Some(&b'!') {
            panic!("corrupt frame table");
        }
        inner.reverse(payload, progress)
    }))
}

/// Panics on the very first job it sees, then behaves like [`byte_reverser`].
pub fn crash_once_reverser() -> Arc<dyn FrameReverser> {
    let crashed = AtomicBool::new(false);
    let inner = byte_reverser();
    Arc::new(from_fn(move |payload, progress| {
        if !crashed.swap(true, Ordering::SeqCst) {
            panic!("decoder state corrupted");
        }
        inner.reverse(payload, progress)
    }))
}

/// Blocks every job until the returned sender sends `()` or is dropped.
pub fn gated_reverser() -> (mpsc::Sender<()>, Arc<dyn FrameReverser>) {
    let (release, gate) = mpsc::channel::<()>();
    let gate = Mutex::new(gate);
    let inner = byte_reverser();
    let reverser: Arc<dyn FrameReverser> = Arc::new(from_fn(move |payload, progress| {
        let _ = gate.lock().expect("gate lock").recv();
        inner.reverse(payload, progress)
    }));
    (release, reverser)
}

/// Records the order payloads were processed in.
pub fn recording_reverser() -> (Arc<Mutex<Vec<Vec<u8>>>>, Arc<dyn FrameReverser>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let inner = byte_reverser();
    let reverser: Arc<dyn FrameReverser> = Arc::new(from_fn(move |payload, progress| {
        log.lock().expect("log lock").push(payload.to_vec());
        inner.reverse(payload, progress)
    }));
    (seen, reverser)
}
