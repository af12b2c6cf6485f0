//! Fixed-size worker pool bookkeeping.
//!
//! Tracks which workers are available and which are busy. Membership is
//! the only state; the pool never talks to a worker. Every operation is a
//! synchronous set transfer and none of them block.

use std::collections::{HashSet, VecDeque};

use gifrev_core::worker_pool::validate_worker_count;
use gifrev_core::{CoreError, WorkerId};

/// Available/busy partition of the workers `0..size`.
#[derive(Debug)]
pub struct WorkerPool {
    available: VecDeque<WorkerId>,
    busy: HashSet<WorkerId>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with every worker available.
    pub fn new(size: usize) -> Result<Self, CoreError> {
        let size = validate_worker_count(size)?;
        Ok(Self {
            available: (0..size).collect(),
            busy: HashSet::with_capacity(size),
            size,
        })
    }

    /// Move one worker from available to busy.
    pub fn acquire(&mut self) -> Option<WorkerId> {
        let worker = self.available.pop_front()?;
        self.busy.insert(worker);
        Some(worker)
    }

    /// Move a busy worker back to available.
    ///
    /// Returns `false` and changes nothing if the worker was not busy, so
    /// duplicate release events are harmless.
    pub fn release(&mut self, worker: WorkerId) -> bool {
        if !self.busy.remove(&worker) {
            return false;
        }
        self.available.push_back(worker);
        true
    }

    pub fn is_busy(&self, worker: WorkerId) -> bool {
        self.busy.contains(&worker)
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}
