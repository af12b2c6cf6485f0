//! Worker pool sizing policy and progress arithmetic.
//!
//! Pure functions and constants shared by the dispatcher and anyone
//! rendering job progress. No runtime state lives here.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Worker count used when the host does not report its parallelism.
pub const FALLBACK_WORKER_COUNT: usize = 2;

/// A pool must be able to run at least one job.
pub const MIN_WORKER_COUNT: usize = 1;

// ---------------------------------------------------------------------------
// Sizing
// ---------------------------------------------------------------------------

/// Default pool size: the host's available parallelism, or
/// [`FALLBACK_WORKER_COUNT`] when that cannot be determined.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_WORKER_COUNT)
}

/// Validate an explicitly configured worker count.
pub fn validate_worker_count(count: usize) -> Result<usize, CoreError> {
    if count < MIN_WORKER_COUNT {
        return Err(CoreError::Validation(format!(
            "Worker count must be at least {MIN_WORKER_COUNT}, got {count}"
        )));
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Fraction of frames written, in `0.0..=1.0`.
///
/// Returns `None` while the frame count is still unknown (0), so callers
/// never divide by zero.
pub fn progress_fraction(current_frame: u32, frame_count: u32) -> Option<f64> {
    if frame_count == 0 {
        return None;
    }
    Some((current_frame as f64 / frame_count as f64).clamp(0.0, 1.0))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
