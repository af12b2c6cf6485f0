//! The seam the frame-reversal computation plugs into.
//!
//! A [`FrameReverser`] runs synchronously on a worker thread. It reports
//! the frame count once it has decoded the input, then one progress tick
//! per frame written, and finally returns the encoded output.

use std::error::Error;

/// Error type a reverser may fail with.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Progress callbacks handed to a running [`FrameReverser`].
pub trait ProgressSink {
    /// Announce how many frames the image has. Call once, before any
    /// [`report`](ProgressSink::report).
    fn register(&mut self, frame_count: u32);

    /// Announce that frame `current_frame` (1-based) was written.
    fn report(&mut self, current_frame: u32);
}

/// An opaque, possibly CPU-heavy computation that reverses the frame
/// order of an encoded image.
///
/// Returning `Err` fails only the current job. Panicking takes down the
/// whole execution context the reverser runs in.
pub trait FrameReverser: Send + Sync + 'static {
    fn reverse(&self, payload: &[u8], progress: &mut dyn ProgressSink) -> Result<Vec<u8>, BoxError>;
}

/// A [`FrameReverser`] backed by a closure. Build one with [`from_fn`].
pub struct FnReverser<F>(F);

/// Wrap a closure as a [`FrameReverser`].
pub fn from_fn<F>(f: F) -> FnReverser<F>
where
    F: Fn(&[u8], &mut dyn ProgressSink) -> Result<Vec<u8>, BoxError> + Send + Sync + 'static,
{
    FnReverser(f)
}

impl<F> FrameReverser for FnReverser<F>
where
    F: Fn(&[u8], &mut dyn ProgressSink) -> Result<Vec<u8>, BoxError> + Send + Sync + 'static,
{
    fn reverse(&self, payload: &[u8], progress: &mut dyn ProgressSink) -> Result<Vec<u8>, BoxError> {
        (self.0)(payload, progress)
    }
}

/// Render an error and its `source()` chain, one cause per line.
///
/// This is what a failed job reports as its stack trace.
pub fn render_error_chain(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str("\ncaused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
