//! Progress reporting for long-running deploy phases.
//!
//! Deployers report through [`ProgressCallback`] so rendering stays with the
//! host (terminal progress bars, log-only, or nothing at all).

use std::sync::Arc;

/// Receives progress updates from an erase or upload phase.
///
/// Implementations must be `Send + Sync`: updates arrive from concurrently
/// running transfers.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work and reset the position to zero.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Mark the phase as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
