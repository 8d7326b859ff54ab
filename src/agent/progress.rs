//! Progress reporting for the tool-calling loop.

use tracing::info;

/// Percent reported when a tool invocation fails.
pub const FAILED_PERCENT: f64 = -1.0;

/// Receives progress events as the agent works through tool calls.
///
/// `percent` is in `(0, 100]` for normal progress and
/// [`FAILED_PERCENT`] when the named tool failed.
pub trait ProgressSink: Send + Sync {
    /// Reports one progress event.
    fn report(&self, message: &str, percent: f64, label: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, f64, &str) + Send + Sync,
{
    fn report(&self, message: &str, percent: f64, label: &str) {
        self(message, percent, label);
    }
}

/// Discards all progress events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _message: &str, _percent: f64, _label: &str) {}
}

/// Emits progress events as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, message: &str, percent: f64, label: &str) {
        info!(label, percent, "{message}");
    }
}

/// Percent complete after finishing item `index` (zero-based) of `total`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percent_complete(index: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    ((index + 1) as f64 / total as f64) * 100.0
}
