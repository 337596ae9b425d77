//! Fractional progress of a translation run and its cancellation checkpoints.

use tokio_util::sync::CancellationToken;

use crate::error::{Result, SubflowError};

/// Accumulates per-batch progress and reports it to an optional callback.
///
/// Each finished batch adds `batch_size / total_replicas`, so the last increment
/// can overshoot 1.0. Values at or above 1.0 are never reported by [`advance`];
/// only [`finish`] reports the final 1.0.
///
/// [`advance`]: ProgressTracker::advance
/// [`finish`]: ProgressTracker::finish
pub struct ProgressTracker<F: FnMut(f64)> {
    increment: f64,
    value: f64,
    on_progress: Option<F>,
}

impl<F: FnMut(f64)> ProgressTracker<F> {
    pub fn new(batch_size: usize, total_replicas: usize, on_progress: Option<F>) -> Self {
        let increment = if total_replicas == 0 {
            1.0
        } else {
            batch_size as f64 / total_replicas as f64
        };

        Self {
            increment,
            value: 0.0,
            on_progress,
        }
    }

    /// Report the starting point
    pub fn start(&mut self) {
        self.value = 0.0;
        self.report(0.0);
    }

    /// Record one finished batch
    pub fn advance(&mut self) {
        self.value += self.increment;
        if self.value < 1.0 {
            self.report(self.value);
        }
    }

    pub fn finish(&mut self) {
        self.value = 1.0;
        self.report(1.0);
    }

    /// Running total, possibly above 1.0 before [`finish`](ProgressTracker::finish)
    pub fn value(&self) -> f64 {
        self.value
    }

    fn report(&mut self, value: f64) {
        if let Some(callback) = self.on_progress.as_mut() {
            callback(value);
        }
    }
}

/// Stop before starting more work if the job has been cancelled
pub fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(SubflowError::Cancelled)
    } else {
        Ok(())
    }
}
