//! The single consumer of progress samples.
//!
//! [`ProgressReporter`] owns the monotonic, bounded view of a job's progress
//! and forwards only real changes to a [`ProgressSink`].

use std::sync::Arc;

/// Presentation port for progress updates.
pub trait ProgressSink: Send + Sync {
    /// A job with `total` units started; the display shows `0/total`.
    fn on_start(&self, total: usize);

    /// The completed count moved forward.
    fn on_progress(&self, completed: usize, total: usize);
}

/// Clamps, deduplicates and forwards completed-unit samples for one job.
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    unit_count: usize,
    completed: usize,
}

impl ProgressReporter {
    /// Creates a reporter and shows the initial `0/unit_count`.
    pub fn new(sink: Arc<dyn ProgressSink>, unit_count: usize) -> Self {
        sink.on_start(unit_count);
        Self {
            sink,
            unit_count,
            completed: 0,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    /// Accepts a sample. Values above `unit_count` are clamped; values not
    /// above the current one are dropped silently.
    pub fn report(&mut self, completed: usize) {
        let clamped = completed.min(self.unit_count);
        if clamped <= self.completed {
            return;
        }
        self.completed = clamped;
        self.sink.on_progress(self.completed, self.unit_count);
    }

    /// Pins the display at 100%.
    pub fn force_complete(&mut self) {
        self.report(self.unit_count);
    }
}
