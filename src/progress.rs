//! Progress-callback trait for per-task conversion events.
//!
//! Attach an [`Arc<dyn ConversionProgressCallback>`] with
//! [`crate::Converter::with_progress`] to receive events as a batch runs.
//! The callback is the least invasive integration point: a host can forward
//! events to a channel, a log, or a terminal progress bar without the
//! library knowing how it communicates.
//!
//! # Example
//!
//! ```rust
//! use md2pdf_report::{ConversionProgressCallback, ConversionResult};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl ConversionProgressCallback for Counter {
//!     fn on_task_complete(&self, index: usize, total: usize, result: &ConversionResult) {
//!         let done = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total}: task {index} → {:?}", result.output_path);
//!     }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::task::{BatchSummary, ConversionResult};

/// Called by the converter as it runs each task.
///
/// Tasks run concurrently, so the per-task methods may be called from
/// several threads at once. Implementations must synchronise any shared
/// mutable state. All methods default to no-ops.
///
/// `index` is the task's 0-based submission position.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any task starts.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when a task acquires its concurrency slot.
    fn on_task_start(&self, index: usize, total: usize, source: &Path) {
        let _ = (index, total, source);
    }

    /// Called when a task produced its PDF.
    fn on_task_complete(&self, index: usize, total: usize, result: &ConversionResult) {
        let _ = (index, total, result);
    }

    /// Called when a task failed at any stage.
    fn on_task_error(&self, index: usize, total: usize, source: &Path, error: &str) {
        let _ = (index, total, source, error);
    }

    /// Called once after every task reached a terminal state.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// A callback that ignores every event. Used when none is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Shared callback handle as stored by the converter.
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Route a finished result to the matching callback method.
pub(crate) fn report_result(
    cb: &dyn ConversionProgressCallback,
    index: usize,
    total: usize,
    result: &ConversionResult,
) {
    if result.success {
        cb.on_task_complete(index, total, result);
    } else {
        cb.on_task_error(
            index,
            total,
            result.source(),
            result.error_message.as_deref().unwrap_or("unknown error"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ConversionTask;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_task_complete(&self, _index: usize, _total: usize, _result: &ConversionResult) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_task_error(&self, _index: usize, _total: usize, _source: &Path, error: &str) {
            assert_eq!(error, "render failed");
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_task_start(0, 2, Path::new("a.md"));
        cb.on_task_error(1, 2, Path::new("b.md"), "boom");
        cb.on_batch_complete(&BatchSummary::default());
    }

    #[test]
    fn report_result_routes_by_outcome() {
        let cb = TrackingCallback::default();
        let task = ConversionTask::new("a.md", "a.pdf", "github");
        let failed = ConversionResult::failed(task, "render failed", None, Utc::now());
        report_result(&cb, 0, 1, &failed);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
        assert_eq!(cb.completes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_task_start(0, 10, Path::new("x.md"));
    }
}
