//! Batch progress reporting and cancellation.
//!
//! This module provides [`BatchObserver`] for receiving per-job outcomes,
//! [`CancellationToken`] for cooperative cancellation, and the report types
//! passed to observers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use labelclip::{BatchExtractor, BatchObserver, BatchOptions, FfmpegBackend, JobReport};
//!
//! struct PrintOutcome;
//!
//! impl BatchObserver for PrintOutcome {
//!     fn on_job_finished(&self, report: &JobReport) {
//!         println!("cam{} {}#{}: {}", report.camera_index, report.label,
//!                  report.segment_index, report.outcome);
//!     }
//! }
//!
//! let options = BatchOptions::new().with_observer(Arc::new(PrintOutcome));
//! let extractor = BatchExtractor::new(Arc::new(FfmpegBackend::new()), options)?;
//! extractor.run("configs/config.yaml")?;
//! # Ok::<(), labelclip::LabelClipError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use crate::category::Category;
use crate::dispatch::ExecutionMode;
use crate::extractor::JobOutcome;

/// Announces a label group about to be dispatched.
#[derive(Debug, Clone)]
pub struct GroupInfo<'a> {
    /// Dataset name of the configuration entry.
    pub dataset: &'a str,
    /// 1-based camera index.
    pub camera_index: usize,
    /// The group's label.
    pub label: &'a str,
    /// Category of the label.
    pub category: Category,
    /// Number of jobs in the group.
    pub job_count: usize,
    /// How the group's jobs will run.
    pub mode: ExecutionMode,
}

/// Outcome of one finished job.
#[derive(Debug)]
pub struct JobReport<'a> {
    /// 1-based camera index.
    pub camera_index: usize,
    /// Segment label.
    pub label: &'a str,
    /// Category of the label.
    pub category: Category,
    /// 1-based index inside the label group.
    pub segment_index: usize,
    /// What happened.
    pub outcome: &'a JobOutcome,
    /// Wall-clock time the job took.
    pub elapsed: Duration,
}

/// Receives progress notifications from a batch run.
///
/// Implementations must be [`Send`] and [`Sync`]: in parallel mode
/// [`on_job_finished`](BatchObserver::on_job_finished) is called from worker
/// threads, in no particular order.
///
/// Observers are infallible; use [`CancellationToken`] to stop a batch.
pub trait BatchObserver: Send + Sync {
    /// Called before the jobs of a label group are dispatched.
    fn on_group_started(&self, _group: &GroupInfo<'_>) {}

    /// Called after every job, whatever its outcome.
    fn on_job_finished(&self, report: &JobReport<'_>);
}

/// Discards all notifications. The default observer.
pub(crate) struct NoOpObserver;

impl BatchObserver for NoOpObserver {
    fn on_job_finished(&self, _report: &JobReport<'_>) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share state. Jobs already running finish normally; jobs that have
/// not started when the token is cancelled are reported as skipped.
///
/// # Example
///
/// ```
/// use labelclip::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
