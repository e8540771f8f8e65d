//! Job dispatch: sequential or on a bounded worker pool.
//!
//! A [`Dispatcher`] owns a fixed-size rayon thread pool, built once and reused
//! for every label group of a batch. Each call to
//! [`dispatch`](Dispatcher::dispatch) blocks until every job it was given has
//! finished, whatever the mode.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use rayon::{
    ThreadPool, ThreadPoolBuilder,
    iter::{IntoParallelRefIterator, ParallelIterator},
};
use serde::Deserialize;

use crate::error::LabelClipError;
use crate::extractor::{JobOutcome, SegmentExtractor};
use crate::job::ExtractionJob;
use crate::progress::{BatchObserver, CancellationToken, JobReport};

/// Reason reported for jobs that never started because the batch was
/// cancelled.
pub const CANCELLED_REASON: &str = "cancelled";

/// How the jobs of a label group are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Jobs run concurrently on the worker pool. Completion order is
    /// unspecified.
    #[default]
    Parallel,
    /// Jobs run one after another, in the order they were built.
    Sequential,
}

impl ExecutionMode {
    /// Lowercase name, as written in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::Sequential => "sequential",
        }
    }
}

impl Display for ExecutionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "parallel" => Ok(ExecutionMode::Parallel),
            "sequential" => Ok(ExecutionMode::Sequential),
            other => Err(format!(
                "unknown execution mode `{other}` (expected `parallel` or `sequential`)"
            )),
        }
    }
}

/// Number of workers used when none is configured: the available hardware
/// parallelism, or 1 if it cannot be determined.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

/// Runs batches of jobs and reports each outcome to an observer.
pub struct Dispatcher {
    pool: ThreadPool,
    extractor: SegmentExtractor,
    observer: Arc<dyn BatchObserver>,
    cancellation: Option<CancellationToken>,
}

impl Dispatcher {
    /// Create a dispatcher with a pool of `workers` threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`LabelClipError::WorkerPool`] if the threads cannot be spawned.
    pub fn new(
        extractor: SegmentExtractor,
        workers: usize,
        observer: Arc<dyn BatchObserver>,
        cancellation: Option<CancellationToken>,
    ) -> Result<Self, LabelClipError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|index| format!("labelclip-worker-{index}"))
            .build()
            .map_err(|error| LabelClipError::WorkerPool(error.to_string()))?;

        log::debug!("Worker pool ready with {} threads", pool.current_num_threads());

        Ok(Self {
            pool,
            extractor,
            observer,
            cancellation,
        })
    }

    /// Number of worker threads in the pool.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `jobs` and wait for all of them.
    ///
    /// Outcomes are returned in the order of `jobs`, independent of the order
    /// in which they completed. A job that panics is reported as
    /// [`LabelClipError::WorkerPanicked`]; it does not disturb the pool or the
    /// other jobs.
    pub fn dispatch(&self, jobs: &[ExtractionJob], mode: ExecutionMode) -> Vec<JobOutcome> {
        match mode {
            ExecutionMode::Sequential => jobs.iter().map(|job| self.run_one(job)).collect(),
            ExecutionMode::Parallel => self
                .pool
                .install(|| jobs.par_iter().map(|job| self.run_one(job)).collect()),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    fn run_one(&self, job: &ExtractionJob) -> JobOutcome {
        let started = Instant::now();

        let outcome = if self.is_cancelled() {
            JobOutcome::Skipped(CANCELLED_REASON.to_string())
        } else {
            catch_unwind(AssertUnwindSafe(|| self.extractor.extract(job))).unwrap_or_else(
                |payload| {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|message| message.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic payload".to_string());
                    log::error!("Worker panicked on {job}: {message}");
                    JobOutcome::Failed(LabelClipError::WorkerPanicked(message))
                },
            )
        };

        self.observer.on_job_finished(&JobReport {
            camera_index: job.camera_index,
            label: &job.segment.label,
            category: job.category(),
            segment_index: job.segment_index,
            outcome: &outcome,
            elapsed: started.elapsed(),
        });

        outcome
    }
}
