//! Batch orchestration.
//!
//! [`BatchExtractor`] walks a configuration file entry by entry. For each
//! entry it loads the shared annotation document once, then for every camera
//! probes the video's frame rate, translates the annotations with that
//! camera's frame offset, and dispatches one label group at a time.
//!
//! Configuration and annotation problems abort the run. A camera that cannot
//! be probed is logged and counted; the remaining cameras still run. Failed
//! and skipped jobs never abort anything.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::annotation::{AnnotationDocument, translate};
use crate::category::categorize;
use crate::configuration::{BatchOptions, ConfigEntry, load_config};
use crate::dispatch::{Dispatcher, ExecutionMode, default_worker_count};
use crate::error::LabelClipError;
use crate::extractor::{JobOutcome, SegmentExtractor};
use crate::job::build_jobs;
use crate::media::MediaBackend;
use crate::progress::{BatchObserver, CancellationToken, GroupInfo};
use crate::segment::{LabelGroup, group_by_label};

/// Totals for a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Configuration entries processed.
    pub entries: usize,
    /// Cameras skipped because their video could not be probed.
    pub cameras_failed: usize,
    /// Clips written.
    pub written: usize,
    /// Jobs skipped (out of bounds or cancelled).
    pub skipped: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Count one job outcome.
    pub fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Written(_) => self.written += 1,
            JobOutcome::Skipped(_) => self.skipped += 1,
            JobOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Total number of jobs dispatched.
    pub fn jobs(&self) -> usize {
        self.written + self.skipped + self.failed
    }

    fn merge(&mut self, other: BatchSummary) {
        self.entries += other.entries;
        self.cameras_failed += other.cameras_failed;
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} entries, {} clips written, {} skipped, {} failed, {} cameras unreadable in {}",
            self.entries,
            self.written,
            self.skipped,
            self.failed,
            self.cameras_failed,
            format_elapsed(self.elapsed)
        )
    }
}

/// Format a duration as `Xh Ym Zs`, truncating to whole seconds.
///
/// ```
/// use std::time::Duration;
///
/// assert_eq!(labelclip::format_elapsed(Duration::from_secs_f64(3725.9)), "1h 2m 5s");
/// ```
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    format!(
        "{}h {}m {}s",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Runs configuration files against a [`MediaBackend`].
///
/// The worker pool is built once in [`new`](BatchExtractor::new) and reused
/// for every entry and label group.
pub struct BatchExtractor {
    backend: Arc<dyn MediaBackend>,
    dispatcher: Dispatcher,
    observer: Arc<dyn BatchObserver>,
    cancellation: Option<CancellationToken>,
    mode_override: Option<ExecutionMode>,
}

impl BatchExtractor {
    /// Create an extractor.
    ///
    /// # Errors
    ///
    /// Returns [`LabelClipError::WorkerPool`] if the worker pool cannot be
    /// built.
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        options: BatchOptions,
    ) -> Result<Self, LabelClipError> {
        let workers = options.workers.unwrap_or_else(default_worker_count);
        let dispatcher = Dispatcher::new(
            SegmentExtractor::new(Arc::clone(&backend)),
            workers,
            Arc::clone(&options.observer),
            options.cancellation.clone(),
        )?;

        Ok(Self {
            backend,
            dispatcher,
            observer: options.observer,
            cancellation: options.cancellation,
            mode_override: options.mode_override,
        })
    }

    /// Number of worker threads used in parallel mode.
    pub fn workers(&self) -> usize {
        self.dispatcher.workers()
    }

    /// Load a configuration file and run every entry in order.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: configuration loading, an output root
    /// that cannot be created, or an annotation document that cannot be read
    /// or is malformed. Per-job failures are counted in the summary instead.
    pub fn run<P: AsRef<Path>>(&self, config_path: P) -> Result<BatchSummary, LabelClipError> {
        let started = Instant::now();
        let config_path = config_path.as_ref();
        let entries = load_config(config_path)?;

        log::info!(
            "Running {} configuration entries from {} on {} workers",
            entries.len(),
            config_path.display(),
            self.workers()
        );

        let mut summary = BatchSummary::default();
        for entry in &entries {
            if self.is_cancelled() {
                log::warn!("Batch cancelled; remaining configuration entries not started");
                break;
            }
            summary.merge(self.process_entry(entry)?);
        }

        summary.elapsed = started.elapsed();
        log::info!("Total execution time: {}", format_elapsed(summary.elapsed));
        Ok(summary)
    }

    /// Validate and run a single configuration entry.
    ///
    /// # Errors
    ///
    /// Same as [`run`](BatchExtractor::run), plus
    /// [`LabelClipError::InvalidConfig`] (reported as entry 0) if the entry
    /// fails validation.
    pub fn run_entry(&self, entry: &ConfigEntry) -> Result<BatchSummary, LabelClipError> {
        let started = Instant::now();
        entry.validate(0)?;
        let mut summary = self.process_entry(entry)?;
        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    fn process_entry(&self, entry: &ConfigEntry) -> Result<BatchSummary, LabelClipError> {
        let name = entry.display_name();
        let mode = self.mode_override.unwrap_or(entry.execution_mode);
        log::info!("Processing configuration: {name} ({mode})");

        fs::create_dir_all(&entry.output_dir).map_err(|source| {
            LabelClipError::OutputRootCreation {
                path: entry.output_dir.clone(),
                source,
            }
        })?;

        let document = AnnotationDocument::load(&entry.annotation_path)?;
        document.labeled_ranges()?;

        let mut summary = BatchSummary {
            entries: 1,
            ..BatchSummary::default()
        };

        for (camera_index, video_path, frame_offset) in entry.cameras() {
            if self.is_cancelled() {
                log::warn!("Batch cancelled; remaining cameras of {name} not started");
                break;
            }

            let groups = match self.plan_camera(&document, video_path, frame_offset) {
                Ok(groups) => groups,
                Err(error) => {
                    log::error!(
                        "Skipping camera {camera_index} ({}): {error}",
                        video_path.display()
                    );
                    summary.cameras_failed += 1;
                    continue;
                }
            };

            for group in &groups {
                let jobs = build_jobs(
                    camera_index,
                    video_path,
                    std::slice::from_ref(group),
                    &entry.output_dir,
                    &entry.codec,
                    entry.fps,
                );

                self.observer.on_group_started(&GroupInfo {
                    dataset: &name,
                    camera_index,
                    label: &group.label,
                    category: categorize(&group.label),
                    job_count: jobs.len(),
                    mode,
                });

                for outcome in self.dispatcher.dispatch(&jobs, mode) {
                    summary.record(&outcome);
                }
            }
        }

        log::info!("Processing finished for configuration: {name}");
        Ok(summary)
    }

    fn plan_camera(
        &self,
        document: &AnnotationDocument,
        video_path: &Path,
        frame_offset: i64,
    ) -> Result<Vec<LabelGroup>, LabelClipError> {
        let info = self.backend.probe(video_path)?;
        log::debug!(
            "Camera video {} runs at {:.3} fps, offset {frame_offset} frames",
            video_path.display(),
            info.frames_per_second
        );

        let segments = translate(document, info.frames_per_second, frame_offset)?;
        Ok(group_by_label(segments))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::ZERO), "0h 0m 0s");
        assert_eq!(format_elapsed(Duration::from_secs(59)), "0h 0m 59s");
        assert_eq!(format_elapsed(Duration::from_secs(7322)), "2h 2m 2s");
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = BatchSummary::default();
        summary.record(&JobOutcome::Written(PathBuf::from("a.mp4")));
        summary.record(&JobOutcome::Written(PathBuf::from("b.mp4")));
        summary.record(&JobOutcome::Skipped("cancelled".into()));
        summary.record(&JobOutcome::Failed(LabelClipError::TranscodeError("x".into())));

        assert_eq!((summary.written, summary.skipped, summary.failed), (2, 1, 1));
        assert_eq!(summary.jobs(), 4);
    }

    #[test]
    fn summary_merge_and_display() {
        let mut total = BatchSummary::default();
        total.merge(BatchSummary {
            entries: 1,
            cameras_failed: 1,
            written: 3,
            ..BatchSummary::default()
        });
        total.merge(BatchSummary {
            entries: 1,
            failed: 2,
            ..BatchSummary::default()
        });
        total.elapsed = Duration::from_secs(61);

        assert_eq!(
            total.to_string(),
            "2 entries, 3 clips written, 0 skipped, 2 failed, 1 cameras unreadable in 0h 1m 1s"
        );
    }
}
