//! Per-job segment extraction.
//!
//! [`SegmentExtractor::extract`] runs one [`ExtractionJob`] to completion and
//! reports what happened as a [`JobOutcome`]. It never returns an error and
//! never leaves a partially written clip at the final path: the backend
//! writes into a hidden temporary file that is renamed into place only after
//! the encode succeeded.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::LabelClipError;
use crate::job::ExtractionJob;
use crate::media::{ClipRequest, MediaBackend};
use crate::window::ClipWindow;

/// Reason reported for segments that fall outside their camera's video.
pub const OUT_OF_BOUNDS_REASON: &str = "segment out of bounds for this camera";

/// Result of running one job.
#[derive(Debug)]
#[must_use]
pub enum JobOutcome {
    /// The clip was written to this path.
    Written(PathBuf),
    /// Nothing was written; the job was a no-op.
    Skipped(String),
    /// The job failed. Sibling jobs are unaffected.
    Failed(LabelClipError),
}

impl JobOutcome {
    /// Short lowercase tag: `written`, `skipped` or `failed`.
    pub fn kind(&self) -> &'static str {
        match self {
            JobOutcome::Written(_) => "written",
            JobOutcome::Skipped(_) => "skipped",
            JobOutcome::Failed(_) => "failed",
        }
    }

    /// Path of the written clip, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            JobOutcome::Written(path) => Some(path),
            _ => None,
        }
    }

    /// Returns `true` for [`JobOutcome::Written`].
    pub fn is_written(&self) -> bool {
        matches!(self, JobOutcome::Written(_))
    }

    /// Returns `true` for [`JobOutcome::Skipped`].
    pub fn is_skipped(&self) -> bool {
        matches!(self, JobOutcome::Skipped(_))
    }

    /// Returns `true` for [`JobOutcome::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, JobOutcome::Failed(_))
    }
}

impl Display for JobOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobOutcome::Written(path) => write!(f, "written to {}", path.display()),
            JobOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
            JobOutcome::Failed(error) => write!(f, "failed: {error}"),
        }
    }
}

/// Runs extraction jobs against a [`MediaBackend`].
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct SegmentExtractor {
    backend: Arc<dyn MediaBackend>,
}

impl SegmentExtractor {
    /// Create an extractor over `backend`.
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self { backend }
    }

    /// Extract one segment.
    ///
    /// 1. Probe the source for its start offset and duration.
    /// 2. Clamp the segment to the source; an empty window is a skip.
    /// 3. Create the clip's directory (idempotent).
    /// 4. Encode the window into a temporary file and rename it over the
    ///    final path, replacing any clip left by an earlier run.
    pub fn extract(&self, job: &ExtractionJob) -> JobOutcome {
        let info = match self.backend.probe(&job.source_video_path) {
            Ok(info) => info,
            Err(error) => {
                log::error!("Error processing segment {job}: {error}");
                return JobOutcome::Failed(error);
            }
        };

        let Some(window) = ClipWindow::clamp(&job.segment, info.start_offset, info.duration)
        else {
            log::warn!(
                "Segment {} is out of bounds for camera {} ({job})",
                job.segment.label,
                job.camera_index
            );
            return JobOutcome::Skipped(OUT_OF_BOUNDS_REASON.to_string());
        };

        match self.write(job, window) {
            Ok(path) => {
                log::info!("Segment {} saved successfully", path.display());
                JobOutcome::Written(path)
            }
            Err(error) => {
                log::error!("Error processing segment {job}: {error}");
                JobOutcome::Failed(error)
            }
        }
    }

    fn write(&self, job: &ExtractionJob, window: ClipWindow) -> Result<PathBuf, LabelClipError> {
        let directory = job.output_dir();
        fs::create_dir_all(&directory).map_err(|source| LabelClipError::DirectoryCreation {
            path: directory.clone(),
            source,
        })?;

        let final_path = directory.join(job.file_name());
        let temporary_path = directory.join(format!(".{}.partial", job.file_name()));

        log::debug!(
            "Encoding {job} window [{:.3}s, {:.3}s) -> {}",
            window.start,
            window.end,
            final_path.display()
        );

        let request = ClipRequest {
            source: &job.source_video_path,
            window,
            codec: &job.codec,
            frames_per_second: job.output_fps,
            container: job.container(),
            output: &temporary_path,
        };

        let result = self
            .backend
            .write_clip(&request)
            .and_then(|()| fs::rename(&temporary_path, &final_path).map_err(LabelClipError::from));

        if result.is_err() {
            discard(&temporary_path);
        }

        result.map(|()| final_path)
    }
}

fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => log::warn!(
            "Could not remove incomplete clip {}: {error}",
            path.display()
        ),
    }
}
