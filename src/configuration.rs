//! Batch configuration.
//!
//! A configuration file is a list of [`ConfigEntry`] values, written as JSON
//! or YAML; the format is picked from the file extension by [`ConfigFormat`].
//! Entries are validated as soon as they are loaded so that a typo fails the
//! run before any video is touched.
//!
//! ```yaml
//! - video_dataset: "20241123_194318"
//!   video_paths: [data/input/cam1.mp4, data/input/cam2.mp4]
//!   frame_offsets: [0, 12]
//!   json_path: data/input/annotations.json
//!   output_dir: data/output/20241123_194318
//!   codec: libx264
//!   fps: 30
//!   execution_mode: parallel
//! ```
//!
//! [`BatchOptions`] carries the run-time settings that do not belong in the
//! file: observer, cancellation, worker count, and an execution-mode
//! override.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::dispatch::ExecutionMode;
use crate::error::LabelClipError;
use crate::progress::{BatchObserver, CancellationToken, NoOpObserver};

fn default_codec() -> String {
    "libx264".to_string()
}

/// One unit of batch work: a set of synchronised camera recordings sharing
/// one annotation file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigEntry {
    /// Camera videos, in camera order.
    pub video_paths: Vec<PathBuf>,
    /// Per-camera frame offsets, same length and order as `video_paths`.
    pub frame_offsets: Vec<i64>,
    /// Annotation document shared by all cameras.
    #[serde(rename = "json_path", alias = "annotation_path")]
    pub annotation_path: PathBuf,
    /// Root of the output tree.
    pub output_dir: PathBuf,
    /// FFmpeg encoder name. Defaults to `libx264`.
    #[serde(default = "default_codec")]
    pub codec: String,
    /// Output frame rate.
    pub fps: f64,
    /// How label groups are executed. Defaults to parallel.
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Human-readable name, used only in log messages.
    #[serde(default)]
    pub video_dataset: String,
}

impl ConfigEntry {
    /// Check the invariants serde cannot express.
    ///
    /// `index` is the entry's position in its file, used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`LabelClipError::InvalidConfig`] naming the offending field.
    pub fn validate(&self, index: usize) -> Result<(), LabelClipError> {
        let invalid = |field: &'static str, reason: String| LabelClipError::InvalidConfig {
            entry: index,
            field,
            reason,
        };

        if self.video_paths.is_empty() {
            return Err(invalid("video_paths", "must list at least one video".to_string()));
        }

        if self.frame_offsets.len() != self.video_paths.len() {
            return Err(invalid(
                "frame_offsets",
                format!(
                    "has {} values but `video_paths` has {}",
                    self.frame_offsets.len(),
                    self.video_paths.len()
                ),
            ));
        }

        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(invalid("fps", format!("must be a positive number, got {}", self.fps)));
        }

        if self.codec.trim().is_empty() {
            return Err(invalid("codec", "must not be empty".to_string()));
        }

        Ok(())
    }

    /// Name used in log messages: the dataset name, or the output directory
    /// when no name was given.
    pub fn display_name(&self) -> String {
        if self.video_dataset.is_empty() {
            self.output_dir.display().to_string()
        } else {
            self.video_dataset.clone()
        }
    }

    /// `(camera_index, video_path, frame_offset)` triples, with 1-based
    /// camera indices.
    pub fn cameras(&self) -> impl Iterator<Item = (usize, &Path, i64)> {
        self.video_paths
            .iter()
            .zip(&self.frame_offsets)
            .enumerate()
            .map(|(index, (path, offset))| (index + 1, path.as_path(), *offset))
    }
}

/// Serialisation format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json`
    Json,
    /// `.yaml` or `.yml`
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`LabelClipError::UnsupportedConfigFormat`] for any other
    /// extension.
    pub fn from_path(path: &Path) -> Result<Self, LabelClipError> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("yaml" | "yml") => Ok(ConfigFormat::Yaml),
            _ => Err(LabelClipError::UnsupportedConfigFormat(path.to_path_buf())),
        }
    }

    /// Parse a list of entries. Does not validate them.
    ///
    /// The error is the parser's message.
    pub fn parse(self, text: &str) -> Result<Vec<ConfigEntry>, String> {
        match self {
            ConfigFormat::Json => serde_json::from_str(text).map_err(|error| error.to_string()),
            ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(|error| error.to_string()),
        }
    }
}

/// Load and validate every entry of a configuration file.
///
/// # Errors
///
/// - [`LabelClipError::UnsupportedConfigFormat`] for an unknown extension.
/// - [`LabelClipError::ConfigOpen`] if the file cannot be read.
/// - [`LabelClipError::ConfigParse`] if it is not a list of entries.
/// - [`LabelClipError::InvalidConfig`] if an entry fails validation.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Vec<ConfigEntry>, LabelClipError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;

    log::debug!("Loading {format:?} configuration from {}", path.display());

    let text = std::fs::read_to_string(path).map_err(|error| LabelClipError::ConfigOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;

    let entries = format
        .parse(&text)
        .map_err(|reason| LabelClipError::ConfigParse {
            path: path.to_path_buf(),
            reason,
        })?;

    for (index, entry) in entries.iter().enumerate() {
        entry.validate(index)?;
    }

    log::debug!("Loaded {} configuration entries", entries.len());
    Ok(entries)
}

/// Run-time settings for a [`BatchExtractor`](crate::BatchExtractor).
///
/// All fields have defaults: no observer, no cancellation, one worker per
/// available CPU, and each entry's own execution mode.
#[derive(Clone)]
pub struct BatchOptions {
    pub(crate) observer: Arc<dyn BatchObserver>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) workers: Option<usize>,
    pub(crate) mode_override: Option<ExecutionMode>,
}

impl Debug for BatchOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BatchOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("workers", &self.workers)
            .field("mode_override", &self.mode_override)
            .finish_non_exhaustive()
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            observer: Arc::new(NoOpObserver),
            cancellation: None,
            workers: None,
            mode_override: None,
        }
    }

    /// Attach an observer for group and job notifications.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set the worker pool size. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    /// Force every entry to run in `mode`, ignoring its `execution_mode`.
    #[must_use]
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode_override = Some(mode);
        self
    }
}
