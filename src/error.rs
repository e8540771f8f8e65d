//! Error types for the `labelclip` crate.
//!
//! This module defines [`LabelClipError`], the unified error type returned by
//! all fallible operations in the crate. Configuration-class variants abort a
//! batch; the remaining variants are contained to the job that produced them
//! and surface inside [`JobOutcome::Failed`](crate::JobOutcome::Failed).

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `labelclip` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LabelClipError {
    /// The configuration file could not be read.
    #[error("Failed to open configuration file at {path}: {reason}")]
    ConfigOpen {
        /// Path that was passed to the loader.
        path: PathBuf,
        /// Underlying reason the read failed.
        reason: String,
    },

    /// The configuration file extension does not select a known format.
    #[error("Unsupported configuration format for {0} (expected .json, .yaml or .yml)")]
    UnsupportedConfigFormat(PathBuf),

    /// The configuration file is not valid JSON/YAML or has the wrong shape.
    #[error("Failed to parse configuration file {path}: {reason}")]
    ConfigParse {
        /// Path of the configuration file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A configuration entry parsed but failed validation.
    #[error("Invalid configuration entry {entry}: field `{field}` {reason}")]
    InvalidConfig {
        /// Zero-based position of the entry in the configuration file.
        entry: usize,
        /// Offending field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The annotation file could not be read.
    #[error("Failed to open annotation file at {path}: {reason}")]
    AnnotationOpen {
        /// Path of the annotation document.
        path: PathBuf,
        /// Underlying reason the read failed.
        reason: String,
    },

    /// The annotation document lacks the expected label-group/range structure.
    #[error("Malformed annotation document: {0}")]
    MalformedAnnotation(String),

    /// A frame rate of zero, a negative value, or NaN was used for conversion.
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path of the media file.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in {0}")]
    NoVideoStream(PathBuf),

    /// No encoder with the configured name is available in the FFmpeg build.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Decoding, encoding or muxing a clip failed.
    #[error("Transcode error: {0}")]
    TranscodeError(String),

    /// The output root of a configuration entry could not be created.
    #[error("Failed to create output root {path}: {source}")]
    OutputRootCreation {
        /// The entry's `output_dir`.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: IoError,
    },

    /// The output directory for a clip could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    DirectoryCreation {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: IoError,
    },

    /// A worker panicked while running a job.
    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl LabelClipError {
    /// Returns `true` for errors that abort the whole batch.
    ///
    /// These are raised while loading configuration, preparing an entry's
    /// output root, or loading annotations, before any job of the entry has
    /// been dispatched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LabelClipError::ConfigOpen { .. }
                | LabelClipError::UnsupportedConfigFormat(_)
                | LabelClipError::ConfigParse { .. }
                | LabelClipError::InvalidConfig { .. }
                | LabelClipError::OutputRootCreation { .. }
                | LabelClipError::AnnotationOpen { .. }
                | LabelClipError::MalformedAnnotation(_)
                | LabelClipError::WorkerPool(_)
        )
    }
}

impl From<FfmpegError> for LabelClipError {
    fn from(error: FfmpegError) -> Self {
        LabelClipError::FfmpegError(error.to_string())
    }
}
