//! The media-processing seam.
//!
//! Decoding and encoding are delegated to a [`MediaBackend`]. The pipeline
//! only ever asks two things of it: describe a source video
//! ([`MediaBackend::probe`]) and write a time window of it to a file
//! ([`MediaBackend::write_clip`]). [`FfmpegBackend`](crate::FfmpegBackend) is
//! the production implementation; tests plug in their own.
//!
//! Every call opens the source on its own and releases it before returning,
//! so no decoder state is shared between jobs or threads.

use std::path::Path;

use crate::error::LabelClipError;
use crate::job::Container;
use crate::window::ClipWindow;

/// What the pipeline needs to know about a source video.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub struct SourceInfo {
    /// Average frame rate of the best video stream.
    pub frames_per_second: f64,
    /// Position of the source's first frame on the annotation timeline, in
    /// seconds. Non-zero only for sources that are themselves a cut of a
    /// longer recording.
    pub start_offset: f64,
    /// Duration of the source in seconds.
    pub duration: f64,
}

/// A request to encode one window of a source video.
#[derive(Debug, Clone, Copy)]
pub struct ClipRequest<'a> {
    /// Source video file.
    pub source: &'a Path,
    /// Window to extract, relative to the start of the source.
    pub window: ClipWindow,
    /// FFmpeg encoder name.
    pub codec: &'a str,
    /// Output frame rate.
    pub frames_per_second: f64,
    /// Output container. The output path's extension is not relied upon.
    pub container: Container,
    /// File to create or overwrite.
    pub output: &'a Path,
}

/// Decoding and encoding capability used by the extractor.
///
/// Implementations must be [`Send`] and [`Sync`]: one backend instance is
/// shared by every worker thread of a batch.
pub trait MediaBackend: Send + Sync {
    /// Open `path`, read its timing information, and close it again.
    ///
    /// # Errors
    ///
    /// Implementations return [`LabelClipError::FileOpen`] or
    /// [`LabelClipError::NoVideoStream`] when the source is unusable.
    fn probe(&self, path: &Path) -> Result<SourceInfo, LabelClipError>;

    /// Encode `request.window` of `request.source` into `request.output`.
    ///
    /// On error the output file may exist in an incomplete state; the caller
    /// is responsible for discarding it.
    ///
    /// # Errors
    ///
    /// Any [`LabelClipError`]; the extractor reports it as a job failure.
    fn write_clip(&self, request: &ClipRequest<'_>) -> Result<(), LabelClipError>;
}
