//! Extraction jobs and the output layout.
//!
//! A job is the unit of work that turns one [`Segment`] of one camera into one
//! clip. Jobs are built in a single-threaded planning step, so every job
//! carries its final `segment_index` and therefore its final output path
//! before any worker starts.
//!
//! The output layout is
//!
//! ```text
//! {output_root}/{category}/{label}/{segment_index}/cam{camera_index}_{segment_index}.{ext}
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use crate::category::{Category, categorize};
use crate::segment::{LabelGroup, Segment};

/// Output container, derived from the encoder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// MPEG-4 Part 14. Used for every codec not listed below.
    Mp4,
    /// WebM, for VP8/VP9 encoders.
    WebM,
    /// QuickTime, for ProRes encoders.
    Mov,
    /// Matroska, for FFV1 and other archival codecs.
    Matroska,
    /// Ogg, for Theora.
    Ogg,
}

impl Container {
    /// Pick the container implied by an FFmpeg encoder name.
    ///
    /// # Example
    ///
    /// ```
    /// use labelclip::Container;
    ///
    /// assert_eq!(Container::for_codec("libx264"), Container::Mp4);
    /// assert_eq!(Container::for_codec("libvpx-vp9"), Container::WebM);
    /// ```
    pub fn for_codec(codec: &str) -> Self {
        match codec.to_ascii_lowercase().as_str() {
            "libvpx" | "libvpx-vp9" | "vp8" | "vp9" | "vp8_vaapi" | "vp9_vaapi" | "vp9_qsv" => {
                Container::WebM
            }
            "prores" | "prores_ks" | "prores_aw" | "prores_videotoolbox" => Container::Mov,
            "ffv1" | "huffyuv" | "utvideo" => Container::Matroska,
            "libtheora" | "theora" => Container::Ogg,
            _ => Container::Mp4,
        }
    }

    /// File extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Mov => "mov",
            Container::Matroska => "mkv",
            Container::Ogg => "ogv",
        }
    }

    /// Name of the FFmpeg muxer for this container.
    pub fn muxer_name(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Mov => "mov",
            Container::Matroska => "matroska",
            Container::Ogg => "ogg",
        }
    }
}

/// One segment of one camera, ready to be extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionJob {
    /// Camera video the segment is cut from.
    pub source_video_path: PathBuf,
    /// The labeled time window, on the annotation timeline.
    pub segment: Segment,
    /// Root of the output tree.
    pub output_root: PathBuf,
    /// 1-based camera position in the configuration entry.
    pub camera_index: usize,
    /// 1-based position of the segment inside its label group.
    pub segment_index: usize,
    /// FFmpeg encoder name.
    pub codec: String,
    /// Output frame rate.
    pub output_fps: f64,
}

impl ExtractionJob {
    /// Category of the job's label.
    pub fn category(&self) -> Category {
        categorize(&self.segment.label)
    }

    /// Container the clip is written in.
    pub fn container(&self) -> Container {
        Container::for_codec(&self.codec)
    }

    /// Directory holding the clip: `{root}/{category}/{label}/{segment_index}`.
    pub fn output_dir(&self) -> PathBuf {
        self.output_root
            .join(self.category().as_str())
            .join(&self.segment.label)
            .join(self.segment_index.to_string())
    }

    /// File name of the clip: `cam{camera_index}_{segment_index}.{ext}`.
    pub fn file_name(&self) -> String {
        format!(
            "cam{}_{}.{}",
            self.camera_index,
            self.segment_index,
            self.container().extension()
        )
    }

    /// Full path of the clip.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir().join(self.file_name())
    }
}

impl Display for ExtractionJob {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "cam{} {}/{}#{} [{:.3}s, {:.3}s)",
            self.camera_index,
            self.category(),
            self.segment.label,
            self.segment_index,
            self.segment.start,
            self.segment.end,
        )
    }
}

/// Build the jobs for one camera.
///
/// Emits one job per segment, label group after label group, assigning each
/// segment its 1-based position inside the group. Performs no I/O.
pub fn build_jobs(
    camera_index: usize,
    source_video_path: &Path,
    groups: &[LabelGroup],
    output_root: &Path,
    codec: &str,
    output_fps: f64,
) -> Vec<ExtractionJob> {
    groups
        .iter()
        .flat_map(|group| {
            group
                .segments
                .iter()
                .enumerate()
                .map(move |(position, segment)| ExtractionJob {
                    source_video_path: source_video_path.to_path_buf(),
                    segment: segment.clone(),
                    output_root: output_root.to_path_buf(),
                    camera_index,
                    segment_index: position + 1,
                    codec: codec.to_string(),
                    output_fps,
                })
        })
        .collect()
}
