//! # labelclip
//!
//! Cut labelled segments out of synchronised multi-camera recordings.
//!
//! `labelclip` reads a timeline annotation document (label groups with frame
//! ranges), converts the ranges to seconds for every camera using that
//! camera's frame rate and frame offset, and writes one re-encoded clip per
//! (camera, segment) into a fixed directory layout:
//!
//! ```text
//! {output_dir}/{category}/{label}/{segment_index}/cam{camera_index}_{segment_index}.{ext}
//! ```
//!
//! where `category` is `kata`, `combinations` or `elements` (see
//! [`categorize`]). Decoding and encoding go through FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use labelclip::{BatchExtractor, BatchOptions, FfmpegBackend};
//!
//! let extractor = BatchExtractor::new(Arc::new(FfmpegBackend::new()), BatchOptions::new())?;
//! let summary = extractor.run("configs/config.yaml")?;
//! println!("{summary}");
//! # Ok::<(), labelclip::LabelClipError>(())
//! ```
//!
//! ## Planning without FFmpeg
//!
//! The planning steps are plain functions and can be used on their own:
//!
//! ```
//! use std::path::Path;
//!
//! use labelclip::{AnnotationDocument, build_jobs, group_by_label, translate};
//!
//! let document = AnnotationDocument::from_json(
//!     r#"[{"videoLabels": [{"timelinelabels": ["Age-Uke"],
//!                           "ranges": [{"start": 0, "end": 30}, {"start": 60, "end": 90}]}]}]"#,
//! )?;
//! let segments = translate(&document, 30.0, 0)?;
//! let groups = group_by_label(segments);
//! let jobs = build_jobs(1, Path::new("cam1.mp4"), &groups, Path::new("out"), "libx264", 30.0);
//!
//! assert_eq!(jobs[1].output_path(), Path::new("out/elements/Age-Uke/2/cam1_2.mp4"));
//! # Ok::<(), labelclip::LabelClipError>(())
//! ```
//!
//! ## Failure model
//!
//! - Configuration and annotation errors abort the run ([`LabelClipError::is_fatal`]).
//! - A camera whose video cannot be probed is skipped and counted.
//! - Every job ends as a [`JobOutcome`]; a failing or panicking job never
//!   affects its siblings.
//! - Clips are written to a temporary file and renamed into place, so a
//!   final path only ever holds a complete clip.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod annotation;
pub mod batch;
pub mod category;
pub mod configuration;
mod conversion;
pub mod dispatch;
pub mod error;
pub mod extractor;
pub mod job;
pub mod media;
pub mod progress;
pub mod segment;
pub mod transcode;
pub mod window;

pub use annotation::{AnnotationDocument, AnnotationRange, translate};
pub use batch::{BatchExtractor, BatchSummary, format_elapsed};
pub use category::{Category, KATA_FORMS, categorize};
pub use configuration::{BatchOptions, ConfigEntry, ConfigFormat, load_config};
pub use dispatch::{CANCELLED_REASON, Dispatcher, ExecutionMode, default_worker_count};
pub use error::LabelClipError;
pub use extractor::{JobOutcome, OUT_OF_BOUNDS_REASON, SegmentExtractor};
pub use job::{Container, ExtractionJob, build_jobs};
pub use media::{ClipRequest, MediaBackend, SourceInfo};
pub use progress::{BatchObserver, CancellationToken, GroupInfo, JobReport};
pub use segment::{LabelGroup, Segment, group_by_label};
pub use transcode::FfmpegBackend;
pub use window::ClipWindow;
