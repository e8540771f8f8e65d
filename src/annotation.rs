//! Annotation documents and their translation into timed segments.
//!
//! Annotations are exported from a video labelling tool as a JSON array. The
//! first record carries a `videoLabels` list; each entry names its label in
//! `timelinelabels` and lists the labelled frame ranges:
//!
//! ```json
//! [
//!   {
//!     "videoLabels": [
//!       { "timelinelabels": ["Mae-Geri"], "ranges": [{ "start": 0, "end": 30 }] }
//!     ]
//!   }
//! ]
//! ```
//!
//! Frame indices are shifted by a per-camera offset and divided by the
//! camera's frame rate to give seconds.

use std::path::{Component, Path};

use serde::Deserialize;

use crate::error::LabelClipError;
use crate::segment::Segment;

/// A parsed annotation document.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct AnnotationDocument {
    records: Vec<AnnotationRecord>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnnotationRecord {
    #[serde(rename = "videoLabels")]
    video_labels: Option<Vec<LabelGroupRecord>>,
}

#[derive(Debug, Clone, Deserialize)]
struct LabelGroupRecord {
    #[serde(default)]
    timelinelabels: Vec<String>,
    ranges: Vec<AnnotationRange>,
}

/// A labelled range of frame indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AnnotationRange {
    /// First frame of the range.
    pub start: i64,
    /// Frame at which the range ends.
    pub end: i64,
}

impl AnnotationDocument {
    /// Parse a document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`LabelClipError::MalformedAnnotation`] when the text is not a
    /// JSON array of records, or a label group has non-integer ranges.
    pub fn from_json(text: &str) -> Result<Self, LabelClipError> {
        serde_json::from_str(text)
            .map_err(|error| LabelClipError::MalformedAnnotation(error.to_string()))
    }

    /// Read and parse the document at `path`.
    ///
    /// # Errors
    ///
    /// - [`LabelClipError::AnnotationOpen`] if the file cannot be read.
    /// - [`LabelClipError::MalformedAnnotation`] if it cannot be parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LabelClipError> {
        let path = path.as_ref();
        log::debug!("Loading annotations from {}", path.display());

        let text =
            std::fs::read_to_string(path).map_err(|error| LabelClipError::AnnotationOpen {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;

        Self::from_json(&text).map_err(|error| match error {
            LabelClipError::MalformedAnnotation(reason) => LabelClipError::MalformedAnnotation(
                format!("{}: {reason}", path.display()),
            ),
            other => other,
        })
    }

    /// Iterate over `(label, range)` pairs of the first record, in document
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`LabelClipError::MalformedAnnotation`] if the document is
    /// empty, the first record has no `videoLabels`, or a group has no label
    /// or a label that is not a single plain path component.
    pub fn labeled_ranges(&self) -> Result<Vec<(&str, AnnotationRange)>, LabelClipError> {
        let record = self.records.first().ok_or_else(|| {
            LabelClipError::MalformedAnnotation("document contains no records".to_string())
        })?;

        let groups = record.video_labels.as_ref().ok_or_else(|| {
            LabelClipError::MalformedAnnotation(
                "first record has no `videoLabels` list".to_string(),
            )
        })?;

        let mut pairs = Vec::new();
        for (index, group) in groups.iter().enumerate() {
            let label = group.timelinelabels.first().ok_or_else(|| {
                LabelClipError::MalformedAnnotation(format!(
                    "label group {index} has an empty `timelinelabels` list"
                ))
            })?;
            if !is_plain_component(label) {
                return Err(LabelClipError::MalformedAnnotation(format!(
                    "label `{label}` of group {index} cannot be used as a directory name"
                )));
            }
            pairs.extend(group.ranges.iter().map(|range| (label.as_str(), *range)));
        }

        Ok(pairs)
    }
}

/// Labels become one directory level of the output tree.
fn is_plain_component(label: &str) -> bool {
    let mut components = Path::new(label).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == label
    )
}

/// Convert an annotation document into timed segments.
///
/// For every range, `start = (range.start + frame_offset) / fps` and
/// `end = (range.end + frame_offset) / fps`. Document order is preserved.
/// Degenerate ranges (`start >= end`) pass through unchanged; they are
/// skipped later when the clip window turns out empty.
///
/// # Errors
///
/// - [`LabelClipError::InvalidFrameRate`] if `fps` is not a positive, finite
///   number.
/// - [`LabelClipError::MalformedAnnotation`] as for
///   [`AnnotationDocument::labeled_ranges`], or when shifting a range by
///   `frame_offset` overflows.
///
/// # Example
///
/// ```
/// use labelclip::{AnnotationDocument, translate};
///
/// let document = AnnotationDocument::from_json(
///     r#"[{"videoLabels": [{"timelinelabels": ["Mae-Geri"],
///                           "ranges": [{"start": 0, "end": 30}]}]}]"#,
/// )?;
/// let segments = translate(&document, 30.0, 15)?;
/// assert_eq!(segments[0].start, 0.5);
/// assert_eq!(segments[0].end, 1.5);
/// # Ok::<(), labelclip::LabelClipError>(())
/// ```
pub fn translate(
    document: &AnnotationDocument,
    fps: f64,
    frame_offset: i64,
) -> Result<Vec<Segment>, LabelClipError> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(LabelClipError::InvalidFrameRate(fps));
    }

    let segments = document
        .labeled_ranges()?
        .into_iter()
        .map(|(label, range)| {
            let shift = |frame: i64| {
                frame.checked_add(frame_offset).ok_or_else(|| {
                    LabelClipError::MalformedAnnotation(format!(
                        "frame {frame} of label `{label}` overflows with offset {frame_offset}"
                    ))
                })
            };
            let start_frame = shift(range.start)?;
            let end_frame = shift(range.end)?;
            Ok(Segment::new(
                label,
                start_frame as f64 / fps,
                end_frame as f64 / fps,
            ))
        })
        .collect::<Result<Vec<Segment>, LabelClipError>>()?;

    log::debug!(
        "Translated {} annotated ranges (fps={fps:.3}, frame_offset={frame_offset})",
        segments.len()
    );

    Ok(segments)
}
