//! Labeled time segments and label grouping.

use std::collections::HashMap;

/// A labeled interval `[start, end)` in seconds within a source video.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Segment {
    /// Annotation label.
    pub label: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds (exclusive).
    pub end: f64,
}

impl Segment {
    /// Create a segment.
    pub fn new(label: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }

    /// Length in seconds. Negative for degenerate annotations.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// All segments sharing one label within a camera's annotation set.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelGroup {
    /// The shared label.
    pub label: String,
    /// Segments in order of appearance.
    pub segments: Vec<Segment>,
}

/// Group segments by label.
///
/// Groups are ordered by the first occurrence of their label; inside a group
/// the input order is kept. That order later becomes the 1-based segment
/// index, so it must not be disturbed.
pub fn group_by_label(segments: impl IntoIterator<Item = Segment>) -> Vec<LabelGroup> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<LabelGroup> = Vec::new();

    for segment in segments {
        match positions.get(&segment.label) {
            Some(&position) => groups[position].segments.push(segment),
            None => {
                positions.insert(segment.label.clone(), groups.len());
                groups.push(LabelGroup {
                    label: segment.label.clone(),
                    segments: vec![segment],
                });
            }
        }
    }

    groups
}
