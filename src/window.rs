//! Clip-relative clamping of segment windows.

use crate::segment::Segment;

/// The part of a segment that a particular source video can supply,
/// expressed in seconds relative to the start of that source.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub struct ClipWindow {
    /// Start of the window (inclusive), `>= 0`.
    pub start: f64,
    /// End of the window (exclusive), `<= clip_duration`.
    pub end: f64,
}

impl ClipWindow {
    /// Clamp `segment` to a source that begins at `clip_start` on the
    /// annotation timeline and lasts `clip_duration` seconds.
    ///
    /// Returns `None` when nothing of the segment falls inside the source,
    /// including degenerate segments with `end <= start`.
    ///
    /// # Example
    ///
    /// ```
    /// use labelclip::{ClipWindow, Segment};
    ///
    /// let segment = Segment::new("Mae-Geri", 5.0, 12.0);
    /// let window = ClipWindow::clamp(&segment, 8.0, 10.0).unwrap();
    /// assert_eq!((window.start, window.end), (0.0, 4.0));
    ///
    /// let late = Segment::new("Mae-Geri", 20.0, 25.0);
    /// assert!(ClipWindow::clamp(&late, 0.0, 10.0).is_none());
    /// ```
    pub fn clamp(segment: &Segment, clip_start: f64, clip_duration: f64) -> Option<Self> {
        // `f64::max`/`min` discard NaN operands, so reject them up front.
        if [segment.start, segment.end, clip_start, clip_duration]
            .iter()
            .any(|value| value.is_nan())
        {
            return None;
        }

        let start = (segment.start - clip_start).max(0.0);
        let end = (segment.end - clip_start).min(clip_duration);

        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Window length in seconds. Always positive.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}
