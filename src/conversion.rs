//! Internal timestamp and rate conversions.

use ffmpeg_next::Rational;

/// FFmpeg's internal time base (`AV_TIME_BASE`), in ticks per second.
pub(crate) const AV_TIME_BASE: f64 = 1_000_000.0;

/// Rescale a PTS value from a stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Convert seconds to `AV_TIME_BASE` ticks, as used by container-level
/// seeking, durations and start times.
pub(crate) fn seconds_to_av_ticks(seconds: f64) -> i64 {
    (seconds * AV_TIME_BASE) as i64
}

/// Convert `AV_TIME_BASE` ticks to seconds.
pub(crate) fn av_ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / AV_TIME_BASE
}

/// Value of a rational, or `None` for a zero denominator.
pub(crate) fn rational_to_f64(rational: Rational) -> Option<f64> {
    if rational.denominator() == 0 {
        None
    } else {
        Some(rational.numerator() as f64 / rational.denominator() as f64)
    }
}

/// Express a frame rate as a rational suitable for an encoder.
///
/// Integral rates map to `n/1`, NTSC-style rates to `n/1001`, anything else
/// to millihertz precision.
pub(crate) fn frame_rate_to_rational(frames_per_second: f64) -> Rational {
    let rounded = frames_per_second.round();
    if (frames_per_second - rounded).abs() < 1e-6 {
        return Rational::new(rounded as i32, 1);
    }

    let ntsc = (frames_per_second * 1001.0).round();
    if (ntsc / 1001.0 - frames_per_second).abs() < 1e-6 {
        return Rational::new(ntsc as i32, 1001);
    }

    Rational::new((frames_per_second * 1000.0).round() as i32, 1000)
}
