//! FFmpeg implementation of [`MediaBackend`].
//!
//! [`FfmpegBackend`] decodes the source with `ffmpeg-next`, keeps the frames
//! that fall inside the requested window, resamples them to the output frame
//! rate by sample-and-hold, converts them to YUV 4:2:0 and re-encodes them
//! with the configured encoder. Audio is not carried over.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use labelclip::{ClipRequest, ClipWindow, Container, FfmpegBackend, MediaBackend, Segment};
//!
//! let backend = FfmpegBackend::new();
//! let info = backend.probe(Path::new("cam1.mp4"))?;
//! let window = ClipWindow::clamp(&Segment::new("Mae-Geri", 2.0, 3.0), info.start_offset, info.duration)
//!     .expect("segment inside the video");
//! backend.write_clip(&ClipRequest {
//!     source: Path::new("cam1.mp4"),
//!     window,
//!     codec: "libx264",
//!     frames_per_second: 30.0,
//!     container: Container::Mp4,
//!     output: Path::new("clip.mp4"),
//! })?;
//! # Ok::<(), labelclip::LabelClipError>(())
//! ```

use std::path::Path;

use ffmpeg_next::{
    Packet, Rational,
    codec::context::Context as CodecContext,
    encoder::Video as VideoEncoder,
    format::{Flags as FormatFlags, Pixel, context::Input, context::Output},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

use crate::conversion::{
    av_ticks_to_seconds, frame_rate_to_rational, pts_to_seconds, rational_to_f64,
    seconds_to_av_ticks,
};
use crate::error::LabelClipError;
use crate::media::{ClipRequest, MediaBackend, SourceInfo};

/// Pixel format handed to every encoder.
const ENCODER_PIXEL_FORMAT: Pixel = Pixel::YUV420P;

/// Decode/encode backend built on `ffmpeg-next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend {
    container_timeline: bool,
}

impl FfmpegBackend {
    /// Create a backend that treats every source as starting at zero on the
    /// annotation timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the container's start time as the source's start offset.
    ///
    /// Use this for recordings cut from a longer stream that kept their
    /// original timestamps, when annotations refer to that original
    /// timeline.
    #[must_use]
    pub fn with_container_timeline(mut self, enabled: bool) -> Self {
        self.container_timeline = enabled;
        self
    }
}

fn open_input(path: &Path) -> Result<Input, LabelClipError> {
    ffmpeg_next::init().map_err(|error| LabelClipError::FileOpen {
        path: path.to_path_buf(),
        reason: format!("FFmpeg initialisation failed: {error}"),
    })?;

    ffmpeg_next::format::input(&path).map_err(|error| LabelClipError::FileOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

/// Container start time in seconds, zero when unknown.
fn container_start_seconds(input: &Input) -> f64 {
    let start_time = unsafe { (*input.as_ptr()).start_time };
    if start_time == ffmpeg_sys_next::AV_NOPTS_VALUE {
        0.0
    } else {
        av_ticks_to_seconds(start_time)
    }
}

fn transcode_error(context: &'static str) -> impl Fn(ffmpeg_next::Error) -> LabelClipError {
    move |error| LabelClipError::TranscodeError(format!("{context}: {error}"))
}

impl MediaBackend for FfmpegBackend {
    fn probe(&self, path: &Path) -> Result<SourceInfo, LabelClipError> {
        log::debug!("Probing source video: {}", path.display());
        let input = open_input(path)?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| LabelClipError::NoVideoStream(path.to_path_buf()))?;

        let frames_per_second = rational_to_f64(stream.avg_frame_rate())
            .filter(|fps| *fps > 0.0)
            .or_else(|| rational_to_f64(stream.rate()).filter(|fps| *fps > 0.0))
            .unwrap_or(0.0);

        let duration = if input.duration() > 0 {
            av_ticks_to_seconds(input.duration())
        } else if stream.duration() > 0 {
            pts_to_seconds(stream.duration(), stream.time_base())
        } else {
            0.0
        };

        let start_offset = if self.container_timeline {
            container_start_seconds(&input).max(0.0)
        } else {
            0.0
        };

        let info = SourceInfo {
            frames_per_second,
            start_offset,
            duration,
        };

        log::debug!(
            "Probed {}: {:.3} fps, start={:.3}s, duration={:.3}s",
            path.display(),
            info.frames_per_second,
            info.start_offset,
            info.duration,
        );

        Ok(info)
    }

    fn write_clip(&self, request: &ClipRequest<'_>) -> Result<(), LabelClipError> {
        if !request.frames_per_second.is_finite() || request.frames_per_second <= 0.0 {
            return Err(LabelClipError::TranscodeError(format!(
                "invalid output frame rate {}",
                request.frames_per_second
            )));
        }

        let mut input = open_input(request.source)?;
        let container_start = container_start_seconds(&input);

        let (video_stream_index, input_time_base, source_fps, mut decoder) = {
            let stream = input
                .streams()
                .best(Type::Video)
                .ok_or_else(|| LabelClipError::NoVideoStream(request.source.to_path_buf()))?;
            let decoder = CodecContext::from_parameters(stream.parameters())
                .map_err(transcode_error("cannot read decoder parameters"))?
                .decoder()
                .video()
                .map_err(transcode_error("cannot open video decoder"))?;
            let source_fps = rational_to_f64(stream.avg_frame_rate())
                .filter(|fps| *fps > 0.0)
                .unwrap_or(request.frames_per_second);
            (stream.index(), stream.time_base(), source_fps, decoder)
        };

        let width = decoder.width();
        let height = decoder.height();

        let encoder_codec = ffmpeg_next::encoder::find_by_name(request.codec)
            .ok_or_else(|| LabelClipError::UnsupportedCodec(request.codec.to_string()))?;

        let mut output =
            ffmpeg_next::format::output_as(&request.output, request.container.muxer_name())
                .map_err(|error| LabelClipError::FileOpen {
                    path: request.output.to_path_buf(),
                    reason: format!("Failed to create output: {error}"),
                })?;

        // Check before adding the stream to avoid a borrow conflict.
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let frame_rate = frame_rate_to_rational(request.frames_per_second);
        let encoder_time_base = Rational::new(frame_rate.denominator(), frame_rate.numerator());

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(transcode_error("cannot add output stream"))?;
        let output_stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .map_err(transcode_error("cannot create encoder context"))?
            .encoder()
            .video()
            .map_err(transcode_error("cannot create video encoder"))?;

        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(ENCODER_PIXEL_FORMAT);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(frame_rate));

        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let encoder = encoder
            .open_as(encoder_codec)
            .map_err(|error| LabelClipError::UnsupportedCodec(format!("{}: {error}", request.codec)))?;

        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        output
            .write_header()
            .map_err(transcode_error("cannot write header"))?;

        let output_time_base = output
            .stream(output_stream_index)
            .ok_or_else(|| LabelClipError::TranscodeError("output stream vanished".to_string()))?
            .time_base();

        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            ENCODER_PIXEL_FORMAT,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(transcode_error("cannot create scaler"))?;

        let window_start = container_start + request.window.start;
        if request.window.start > 0.0 {
            let target = seconds_to_av_ticks(window_start);
            if let Err(error) = input.seek(target, ..target) {
                log::debug!(
                    "Seek to {window_start:.3}s failed in {} ({error}), decoding from the start",
                    request.source.display()
                );
            }
        }

        let mut clip = ClipWriter {
            encoder,
            scaler,
            output,
            stream_index: output_stream_index,
            encoder_time_base,
            output_time_base,
            frames_per_second: request.frames_per_second,
            window_start,
            window_duration: request.window.duration(),
            next_frame: 0,
            held_frame: None,
        };

        let mut decoded = VideoFrame::empty();
        let mut last_timestamp: Option<f64> = None;
        let mut window_complete = false;

        let mut next_timestamp = |frame: &VideoFrame| {
            let timestamp = match frame.timestamp().or(frame.pts()) {
                Some(pts) => pts_to_seconds(pts, input_time_base),
                None => last_timestamp.map_or(window_start, |last| last + 1.0 / source_fps),
            };
            last_timestamp = Some(timestamp);
            timestamp
        };

        for (stream, packet) in input.packets() {
            if stream.index() != video_stream_index {
                continue;
            }

            decoder
                .send_packet(&packet)
                .map_err(transcode_error("decoder rejected packet"))?;

            while decoder.receive_frame(&mut decoded).is_ok() {
                let timestamp = next_timestamp(&decoded);
                if clip.push(&decoded, timestamp)? {
                    window_complete = true;
                    break;
                }
            }

            if window_complete {
                break;
            }
        }

        if !window_complete {
            decoder
                .send_eof()
                .map_err(transcode_error("cannot flush decoder"))?;
            while decoder.receive_frame(&mut decoded).is_ok() {
                let timestamp = next_timestamp(&decoded);
                if clip.push(&decoded, timestamp)? {
                    break;
                }
            }
        }

        let written = clip.finish()?;
        log::debug!(
            "Encoded {written} frames ({:.3}s) to {}",
            request.window.duration(),
            request.output.display()
        );
        Ok(())
    }
}

/// Encoder state for one clip.
///
/// Output frame `n` shows the latest decoded frame whose timestamp is at or
/// before `n / frames_per_second` into the window.
struct ClipWriter {
    encoder: VideoEncoder,
    scaler: ScalingContext,
    output: Output,
    stream_index: usize,
    encoder_time_base: Rational,
    output_time_base: Rational,
    frames_per_second: f64,
    window_start: f64,
    window_duration: f64,
    next_frame: i64,
    held_frame: Option<VideoFrame>,
}

impl ClipWriter {
    /// Feed one decoded frame. Returns `true` once the window is complete.
    fn push(&mut self, decoded: &VideoFrame, timestamp: f64) -> Result<bool, LabelClipError> {
        let relative = timestamp - self.window_start;
        if relative >= self.window_duration {
            return Ok(true);
        }

        if self.held_frame.is_some() {
            self.emit_until(relative)?;
        }

        let mut scaled = VideoFrame::empty();
        self.scaler
            .run(decoded, &mut scaled)
            .map_err(transcode_error("pixel format conversion failed"))?;
        self.held_frame = Some(scaled);

        Ok(false)
    }

    /// Emit output frames, repeating the held frame, for every slot that
    /// starts before `relative` seconds into the window.
    fn emit_until(&mut self, relative: f64) -> Result<(), LabelClipError> {
        let limit = relative.min(self.window_duration);
        while (self.next_frame as f64) / self.frames_per_second < limit {
            let Some(frame) = self.held_frame.as_mut() else {
                return Ok(());
            };
            frame.set_pts(Some(self.next_frame));
            self.encoder
                .send_frame(frame)
                .map_err(transcode_error("encoder rejected frame"))?;
            self.next_frame += 1;
            self.drain()?;
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), LabelClipError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.output_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(transcode_error("cannot write packet"))?;
        }
        Ok(())
    }

    /// Fill the rest of the window, flush the encoder and close the file.
    /// Returns the number of frames written.
    fn finish(mut self) -> Result<i64, LabelClipError> {
        self.emit_until(self.window_duration)?;

        if self.next_frame == 0 {
            return Err(LabelClipError::TranscodeError(
                "no frames decoded inside the requested window".to_string(),
            ));
        }

        self.encoder
            .send_eof()
            .map_err(transcode_error("cannot flush encoder"))?;
        self.drain()?;

        self.output
            .write_trailer()
            .map_err(transcode_error("cannot write trailer"))?;

        Ok(self.next_frame)
    }
}
