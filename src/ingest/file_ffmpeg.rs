//! Local video file source using FFmpeg.
//!
//! Frames are decoded in memory on demand: every `frame_at` seeks to the
//! keyframe before the requested position and decodes forward. Output frames
//! are RGB24 at the file's native resolution.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::source::{PlaybackClock, SeekPolicy, VideoSource};
use crate::frame::{Frame, PixelFormat};

pub(crate) struct FfmpegFileSource {
    uri: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    clock: PlaybackClock,
}

impl FfmpegFileSource {
    pub(crate) fn open(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let time_base = input_stream.time_base();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        // Container duration is in AV_TIME_BASE (microsecond) units.
        let duration_us = input.duration();
        if duration_us <= 0 {
            return Err(anyhow!("file '{}' reports no duration", path));
        }
        let clock = PlaybackClock::start(duration_us as u64 / 1_000);

        log::info!(
            "file source opened: {} ({}x{}, {} ms)",
            path,
            decoder.width(),
            decoder.height(),
            clock.duration_ms()
        );

        Ok(Self {
            uri: path.to_string(),
            input,
            stream_index,
            time_base,
            decoder,
            scaler,
            clock,
        })
    }
}

impl VideoSource for FfmpegFileSource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn duration_ms(&self) -> u64 {
        self.clock.duration_ms()
    }

    fn position_ms(&self) -> u64 {
        self.clock.position_ms()
    }

    fn frame_at(&mut self, position_ms: u64, policy: SeekPolicy) -> Result<Option<Frame>> {
        let target_us = (position_ms as i64).saturating_mul(1_000);
        self.input
            .seek(target_us, ..=target_us)
            .with_context(|| format!("seek to {} ms", position_ms))?;
        self.decoder.flush();

        let mut decoded = ffmpeg::frame::Video::empty();
        let mut previous: Option<(u64, ffmpeg::frame::Video)> = None;

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .context("send packet to ffmpeg decoder")?;

            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let Some(ts_ms) = timestamp_ms(&decoded, self.time_base) else {
                    continue;
                };
                let previous_ms = previous.as_ref().map(|(ms, _)| *ms);
                match select_frame(policy, previous_ms, ts_ms, position_ms) {
                    Selection::KeepDecoding => {
                        if policy == SeekPolicy::Closest {
                            previous = Some((ts_ms, decoded.clone()));
                        }
                    }
                    Selection::NoFrame => return Ok(None),
                    Selection::Previous => {
                        let (prev_ms, prev) = previous
                            .as_ref()
                            .context("no earlier frame decoded")?;
                        return to_frame(&mut self.scaler, prev, *prev_ms).map(Some);
                    }
                    Selection::Current => {
                        return to_frame(&mut self.scaler, &decoded, ts_ms).map(Some);
                    }
                }
            }
        }

        let previous_ms = previous.as_ref().map(|(ms, _)| *ms);
        match (select_at_end(policy, previous_ms), previous) {
            (Selection::Previous, Some((prev_ms, prev))) => {
                to_frame(&mut self.scaler, &prev, prev_ms).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Selection {
    /// The last frame decoded before the current one.
    Previous,
    Current,
    NoFrame,
    KeepDecoding,
}

/// Decide what to do with a decoded frame at `current_ms` while looking for
/// `target_ms`. `previous_ms` is the last frame seen before it.
///
/// `Closest` waits for the first frame at or past the target and then picks
/// whichever neighbour is nearer, the later one on a tie. `Exact` only accepts
/// a frame stamped with the target millisecond.
fn select_frame(
    policy: SeekPolicy,
    previous_ms: Option<u64>,
    current_ms: u64,
    target_ms: u64,
) -> Selection {
    match policy {
        SeekPolicy::Exact if current_ms == target_ms => Selection::Current,
        SeekPolicy::Exact if current_ms > target_ms => Selection::NoFrame,
        SeekPolicy::Closest if current_ms >= target_ms => match previous_ms {
            Some(prev) if prev.abs_diff(target_ms) < current_ms.abs_diff(target_ms) => {
                Selection::Previous
            }
            _ => Selection::Current,
        },
        _ => Selection::KeepDecoding,
    }
}

/// The stream ended before a frame reached the target.
fn select_at_end(policy: SeekPolicy, previous_ms: Option<u64>) -> Selection {
    match (policy, previous_ms) {
        (SeekPolicy::Closest, Some(_)) => Selection::Previous,
        _ => Selection::NoFrame,
    }
}

fn timestamp_ms(frame: &ffmpeg::frame::Video, time_base: ffmpeg::Rational) -> Option<u64> {
    let ts = frame.timestamp().or_else(|| frame.pts())?;
    if ts < 0 || time_base.denominator() == 0 {
        return None;
    }
    let ms = ts as i128 * time_base.numerator() as i128 * 1_000 / time_base.denominator() as i128;
    Some(ms as u64)
}

fn to_frame(
    scaler: &mut ffmpeg::software::scaling::Context,
    decoded: &ffmpeg::frame::Video,
    timestamp_ms: u64,
) -> Result<Frame> {
    let mut rgb_frame = ffmpeg::frame::Video::empty();
    scaler
        .run(decoded, &mut rgb_frame)
        .context("scale frame to RGB")?;

    let width = rgb_frame.width();
    let height = rgb_frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);

    let pixels = if stride == row_bytes {
        data.get(..row_bytes * height as usize)
            .context("ffmpeg frame is smaller than its dimensions")?
            .to_vec()
    } else {
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            pixels.extend_from_slice(
                data.get(start..start + row_bytes)
                    .context("ffmpeg frame row is out of bounds")?,
            );
        }
        pixels
    };

    Frame::new(pixels, width, height, PixelFormat::Rgb24, timestamp_ms)
}
