//! Synthetic video source (`stub://`) for demos and tests.
//!
//! Renders a 10 second loop at 25 fps: a dark street with one bright block
//! sweeping left to right near the bottom of the frame.

use anyhow::Result;

use super::source::{PlaybackClock, SeekPolicy, VideoSource};
use crate::frame::{Frame, PixelFormat};

pub const SYNTHETIC_WIDTH: u32 = 320;
pub const SYNTHETIC_HEIGHT: u32 = 240;
pub const SYNTHETIC_DURATION_MS: u64 = 10_000;
pub const SYNTHETIC_FRAME_INTERVAL_MS: u64 = 40;

const BLOCK_WIDTH: u32 = 40;
const BLOCK_HEIGHT: u32 = 60;
/// Bottom edge of the block; below the floor line.
const BLOCK_BOTTOM: u32 = 230;

pub struct SyntheticSource {
    uri: String,
    clock: PlaybackClock,
    frames_rendered: u64,
}

impl SyntheticSource {
    pub fn new(uri: &str) -> Self {
        Self::with_clock(uri, PlaybackClock::start(SYNTHETIC_DURATION_MS))
    }

    pub fn with_clock(uri: &str, clock: PlaybackClock) -> Self {
        log::info!("synthetic source opened: {}", uri);
        Self {
            uri: uri.to_string(),
            clock,
            frames_rendered: 0,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    fn render(&mut self, timestamp_ms: u64) -> Result<Frame> {
        self.frames_rendered += 1;

        let travel = (SYNTHETIC_WIDTH - BLOCK_WIDTH) as u64;
        let block_x = (timestamp_ms * travel / SYNTHETIC_DURATION_MS) as u32;
        let block_y = BLOCK_BOTTOM - BLOCK_HEIGHT;

        let mut pixels =
            Vec::with_capacity((SYNTHETIC_WIDTH * SYNTHETIC_HEIGHT * 3) as usize);
        for y in 0..SYNTHETIC_HEIGHT {
            // Background gradient stays well below the detector's bright level.
            let shade = (20 + y / 4) as u8;
            for x in 0..SYNTHETIC_WIDTH {
                let lit = (block_x..block_x + BLOCK_WIDTH).contains(&x)
                    && (block_y..BLOCK_BOTTOM).contains(&y);
                if lit {
                    pixels.extend_from_slice(&[250, 250, 240]);
                } else {
                    pixels.extend_from_slice(&[shade, shade, shade + 10]);
                }
            }
        }

        Frame::new(
            pixels,
            SYNTHETIC_WIDTH,
            SYNTHETIC_HEIGHT,
            PixelFormat::Rgb24,
            timestamp_ms,
        )
    }
}

impl VideoSource for SyntheticSource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn duration_ms(&self) -> u64 {
        SYNTHETIC_DURATION_MS
    }

    fn position_ms(&self) -> u64 {
        self.clock.position_ms()
    }

    fn frame_at(&mut self, position_ms: u64, policy: SeekPolicy) -> Result<Option<Frame>> {
        if position_ms >= SYNTHETIC_DURATION_MS {
            return Ok(None);
        }
        let timestamp_ms = match policy {
            SeekPolicy::Exact if position_ms % SYNTHETIC_FRAME_INTERVAL_MS != 0 => {
                return Ok(None);
            }
            SeekPolicy::Exact => position_ms,
            SeekPolicy::Closest => {
                let last = SYNTHETIC_DURATION_MS - SYNTHETIC_FRAME_INTERVAL_MS;
                let half = SYNTHETIC_FRAME_INTERVAL_MS / 2;
                let snapped = (position_ms + half) / SYNTHETIC_FRAME_INTERVAL_MS
                    * SYNTHETIC_FRAME_INTERVAL_MS;
                snapped.min(last)
            }
        };
        self.render(timestamp_ms).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_snaps_to_frame_grid() -> Result<()> {
        let mut source = SyntheticSource::new("stub://test");
        let frame = source.frame_at(61, SeekPolicy::Closest)?.expect("frame");
        assert_eq!(frame.timestamp_ms(), 80);
        let frame = source.frame_at(59, SeekPolicy::Closest)?.expect("frame");
        assert_eq!(frame.timestamp_ms(), 40);
        let frame = source.frame_at(9_990, SeekPolicy::Closest)?.expect("frame");
        assert_eq!(frame.timestamp_ms(), 9_960);
        Ok(())
    }

    #[test]
    fn exact_requires_a_frame_boundary() -> Result<()> {
        let mut source = SyntheticSource::new("stub://test");
        assert!(source.frame_at(41, SeekPolicy::Exact)?.is_none());
        assert!(source.frame_at(120, SeekPolicy::Exact)?.is_some());
        Ok(())
    }

    #[test]
    fn positions_past_the_end_have_no_frame() -> Result<()> {
        let mut source = SyntheticSource::new("stub://test");
        assert!(source.frame_at(10_000, SeekPolicy::Closest)?.is_none());
        assert_eq!(source.frames_rendered(), 0);
        Ok(())
    }

    #[test]
    fn frames_are_rgb_at_source_resolution() -> Result<()> {
        let mut source = SyntheticSource::new("stub://test");
        let frame = source.frame_at(0, SeekPolicy::Closest)?.expect("frame");
        assert_eq!(frame.format(), PixelFormat::Rgb24);
        assert_eq!((frame.width(), frame.height()), (SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT));
        Ok(())
    }
}
