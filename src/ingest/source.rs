use std::time::Instant;

use anyhow::Result;

use crate::frame::Frame;

/// Which frame `frame_at` may return for a timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekPolicy {
    /// The decodable frame nearest to the timestamp.
    Closest,
    /// Only a frame whose timestamp equals the requested one.
    Exact,
}

/// A seekable video source with a playback position.
pub trait VideoSource: Send {
    fn uri(&self) -> &str;

    fn duration_ms(&self) -> u64;

    /// Current playback position.
    fn position_ms(&self) -> u64;

    /// Decode the frame at `position_ms`. `Ok(None)` means no frame is
    /// available there under `policy`.
    fn frame_at(&mut self, position_ms: u64, policy: SeekPolicy) -> Result<Option<Frame>>;
}

/// Wall-clock playback position that loops over the source duration.
///
/// The position never decreases except when playback wraps to the start.
#[derive(Clone, Copy, Debug)]
pub struct PlaybackClock {
    started: Instant,
    duration_ms: u64,
}

impl PlaybackClock {
    /// Start playing now.
    pub fn start(duration_ms: u64) -> Self {
        Self::started_at(Instant::now(), duration_ms)
    }

    pub fn started_at(started: Instant, duration_ms: u64) -> Self {
        Self {
            started,
            duration_ms,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn position_ms(&self) -> u64 {
        self.position_at(Instant::now())
    }

    pub fn position_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.started).as_millis() as u64;
        if self.duration_ms == 0 {
            0
        } else {
            elapsed % self.duration_ms
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clock_loops_over_duration() {
        let start = Instant::now();
        let clock = PlaybackClock::started_at(start, 1_000);
        assert_eq!(clock.position_at(start), 0);
        assert_eq!(clock.position_at(start + Duration::from_millis(250)), 250);
        assert_eq!(clock.position_at(start + Duration::from_millis(1_250)), 250);
    }

    #[test]
    fn clock_before_start_reads_zero() {
        let start = Instant::now() + Duration::from_secs(5);
        let clock = PlaybackClock::started_at(start, 1_000);
        assert_eq!(clock.position_at(Instant::now()), 0);
    }

    #[test]
    fn empty_source_stays_at_zero() {
        let start = Instant::now();
        let clock = PlaybackClock::started_at(start, 0);
        assert_eq!(clock.position_at(start + Duration::from_secs(3)), 0);
    }
}
