//! Frame pipeline scheduler.
//!
//! Drives detection against a seekable video source at a fixed period while
//! processing is on. The tick runs on the timer thread; detector outcomes are
//! sent back over a channel and applied to the overlay by `pump_events` on the
//! thread that owns the scheduler, which is the only thread that touches the
//! sink.
//!
//! ```text
//!   Idle --load_source--> Ready --start/toggle--> Running
//!                           ^                        |
//!                           +------stop/toggle-------+
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::detect::{DetectionOutcome, DetectorBackend};
use crate::display::OverlaySink;
use crate::ingest::{self, SeekPolicy, VideoSource};
use crate::priority;
use crate::timer::{PeriodicTimer, TimerHandle};

/// Default tick period: 30 extractions per second.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1000 / 30);

const TIMER_THREAD_NAME: &str = "sightline-frames";

type SharedDetector = Arc<Mutex<Box<dyn DetectorBackend>>>;
type SourceOpener = Box<dyn Fn(&str) -> Result<Box<dyn VideoSource>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// No source loaded.
    Idle,
    /// Source loaded, not processing.
    Ready,
    /// Periodic extraction active.
    Running,
}

/// Tick counters, cumulative over the scheduler's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    /// Frames handed to the detector.
    pub submitted: u64,
    /// Ticks with no frame at the playback position.
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Default)]
struct TickCounters {
    ticks: AtomicU64,
    submitted: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl TickCounters {
    fn snapshot(&self) -> TickStats {
        TickStats {
            ticks: self.ticks.load(Ordering::SeqCst),
            submitted: self.submitted.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

pub struct Scheduler<O: OverlaySink> {
    detector: SharedDetector,
    overlay: O,
    opener: SourceOpener,
    period: Duration,
    source_uri: Option<String>,
    timer: Option<TimerHandle>,
    events: Option<Receiver<DetectionOutcome>>,
    counters: Arc<TickCounters>,
    detector_closed: bool,
}

impl<O: OverlaySink> Scheduler<O> {
    /// Take ownership of the detector and the overlay. The detector is warmed
    /// up here and closed by `shutdown` (or on drop).
    pub fn new(mut detector: Box<dyn DetectorBackend>, overlay: O) -> Result<Self> {
        detector
            .warm_up()
            .with_context(|| format!("detector '{}' warm-up failed", detector.name()))?;
        Ok(Self {
            detector: Arc::new(Mutex::new(detector)),
            overlay,
            opener: Box::new(ingest::open),
            period: DEFAULT_TICK_PERIOD,
            source_uri: None,
            timer: None,
            events: None,
            counters: Arc::new(TickCounters::default()),
            detector_closed: false,
        })
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Replace how source URIs are opened.
    pub fn with_opener<F>(mut self, opener: F) -> Self
    where
        F: Fn(&str) -> Result<Box<dyn VideoSource>> + 'static,
    {
        self.opener = Box::new(opener);
        self
    }

    pub fn state(&self) -> SchedulerState {
        if self.source_uri.is_none() {
            SchedulerState::Idle
        } else if self.timer.as_ref().is_some_and(TimerHandle::is_active) {
            SchedulerState::Running
        } else {
            SchedulerState::Ready
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn source_uri(&self) -> Option<&str> {
        self.source_uri.as_deref()
    }

    pub fn stats(&self) -> TickStats {
        self.counters.snapshot()
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut O {
        &mut self.overlay
    }

    /// Select the source to process. Stops processing of the previous one.
    pub fn load_source(&mut self, uri: &str) -> Result<SchedulerState> {
        if uri.trim().is_empty() {
            return Err(anyhow!("video source uri is empty"));
        }
        if self.state() == SchedulerState::Running {
            self.stop();
        }
        self.source_uri = Some(uri.to_string());
        log::info!("source loaded: {}", uri);
        Ok(self.state())
    }

    /// Flip Ready and Running. Does nothing while Idle.
    pub fn toggle(&mut self) -> Result<SchedulerState> {
        match self.state() {
            SchedulerState::Running => Ok(self.stop()),
            _ => self.start(),
        }
    }

    /// Open the source and begin periodic extraction.
    ///
    /// A source that fails to open is logged and leaves the scheduler stopped
    /// in `Ready`; only a failure to spawn the timer thread is an error.
    pub fn start(&mut self) -> Result<SchedulerState> {
        let uri = match (self.state(), self.source_uri.clone()) {
            (SchedulerState::Running, _) => return Ok(SchedulerState::Running),
            (_, None) => {
                log::warn!("no video source loaded; ignoring start");
                return Ok(SchedulerState::Idle);
            }
            (_, Some(uri)) => uri,
        };
        let source = match (self.opener)(&uri) {
            Ok(source) => source,
            Err(err) => {
                log::error!("failed to open video source {}: {:#}", uri, err);
                return Ok(self.stop());
            }
        };

        let (tx, rx) = mpsc::channel();
        self.events = Some(rx);
        let mut tick = Tick {
            source,
            detector: self.detector.clone(),
            events: tx,
            counters: self.counters.clone(),
        };
        let timer = PeriodicTimer::start(TIMER_THREAD_NAME, self.period, move || tick.run())?;
        self.timer = Some(timer);
        log::info!(
            "processing started: {} every {}ms",
            uri,
            self.period.as_millis()
        );
        Ok(self.state())
    }

    /// Cancel the pending tick, wait out an in-flight one, discard undelivered
    /// outcomes and clear the overlay.
    pub fn stop(&mut self) -> SchedulerState {
        let was_running = self.timer.is_some();
        if let Some(mut timer) = self.timer.take() {
            if let Err(err) = timer.cancel() {
                log::error!("frame timer: {:#}", err);
            }
        }
        self.events = None;
        self.overlay.clear();
        if was_running {
            log::info!("processing stopped");
        }
        self.state()
    }

    /// Apply every outcome delivered so far to the overlay. Returns how many
    /// were applied.
    pub fn pump_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(Ok(outcome)) = self.events.as_ref().map(Receiver::try_recv) {
            self.apply(outcome);
            applied += 1;
        }
        applied
    }

    /// Like `pump_events`, but waits up to `timeout` for the first outcome.
    pub fn pump_events_timeout(&mut self, timeout: Duration) -> usize {
        let first = match self.events.as_ref() {
            Some(events) => events.recv_timeout(timeout),
            None => {
                std::thread::sleep(timeout);
                return 0;
            }
        };
        match first {
            Ok(outcome) => {
                self.apply(outcome);
                1 + self.pump_events()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn apply(&mut self, outcome: DetectionOutcome) {
        match outcome {
            DetectionOutcome::NoDetections => self.overlay.clear(),
            DetectionOutcome::Detections {
                detections,
                inference_ms,
            } => {
                log::debug!(
                    "inference {}ms, {} raw detections",
                    inference_ms,
                    detections.len()
                );
                let ranked = priority::filter_and_prioritize(detections);
                let alert = ranked.first().map(priority::alert_text);
                self.overlay.set_results(ranked);
                self.overlay.show_inference_time(inference_ms);
                if let Some(alert) = alert {
                    self.overlay.show_alert(&alert);
                }
            }
        }
    }

    /// Stop processing and close the detector.
    pub fn shutdown(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        self.stop();
        if self.detector_closed {
            return Ok(());
        }
        self.detector_closed = true;
        // A panic inside a tick poisons the lock; the detector still gets closed.
        let mut detector = self.detector.lock().unwrap_or_else(PoisonError::into_inner);
        detector
            .close()
            .with_context(|| format!("failed to close detector '{}'", detector.name()))
    }
}

impl<O: OverlaySink> Drop for Scheduler<O> {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            log::error!("scheduler teardown: {:#}", err);
        }
    }
}

// ----------------------------------------------------------------------------
// Tick body (runs on the timer thread)
// ----------------------------------------------------------------------------

struct Tick {
    source: Box<dyn VideoSource>,
    detector: SharedDetector,
    events: Sender<DetectionOutcome>,
    counters: Arc<TickCounters>,
}

impl Tick {
    fn run(&mut self) {
        self.counters.ticks.fetch_add(1, Ordering::SeqCst);
        // A panicking source or detector costs one tick, not the schedule.
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.process()))
            .unwrap_or_else(|payload| {
                Err(anyhow!("tick panicked: {}", panic_message(&*payload)))
            });
        match result {
            Ok(true) => {
                self.counters.submitted.fetch_add(1, Ordering::SeqCst);
            }
            Ok(false) => {
                self.counters.skipped.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                log::warn!("frame tick failed: {:#}", err);
            }
        }
    }

    /// One extraction. Returns false when there was no frame to submit.
    fn process(&mut self) -> Result<bool> {
        let position_ms = self.source.position_ms();
        let frame = self
            .source
            .frame_at(position_ms, SeekPolicy::Closest)
            .with_context(|| format!("frame at {}ms from {}", position_ms, self.source.uri()))?;
        let Some(frame) = frame else {
            log::debug!("no frame at {}ms; skipping tick", position_ms);
            return Ok(false);
        };

        let mut detector = self.detector.lock().unwrap_or_else(PoisonError::into_inner);
        let frame = frame
            .into_format(detector.input_format())?
            .scaled(detector.input_width(), detector.input_height())?;
        let outcome = detector.detect(frame)?;
        drop(detector);

        // The receiver is gone only once processing has stopped.
        let _ = self.events.send(outcome);
        Ok(true)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, StubBackend};
    use crate::display::RecordingOverlay;

    #[test]
    fn default_period_is_33ms() {
        assert_eq!(DEFAULT_TICK_PERIOD, Duration::from_millis(33));
    }

    #[test]
    fn idle_until_source_loaded() -> Result<()> {
        let overlay = RecordingOverlay::new();
        let mut scheduler = Scheduler::new(Box::new(StubBackend::new(8, 8)), overlay)?;
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.toggle()?, SchedulerState::Idle);
        assert!(scheduler.load_source("  ").is_err());
        assert_eq!(scheduler.load_source("stub://street")?, SchedulerState::Ready);
        Ok(())
    }

    #[test]
    fn outcomes_are_ranked_before_reaching_the_overlay() -> Result<()> {
        let overlay = RecordingOverlay::new();
        let mut scheduler = Scheduler::new(Box::new(StubBackend::new(8, 8)), overlay.clone())?;
        scheduler.apply(DetectionOutcome::Detections {
            detections: vec![
                Detection::new("dog", 0.8, [0.0, 0.3, 0.2, 0.5]),
                Detection::new("cat", 0.9, [0.85, 0.1, 0.9, 0.15]),
                Detection::new("car", 0.7, [0.375, 0.5, 0.625, 0.9]),
            ],
            inference_ms: 12,
        });

        let state = overlay.snapshot();
        let classes: Vec<&str> = state.results.iter().map(|d| d.class_name.as_str()).collect();
        assert_eq!(classes, vec!["car", "dog"]);
        assert_eq!(state.alerts, vec!["car ahead on the floor"]);
        assert_eq!(state.last_inference_ms, Some(12));

        scheduler.apply(DetectionOutcome::NoDetections);
        assert!(overlay.snapshot().is_empty());
        Ok(())
    }

    #[test]
    fn everything_filtered_still_updates_the_overlay() -> Result<()> {
        let overlay = RecordingOverlay::new();
        let mut scheduler = Scheduler::new(Box::new(StubBackend::new(8, 8)), overlay.clone())?;
        scheduler.apply(DetectionOutcome::Detections {
            detections: vec![Detection::new("person", 0.9, [0.4, 0.4, 0.5, 0.5])],
            inference_ms: 3,
        });
        let state = overlay.snapshot();
        assert_eq!(state.updates, 1);
        assert!(state.results.is_empty());
        assert!(state.alerts.is_empty());
        Ok(())
    }
}
