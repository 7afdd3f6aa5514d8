//! Sightline: obstacle alerts from a video feed.
//!
//! This crate samples a video source at a fixed rate, hands each frame to an
//! object detector, and turns the detector's raw output into a ranked list of
//! obstacles plus one short spoken-style alert for the most urgent of them.
//!
//! # Architecture
//!
//! - **Prioritization engine** (`priority`): pure functions. Filters
//!   detections by a per-class area threshold, classifies each into a zone
//!   (floor, center, left, right), scores and ranks them, and renders the
//!   alert text for the top one.
//! - **Frame pipeline scheduler** (`scheduler`): a cancellable periodic tick
//!   that reads the playback position, fetches the closest frame, converts and
//!   scales it for the detector, and submits it. Results are marshalled back
//!   to the thread that owns the overlay.
//!
//! # Module Structure
//!
//! - `detect`: detection data model, detector backends
//! - `frame`: transient frame buffers with owning conversions
//! - `ingest`: seekable video sources (synthetic, local files)
//! - `display`: overlay sinks
//! - `timer`: periodic timer with explicit cancellation
//! - `config`: runtime configuration

pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod priority;
pub mod scheduler;
pub mod timer;

pub use config::{BackendKind, DetectorSettings, SightlineConfig};
pub use detect::{Detection, DetectionOutcome, DetectorBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use display::{ConsoleOverlay, OverlaySink, RecordingOverlay, ReferenceGrid};
pub use frame::{Frame, PixelFormat};
pub use ingest::{SeekPolicy, VideoSource};
pub use priority::{alert_text, filter_and_prioritize, priority_score, top_alert, Zone};
pub use scheduler::{Scheduler, SchedulerState, TickStats};
pub use timer::{PeriodicTimer, TimerHandle};

/// Build the detector backend named by `settings`.
pub fn build_backend(settings: &DetectorSettings) -> anyhow::Result<Box<dyn DetectorBackend>> {
    match settings.backend {
        BackendKind::Stub => {
            let mut backend = StubBackend::new(settings.input_width, settings.input_height);
            if let Some(class_name) = &settings.stub_class {
                backend = backend.with_class(class_name.clone());
            }
            Ok(Box::new(backend))
        }
        BackendKind::Tract => build_tract(settings),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(settings: &DetectorSettings) -> anyhow::Result<Box<dyn DetectorBackend>> {
    use anyhow::anyhow;

    let model = settings
        .model_path
        .as_deref()
        .ok_or_else(|| anyhow!("tract backend requires a model path"))?;
    let labels = settings
        .labels_path
        .as_deref()
        .ok_or_else(|| anyhow!("tract backend requires a labels path"))?;
    let backend = TractBackend::new(model, labels, settings.input_width, settings.input_height)?
        .with_thresholds(settings.confidence_threshold, settings.iou_threshold);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(_settings: &DetectorSettings) -> anyhow::Result<Box<dyn DetectorBackend>> {
    Err(anyhow::anyhow!(
        "tract backend requires the backend-tract feature"
    ))
}
