use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::OverlaySink;
use crate::detect::Detection;

/// Everything a `RecordingOverlay` has been asked to show.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayState {
    /// Results currently on screen.
    pub results: Vec<Detection>,
    /// Every alert shown, oldest first.
    pub alerts: Vec<String>,
    pub last_inference_ms: Option<u64>,
    pub updates: usize,
    pub clears: usize,
}

impl OverlayState {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// In-memory sink. Clones share state, so a test can keep one handle and
/// give the other to the scheduler.
#[derive(Clone, Debug, Default)]
pub struct RecordingOverlay {
    state: Arc<Mutex<OverlayState>>,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> OverlayState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, OverlayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OverlaySink for RecordingOverlay {
    fn set_results(&mut self, results: Vec<Detection>) {
        let mut state = self.lock();
        state.results = results;
        state.updates += 1;
    }

    fn clear(&mut self) {
        let mut state = self.lock();
        state.results.clear();
        state.clears += 1;
    }

    fn show_alert(&mut self, alert: &str) {
        self.lock().alerts.push(alert.to_string());
    }

    fn show_inference_time(&mut self, inference_ms: u64) {
        self.lock().last_inference_ms = Some(inference_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let overlay = RecordingOverlay::new();
        let mut handle = overlay.clone();
        handle.set_results(vec![Detection::new("car", 0.8, [0.1, 0.1, 0.5, 0.5])]);
        handle.show_alert("car ahead");
        assert_eq!(overlay.snapshot().results.len(), 1);
        assert_eq!(overlay.snapshot().alerts, vec!["car ahead"]);

        handle.clear();
        let state = overlay.snapshot();
        assert!(state.is_empty());
        assert_eq!((state.updates, state.clears), (1, 1));
    }
}
