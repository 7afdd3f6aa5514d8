//! Cancellable periodic timer.
//!
//! `PeriodicTimer::start` runs a body on a dedicated thread: once immediately,
//! then again one period after each run completes. Runs never overlap. Whether
//! the timer is still running is a property of the returned `TimerHandle`;
//! `TimerHandle::cancel` withdraws the pending run, waits for an in-flight run
//! to finish, and guarantees no run starts afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

pub struct PeriodicTimer;

impl PeriodicTimer {
    pub fn start<F>(name: &str, period: Duration, mut body: F) -> Result<TimerHandle>
    where
        F: FnMut() + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let active_thread = active.clone();
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();

        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                if !active_thread.load(Ordering::SeqCst) {
                    break;
                }
                body();
                // A message or a dropped sender both mean cancel.
                match cancel_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .with_context(|| format!("failed to spawn timer thread '{}'", name))?;

        Ok(TimerHandle {
            active,
            cancel: Some(cancel_tx),
            join: Some(join),
        })
    }
}

/// Handle to a running `PeriodicTimer`.
///
/// Must not be cancelled from inside the timer body.
#[derive(Debug)]
pub struct TimerHandle {
    active: Arc<AtomicBool>,
    cancel: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// True until cancelled or until the timer thread exits.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
            && self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    /// Stop the timer. Returns once the timer thread has exited. Calling it
    /// again is a no-op.
    pub fn cancel(&mut self) -> Result<()> {
        self.active.store(false, Ordering::SeqCst);
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("timer thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Err(err) = self.cancel() {
            log::error!("timer shutdown: {}", err);
        }
    }
}
