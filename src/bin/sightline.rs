//! sightline - obstacle alerts from a video source
//!
//! This binary:
//! 1. Loads configuration (file, environment, command line)
//! 2. Builds the configured detector backend
//! 3. Samples the video source at the target rate and runs detection
//! 4. Logs the most urgent obstacle as an alert until Ctrl-C or timeout

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use sightline::{build_backend, ConsoleOverlay, Scheduler, SchedulerState, SightlineConfig};

const PUMP_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video source URI (stub://<name> or a local file path).
    #[arg(long)]
    source: Option<String>,
    /// Seconds to run; 0 runs until Ctrl-C.
    #[arg(long, default_value_t = 0)]
    seconds: u64,
    /// Config file (.toml or .json). Defaults to $SIGHTLINE_CONFIG.
    #[arg(long, env = "SIGHTLINE_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SightlineConfig::load_from(path)?,
        None => SightlineConfig::load()?,
    };
    if let Some(source) = args.source {
        config.source = source;
    }

    let backend = build_backend(&config.detector).context("failed to build detector")?;
    log::info!(
        "detector '{}' input {}x{}",
        backend.name(),
        backend.input_width(),
        backend.input_height()
    );
    let mut scheduler =
        Scheduler::new(backend, ConsoleOverlay::new())?.with_period(config.tick_period());

    scheduler.load_source(&config.source)?;
    if scheduler.start()? != SchedulerState::Running {
        scheduler.shutdown()?;
        return Err(anyhow!("could not start processing {}", config.source));
    }

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    let deadline = (args.seconds > 0).then(|| Instant::now() + Duration::from_secs(args.seconds));
    log::info!("sightline running; Ctrl-C to stop");
    loop {
        scheduler.pump_events_timeout(PUMP_INTERVAL);
        if rx.try_recv().is_ok() {
            log::info!("shutdown signal received");
            break;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
    }

    let stats = scheduler.stats();
    log::info!(
        "ticks={} submitted={} skipped={} failed={}",
        stats.ticks,
        stats.submitted,
        stats.skipped,
        stats.failed
    );
    scheduler.shutdown()
}
