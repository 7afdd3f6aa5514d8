//! rank_detections - offline alert evaluation
//!
//! Reads a JSON file holding an array of frames, each an array of detections
//! (`class_name`, `confidence`, `x1`, `y1`, `x2`, `y2` in normalized
//! coordinates), and prints what the prioritization engine makes of each frame.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

use sightline::priority::{self, Ranked};
use sightline::Detection;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input JSON file.
    input: PathBuf,
    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct FrameReport {
    frame: usize,
    ranked: Vec<Ranked>,
    alert: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let frames: Vec<Vec<Detection>> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid detections file {}", args.input.display()))?;

    let reports: Vec<FrameReport> = frames
        .into_iter()
        .enumerate()
        .map(|(frame, detections)| {
            let ranked = priority::rank(detections);
            let alert = ranked.first().map(|top| priority::alert_text(&top.detection));
            FrameReport {
                frame,
                ranked,
                alert,
            }
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        println!("frame {}:", report.frame);
        for (i, entry) in report.ranked.iter().enumerate() {
            let d = &entry.detection;
            println!(
                "  {}. {:<14} score={:.3} zone={:<6} area={:.4} conf={:.2}",
                i + 1,
                d.class_name,
                entry.score,
                entry.zone,
                d.area(),
                d.confidence
            );
        }
        match &report.alert {
            Some(alert) => println!("  alert: {}", alert),
            None => println!("  alert: (none)"),
        }
    }
    Ok(())
}
