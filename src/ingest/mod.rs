//! Video sources.
//!
//! This module provides seekable sources that the scheduler samples at its own
//! cadence:
//! - Synthetic source (`stub://...`), always available
//! - Local video files (feature: ingest-file-ffmpeg)
//!
//! Every source reports a playback position and decodes the frame at a
//! timestamp on request. Sources MUST NOT:
//! - Fetch remote URLs
//! - Keep decoded frames after handing them out

#[cfg(feature = "ingest-file-ffmpeg")]
mod file_ffmpeg;
mod source;
pub mod synthetic;

use anyhow::{anyhow, Result};

pub use source::{PlaybackClock, SeekPolicy, VideoSource};
pub use synthetic::SyntheticSource;

/// Open the source named by `uri`.
///
/// `stub://<name>` opens the synthetic source. Anything else must be a local
/// path (optionally `file://`) and needs the ingest-file-ffmpeg feature.
pub fn open(uri: &str) -> Result<Box<dyn VideoSource>> {
    if uri.trim().is_empty() {
        return Err(anyhow!("video source uri is empty"));
    }
    if uri.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(uri)));
    }
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    if path.contains("://") {
        return Err(anyhow!(
            "video sources must be local paths (no URL schemes): {}",
            uri
        ));
    }
    open_file(path)
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_file(path: &str) -> Result<Box<dyn VideoSource>> {
    Ok(Box::new(file_ffmpeg::FfmpegFileSource::open(path)?))
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_file(path: &str) -> Result<Box<dyn VideoSource>> {
    Err(anyhow!(
        "file sources require the ingest-file-ffmpeg feature ({})",
        path
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_uri_opens_synthetic_source() -> Result<()> {
        let source = open("stub://street")?;
        assert_eq!(source.uri(), "stub://street");
        assert_eq!(source.duration_ms(), synthetic::SYNTHETIC_DURATION_MS);
        Ok(())
    }

    #[test]
    fn remote_and_empty_uris_are_rejected() {
        assert!(open("").is_err());
        assert!(open("rtsp://camera/stream").is_err());
        assert!(open("http://example.com/clip.mp4").is_err());
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    #[test]
    fn local_files_need_ffmpeg_feature() {
        assert!(open("/tmp/clip.mp4").is_err());
    }
}
