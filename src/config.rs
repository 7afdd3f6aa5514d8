use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SOURCE: &str = "stub://street";
const DEFAULT_TARGET_FPS: u32 = 30;
const MAX_TARGET_FPS: u32 = 120;
const DEFAULT_INPUT_WIDTH: u32 = 640;
const DEFAULT_INPUT_HEIGHT: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;
const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

#[derive(Debug, Deserialize, Default)]
struct SightlineConfigFile {
    source: Option<String>,
    target_fps: Option<u32>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    stub_class: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Stub,
    Tract,
}

impl BackendKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(Self::Stub),
            "tract" => Ok(Self::Tract),
            other => Err(anyhow!(
                "unknown detector backend '{}' (expected stub or tract)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SightlineConfig {
    pub source: String,
    pub target_fps: u32,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: BackendKind,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub stub_class: Option<String>,
}

impl SightlineConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SIGHTLINE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Period between frame extractions (integer milliseconds).
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.target_fps.max(1)))
    }

    fn from_file(file: SightlineConfigFile) -> Result<Self> {
        let detector_file = file.detector.unwrap_or_default();
        let backend = match detector_file.backend.as_deref() {
            Some(value) => BackendKind::parse(value)?,
            None => BackendKind::Stub,
        };
        let detector = DetectorSettings {
            backend,
            model_path: detector_file.model_path,
            labels_path: detector_file.labels_path,
            input_width: detector_file.input_width.unwrap_or(DEFAULT_INPUT_WIDTH),
            input_height: detector_file.input_height.unwrap_or(DEFAULT_INPUT_HEIGHT),
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: detector_file
                .iou_threshold
                .unwrap_or(DEFAULT_IOU_THRESHOLD),
            stub_class: detector_file.stub_class,
        };
        Ok(Self {
            source: file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            target_fps: file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            detector,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("SIGHTLINE_SOURCE") {
            if !source.trim().is_empty() {
                self.source = source;
            }
        }
        if let Ok(fps) = std::env::var("SIGHTLINE_TARGET_FPS") {
            self.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("SIGHTLINE_TARGET_FPS must be an integer"))?;
        }
        if let Ok(backend) = std::env::var("SIGHTLINE_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = BackendKind::parse(&backend)?;
            }
        }
        if let Ok(path) = std::env::var("SIGHTLINE_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("SIGHTLINE_LABELS_PATH") {
            if !path.trim().is_empty() {
                self.detector.labels_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.source = self.source.trim().to_string();
        if self.source.is_empty() {
            return Err(anyhow!("source must not be empty"));
        }
        if self.target_fps == 0 || self.target_fps > MAX_TARGET_FPS {
            return Err(anyhow!(
                "target_fps must be between 1 and {}",
                MAX_TARGET_FPS
            ));
        }
        let detector = &self.detector;
        if detector.input_width == 0 || detector.input_height == 0 {
            return Err(anyhow!("detector input dimensions must be non-zero"));
        }
        for (name, value) in [
            ("confidence_threshold", detector.confidence_threshold),
            ("iou_threshold", detector.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1]", name));
            }
        }
        if detector.backend == BackendKind::Tract
            && (detector.model_path.is_none() || detector.labels_path.is_none())
        {
            return Err(anyhow!(
                "tract backend requires detector.model_path and detector.labels_path"
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SightlineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: SightlineConfigFile = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
