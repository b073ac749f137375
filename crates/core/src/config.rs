//! Runtime configuration: thresholds and pipeline knobs, loaded from JSON.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "liveness": { "blink_ear_threshold": 0.25 }, "pipeline": { "parallel_inference": true } }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::infrastructure::onnx_blazeface_detector::DEFAULT_CONFIDENCE;
use crate::liveness::domain::blink_liveness::LivenessConfig;
use crate::recognition::infrastructure::embedding_face_recognizer::DEFAULT_THRESHOLD;
use crate::shared::constants::APP_DIR_NAME;
use crate::tracking::domain::face_slot_tracker::TrackerConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Pixels added on each side of a detection box before cropping.
    pub crop_padding_px: u32,
    /// Consecutive failed reads tolerated before the run is aborted.
    pub capture_retries: u32,
    /// Run detection and mesh concurrently within a frame.
    pub parallel_inference: bool,
    pub max_faces: usize,
    pub min_detection_confidence: f64,
    /// Minimum cosine similarity for an embedding match.
    pub recognition_threshold: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            crop_padding_px: 20,
            capture_retries: 30,
            parallel_inference: false,
            max_faces: 3,
            min_detection_confidence: DEFAULT_CONFIDENCE,
            recognition_threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub liveness: LivenessConfig,
    pub tracker: TrackerConfig,
    pub pipeline: PipelineSettings,
}

impl GateConfig {
    /// `<config_dir>/BlinkGate/config.json`, when the platform has a
    /// config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `explicit` when given (it must exist), otherwise the default
    /// path if a file is there, otherwise built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                log::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.liveness;
        if !(l.blink_ear_threshold > 0.0 && l.blink_ear_threshold <= 1.0) {
            return invalid(format!(
                "blink_ear_threshold must be in (0, 1], got {}",
                l.blink_ear_threshold
            ));
        }
        if l.blink_min_frames == 0 {
            return invalid("blink_min_frames must be at least 1".into());
        }
        if !(l.liveness_timeout_seconds > 0.0 && l.liveness_timeout_seconds.is_finite()) {
            return invalid(format!(
                "liveness_timeout_seconds must be positive, got {}",
                l.liveness_timeout_seconds
            ));
        }

        let t = &self.tracker;
        for (name, value) in [
            ("match_iou_threshold", t.match_iou_threshold),
            ("detection_iou_threshold", t.detection_iou_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return invalid(format!("{name} must be in (0, 1], got {value}"));
            }
        }

        let p = &self.pipeline;
        if p.capture_retries == 0 {
            return invalid("capture_retries must be at least 1".into());
        }
        if p.max_faces == 0 {
            return invalid("max_faces must be at least 1".into());
        }
        if !(p.min_detection_confidence > 0.0 && p.min_detection_confidence <= 1.0) {
            return invalid(format!(
                "min_detection_confidence must be in (0, 1], got {}",
                p.min_detection_confidence
            ));
        }
        if !(-1.0..=1.0).contains(&p.recognition_threshold) {
            return invalid(format!(
                "recognition_threshold must be in [-1, 1], got {}",
                p.recognition_threshold
            ));
        }
        Ok(())
    }
}

fn invalid(message: String) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(message))
}
