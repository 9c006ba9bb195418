//! Application Configuration
//!
//! User settings and engine tuning stored in TOML format. Out-of-range
//! values are programmer/configuration errors and are rejected at startup;
//! nothing here is validated per-frame.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::capture::CaptureRegion;
use crate::vision::OcrBackend;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture settings
    pub capture: CaptureSettings,
    /// Block engine tuning
    pub engine: EngineConfig,
    /// Translation context history bounds
    pub context: ContextSettings,
    /// OCR provider settings
    pub vision: VisionSettings,
    /// Translation provider settings
    pub translation: TranslationSettings,
}

/// Capture-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Screen regions to track; each owns an independent engine instance
    pub regions: Vec<CaptureRegion>,
    /// Milliseconds between capture cycles
    pub interval_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            regions: vec![CaptureRegion::default()],
            interval_ms: 300,
        }
    }
}

/// Block engine tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Height/width ratio above which a box classifies vertical
    pub vertical_aspect_threshold: f32,
    /// Grouping aggressiveness (0.0 - 1.0); scales the clustering gap
    pub grouping_power: f32,
    /// Base clustering gap in units of the frame's median glyph extent
    pub base_distance: f32,
    /// Minimum orthogonal-axis overlap fraction for two detections to
    /// count as the same line or column
    pub alignment_overlap: f32,
    /// Degrees of polygon tilt beyond which a detection is excluded from
    /// axis-aligned adjacency
    pub rotation_tolerance_deg: f32,
    /// Intersection percentage of the smaller block above which the
    /// smaller of an overlapping pair is discarded
    pub overlap_allowed_percent: f32,
    /// Minimum block width in pixels
    pub min_block_width: f32,
    /// Minimum block height in pixels
    pub min_block_height: f32,
    /// Consecutive unchanged frames before a block settles
    pub settle_frames: u32,
    /// Minimum IoU to match a block against the previous frame
    pub match_iou_threshold: f32,
    /// Maximum center drift in pixels still counted as unmoved
    pub center_epsilon: f32,
    /// Missed frames tolerated before an identity goes stale
    pub miss_grace_frames: u32,
    /// Normalized similarity at or above which text counts as unchanged
    /// (1.0 = exact equality)
    pub text_similarity_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vertical_aspect_threshold: 1.5,
            grouping_power: 0.45,
            base_distance: 0.8,
            alignment_overlap: 0.5,
            rotation_tolerance_deg: 12.0,
            overlap_allowed_percent: 50.0,
            min_block_width: 12.0,
            min_block_height: 12.0,
            settle_frames: 3,
            match_iou_threshold: 0.5,
            center_epsilon: 4.0,
            miss_grace_frames: 2,
            text_similarity_threshold: 1.0,
        }
    }
}

/// Translation context history bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Minimum source text length (chars) for a block to enter the
    /// context history; filters out button labels and similar UI bits
    pub min_chars: usize,
    /// Total character budget of the rendered context string
    pub max_chars: usize,
    /// Maximum number of history entries
    pub max_entries: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            min_chars: 8,
            max_chars: 600,
            max_entries: 12,
        }
    }
}

/// OCR provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// OCR backend to use
    pub backend: OcrBackend,
    /// Detection service endpoint for the HTTP backend
    pub endpoint: String,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            backend: OcrBackend::HttpService,
            endpoint: "http://127.0.0.1:8760/ocr".to_string(),
        }
    }
}

/// Translation provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    /// OpenAI-compatible chat completions endpoint
    pub endpoint: String,
    /// Model name sent with each request
    pub model: String,
    /// Environment variable holding the API key, if the endpoint needs one
    pub api_key_env: Option<String>,
    /// Target language code (e.g. "en")
    pub target_language: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434/v1/chat/completions".to_string(),
            model: "qwen2.5:7b".to_string(),
            api_key_env: None,
            target_language: "en".to_string(),
        }
    }
}

/// Invalid configuration bounds; fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: u64,
        value: u64,
    },
    #[error("at least one capture region must be configured")]
    NoRegions,
}

impl AppConfig {
    /// Validate configuration bounds. Violations are programmer errors and
    /// abort startup; the per-frame pipeline never re-checks them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = |field, min: f64, max: f64, value: f64| {
            if value < min || value > max || !value.is_finite() {
                Err(ConfigError::OutOfRange {
                    field,
                    min,
                    max,
                    value,
                })
            } else {
                Ok(())
            }
        };
        let positive = |field, value: f64| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::NotPositive { field, value })
            }
        };

        let e = &self.engine;
        range("engine.grouping_power", 0.0, 1.0, e.grouping_power as f64)?;
        range(
            "engine.overlap_allowed_percent",
            0.0,
            100.0,
            e.overlap_allowed_percent as f64,
        )?;
        positive("engine.alignment_overlap", e.alignment_overlap as f64)?;
        range(
            "engine.alignment_overlap",
            0.0,
            1.0,
            e.alignment_overlap as f64,
        )?;
        positive(
            "engine.vertical_aspect_threshold",
            e.vertical_aspect_threshold as f64,
        )?;
        positive("engine.base_distance", e.base_distance as f64)?;
        range(
            "engine.rotation_tolerance_deg",
            0.0,
            45.0,
            e.rotation_tolerance_deg as f64,
        )?;
        positive("engine.match_iou_threshold", e.match_iou_threshold as f64)?;
        range(
            "engine.match_iou_threshold",
            0.0,
            1.0,
            e.match_iou_threshold as f64,
        )?;
        positive(
            "engine.text_similarity_threshold",
            e.text_similarity_threshold,
        )?;
        range(
            "engine.text_similarity_threshold",
            0.0,
            1.0,
            e.text_similarity_threshold,
        )?;
        range("engine.center_epsilon", 0.0, 1e6, e.center_epsilon as f64)?;
        range("engine.min_block_width", 0.0, 1e6, e.min_block_width as f64)?;
        range(
            "engine.min_block_height",
            0.0,
            1e6,
            e.min_block_height as f64,
        )?;

        if e.settle_frames < 1 {
            return Err(ConfigError::TooSmall {
                field: "engine.settle_frames",
                min: 1,
                value: e.settle_frames as u64,
            });
        }
        if self.capture.interval_ms < 1 {
            return Err(ConfigError::TooSmall {
                field: "capture.interval_ms",
                min: 1,
                value: self.capture.interval_ms,
            });
        }
        if self.capture.regions.is_empty() {
            return Err(ConfigError::NoRegions);
        }
        if self.context.max_chars < 1 {
            return Err(ConfigError::TooSmall {
                field: "context.max_chars",
                min: 1,
                value: self.context.max_chars as u64,
            });
        }
        if self.context.max_entries < 1 {
            return Err(ConfigError::TooSmall {
                field: "context.max_entries",
                min: 1,
                value: self.context.max_entries as u64,
            });
        }

        Ok(())
    }
}

/// Default configuration file location
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "lenslate")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
