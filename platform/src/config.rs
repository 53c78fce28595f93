use crate::error::PlatformError;
use crate::frame::DEFAULT_MAX_BUFFERED_BYTES;
use crate::window::DEFAULT_WINDOW_WIDTH;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BAUD_RATE: u32 = 115200;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

/// Tuning for the decode pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seconds of error samples retained for plotting
    pub window_width: f64,
    /// Limit on an unterminated line before it is discarded
    pub max_buffered_bytes: usize,
    /// Seconds after which an IMU slot stops contributing to the difference
    pub stale_after: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            window_width: DEFAULT_WINDOW_WIDTH,
            max_buffered_bytes: DEFAULT_MAX_BUFFERED_BYTES,
            stale_after: None,
        }
    }
}

/// Serial link settings plus the pipeline they feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub pipeline: PipelineConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl LinkConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, PlatformError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PlatformError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
