// SPDX-License-Identifier: GPL-3.0-only

//! Startup settings
//!
//! Read from JSON in `<config dir>/depth-clipper/config.json`; the crate
//! never writes the file. A missing file yields the defaults and a malformed
//! one is an error. Threshold changes made while running stay in memory.

use crate::backends::camera::{CaptureMode, ConfidenceLevel, ViewportSize};
use crate::constants::thresholds::{DEFAULT_CONFIDENCE, DEFAULT_FAR, DEFAULT_NEAR};
use crate::constants::DEFAULT_VIEWPORT;
use crate::errors::ConfigError;
use crate::render::ThresholdState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "depth-clipper";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sensor the compositor is configured for
    pub capture_mode: CaptureMode,
    pub confidence_threshold: ConfidenceLevel,
    pub near_depth_threshold: f32,
    pub far_depth_threshold: f32,
    /// Viewport used for headless rendering
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture_mode: CaptureMode::default(),
            confidence_threshold: DEFAULT_CONFIDENCE,
            near_depth_threshold: DEFAULT_NEAR,
            far_depth_threshold: DEFAULT_FAR,
            viewport_width: DEFAULT_VIEWPORT.0,
            viewport_height: DEFAULT_VIEWPORT.1,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config = serde_json::from_str(&contents)?;
                debug!(path = %path.display(), ?config, "Configuration loaded");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Thresholds clamped to the accepted range
    pub fn thresholds(&self) -> ThresholdState {
        ThresholdState {
            near: self.near_depth_threshold,
            far: self.far_depth_threshold,
            confidence: self.confidence_threshold,
        }
        .clamped()
    }

    pub fn viewport(&self) -> ViewportSize {
        ViewportSize::new(self.viewport_width as f32, self.viewport_height as f32)
    }
}
