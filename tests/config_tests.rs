// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use depth_clipper::{CaptureMode, Config, ConfigError, ConfidenceLevel};
use std::path::PathBuf;

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("depth-clipper-test-{}", std::process::id()))
        .join(name)
}

#[test]
fn test_config_default() {
    // Defaults match the renderer's initial thresholds
    let config = Config::default();
    assert_eq!(config.capture_mode, CaptureMode::DepthSensorWide);
    assert_eq!(config.confidence_threshold, ConfidenceLevel::Medium);
    assert_eq!(config.near_depth_threshold, 0.0);
    assert_eq!(config.far_depth_threshold, 0.5);
    assert!(!config.viewport().is_empty());
}

#[test]
fn test_missing_file_yields_defaults() {
    let path = scratch_path("does-not-exist.json");
    let config = Config::load_from(&path).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_written_file() {
    let path = scratch_path("written/config.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{
            "capture_mode": "FrontDepthSensor",
            "far_depth_threshold": 0.8,
            "confidence_threshold": "High"
        }"#,
    )
    .unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.capture_mode, CaptureMode::FrontDepthSensor);
    assert_eq!(loaded.far_depth_threshold, 0.8);
    assert_eq!(loaded.confidence_threshold, ConfidenceLevel::High);
    assert_eq!(loaded.near_depth_threshold, 0.0);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_malformed_file_is_an_error() {
    let path = scratch_path("malformed.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    // Never silently replace the user's settings
    let result = Config::load_from(&path);
    assert!(matches!(result, Err(ConfigError::Parse(_))));
    let _ = std::fs::remove_file(&path);
}
