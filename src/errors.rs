// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the depth compositor
//!
//! Only construction-time and I/O failures are errors. Missing per-frame
//! data is never an error: the renderer reports it as a skipped draw.

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Renderer could not be created or could not read back a frame
    #[error("Renderer error: {0}")]
    Renderer(#[from] RendererError),
    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Image encoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    /// Storage/filesystem errors
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Failures while creating GPU resources for the compositor
///
/// All of these are fatal for the renderer instance that hit them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RendererError {
    /// No adapter matched the request
    #[error("No suitable GPU adapter: {0}")]
    NoAdapter(String),
    /// Adapter refused to create a device
    #[error("Failed to create GPU device: {0}")]
    DeviceRequest(String),
    /// Shader or pipeline validation failed
    #[error("Failed to build compositor pipeline: {0}")]
    Pipeline(String),
    /// Render destination could not be created
    #[error("Invalid render destination: {0}")]
    Destination(String),
    /// Reading the composited frame back to the CPU failed
    #[error("Readback failed: {0}")]
    Readback(String),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Platform has no configuration directory
    #[error("No configuration directory available")]
    NoConfigDir,
    /// Reading the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// File contents are not a valid configuration
    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_errors_keep_their_prefix_when_wrapped() {
        let err: AppError = RendererError::NoAdapter("none".into()).into();
        let text = err.to_string();
        assert!(text.starts_with("Renderer error:"));
        assert!(text.contains("No suitable GPU adapter"));
    }

    #[test]
    fn parse_errors_convert_to_config_errors() {
        let parse = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: AppError = ConfigError::from(parse).into();
        assert!(err.to_string().contains("Malformed configuration"));
    }
}
