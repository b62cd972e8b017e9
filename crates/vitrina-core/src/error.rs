//! Error types shared across the viewer

use thiserror::Error;

/// Errors raised while mounting or driving a viewer
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Viewport is not attached to a display surface")]
    ViewportDetached,
    #[error("Viewport has no area ({width}x{height})")]
    EmptyViewport { width: u32, height: u32 },
    #[error("Drawing surface error: {0}")]
    Surface(String),
    #[error("Failed to register {kind} listener: {reason}")]
    Listener { kind: &'static str, reason: String },
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ViewerError {
    /// Whether this is a mount precondition failure (nothing was initialized)
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ViewerError::ViewportDetached | ViewerError::EmptyViewport { .. }
        )
    }
}

/// Errors raised while fetching or parsing an asset
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Fetch failed: {0}")]
    Network(String),
    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },
    #[error("glTF parse error: {0}")]
    Parse(String),
    #[error("Unsupported asset: {0}")]
    Unsupported(String),
}

/// Errors raised while reading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
