use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClickshotError {
    #[error("Element not found: best match score {score:.4} exceeds threshold {threshold}")]
    ElementNotFound { score: f64, threshold: f64 },

    #[error("Reference image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("Image has no pixel data")]
    EmptyImage,

    #[error("Region '{region}' has no element named '{name}'")]
    UnknownElement { region: String, name: String },

    #[error("Screen capture error: {0}")]
    Capture(String),

    #[error("Input device error: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image codec error: {0}")]
    Codec(#[from] image::ImageError),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl ClickshotError {
    /// Failures a search loop may retry: the element is not on screen yet, or its
    /// reference image has not been created yet.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. } | Self::ImageNotFound(_))
    }
}

pub type ClickshotResult<T> = Result<T, ClickshotError>;
