//! Error types for the highlight detector.
//!
//! "No highlight found" is deliberately absent from this taxonomy: it is a
//! normal outcome reported through `DetectionOutcome::highlight_present`.

use thiserror::Error;

/// Result type alias for highlight detector operations.
pub type Result<T> = std::result::Result<T, DetectorError>;

#[derive(Error, Debug)]
pub enum DetectorError {
    /// The input has no pixels or cannot be read as a 3-channel pixel grid.
    #[error("Invalid image: {reason}")]
    InvalidImage { reason: String },

    /// A configuration value is out of its accepted range.
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidConfig { parameter: String, value: String },

    /// A palette definition is inconsistent (e.g. hex does not match rgb).
    #[error("Invalid palette: {reason}")]
    InvalidPalette { reason: String },

    /// The worker pool has shut down or a worker dropped its task.
    #[error("Detector worker unavailable: {0}")]
    WorkerUnavailable(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),
}

impl DetectorError {
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidConfig {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    pub fn invalid_palette(reason: impl Into<String>) -> Self {
        Self::InvalidPalette {
            reason: reason.into(),
        }
    }

    /// True for failures caused by the caller's input rather than by the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DetectorError::InvalidImage { .. }
                | DetectorError::InvalidConfig { .. }
                | DetectorError::InvalidPalette { .. }
                | DetectorError::Image(_)
        )
    }
}
