//! Error types for scene preparation.

use std::path::PathBuf;
use thiserror::Error;

use crate::envmap::SamplingError;

/// Main error type for scene flattening and render preparation.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A mesh handed to the flattener cannot be turned into triangles
    #[error("Invalid mesh (object {object}): {reason}")]
    InvalidMesh { object: u32, reason: String },

    /// Texture index does not refer to an entry of the texture table
    #[error("Texture index {index} out of bounds (count: {count})")]
    TextureOutOfBounds { index: i32, count: usize },

    /// Bookkeeping inside the scene store disagrees with itself
    #[error("Scene invariant violated: {0}")]
    Invariant(String),

    /// Environment map sampling tables could not be built
    #[error("Environment map: {0}")]
    EnvMap(#[from] SamplingError),

    /// Low-discrepancy sequence configuration rejected
    #[error("Sample sequence: {0}")]
    Sequence(#[from] scrambled_hammersley::Error),

    /// Render settings rejected by validation
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Image decode failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Settings (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid mesh error.
    pub fn invalid_mesh(object: u32, reason: impl Into<String>) -> Self {
        Self::InvalidMesh {
            object,
            reason: reason.into(),
        }
    }

    /// Create an invariant violation error.
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}

/// Result type alias for scene preparation.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::invalid_mesh(3, "index count 4 is not a multiple of 3");
        assert!(e.to_string().contains("object 3"));
        assert!(e.to_string().contains("multiple of 3"));

        let e = Error::TextureOutOfBounds { index: 5, count: 2 };
        assert!(e.to_string().contains("5"));
        assert!(e.to_string().contains("2"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_sequence() {
        let err: Error = scrambled_hammersley::Error::ZeroSamples.into();
        assert!(matches!(err, Error::Sequence(_)));
    }
}
