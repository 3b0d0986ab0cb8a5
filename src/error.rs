//! Unified error handling for the trajectory engine.
//!
//! Malformed input lines are never errors: the parser drops them. Everything
//! that reaches this type is either a configuration problem (rejected before
//! any work starts), an I/O failure on a data source, or a worker pool
//! failure.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for trajectory engine operations.
#[derive(Debug, Error)]
pub enum TrajectoryError {
    /// A data file or directory could not be opened or read
    #[error("Cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rectangle has non-finite or inverted bounds after normalization
    #[error("Invalid rectangle [{min_lng}, {max_lng}] x [{min_lat}, {max_lat}]: {message}")]
    InvalidRectangle {
        min_lng: f64,
        max_lng: f64,
        min_lat: f64,
        max_lat: f64,
        message: String,
    },

    /// Configuration rejected before processing started
    #[error("Configuration error: {message}")]
    InvalidConfig { message: String },

    /// The rayon worker pool could not be created
    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },

    /// The run was cancelled before any unit completed
    #[error("Analysis cancelled")]
    Cancelled,
}

impl TrajectoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrajectoryError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        TrajectoryError::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type alias for trajectory engine operations.
pub type Result<T> = std::result::Result<T, TrajectoryError>;
