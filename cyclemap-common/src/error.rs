//! Error types for the cyclemap toolkit
//!
//! Geometry failures get their own type so tile pipelines can decide
//! whether a single bad tile is fatal. Everything else folds into [`Error`].

use thiserror::Error;

/// Failure raised while projecting, merging, simplifying or clipping geometry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A coordinate was NaN or infinite
    #[error("non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate { x: f64, y: f64 },

    /// A line needs at least two coordinates
    #[error("line has {points} point(s), need at least 2")]
    TooFewPoints { points: usize },

    /// The operation does not accept this geometry kind
    #[error("unsupported geometry type: {0}")]
    UnsupportedGeometry(&'static str),

    /// Tile address outside the 2^z grid
    #[error("invalid tile {z}/{x}/{y}")]
    InvalidTile { z: u8, x: u32, y: u32 },
}

impl GeometryError {
    /// Check a coordinate pair, returning it unchanged when finite.
    pub fn check_finite(x: f64, y: f64) -> std::result::Result<(f64, f64), GeometryError> {
        if x.is_finite() && y.is_finite() {
            Ok((x, y))
        } else {
            Err(GeometryError::NonFiniteCoordinate { x, y })
        }
    }
}

/// Main error type for cyclemap operations
#[derive(Debug, Error)]
pub enum Error {
    /// Geometry could not be processed
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid parameters passed to a library call
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid layer or zoom configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The PBF reader rejected the input
    #[error("PBF read failed: {0}")]
    Pbf(String),
}

/// Convenience result type for cyclemap operations
pub type Result<T> = std::result::Result<T, Error>;
