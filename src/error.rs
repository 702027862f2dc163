//! Central error handling for the quadtree LOD core.
//!
//! Provides a unified GlobeError enum with consistent categorization.
//! Failures inside the per-frame traversal never surface as errors; they
//! degrade to inherited or plain-ellipsoid data instead. Errors exist at
//! the construction and ingest seams only.

/// Centralized error type for planet/quadtree operations.
#[derive(thiserror::Error, Debug)]
pub enum GlobeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Terrain error: {0}")]
    Terrain(String),
}

impl GlobeError {
    /// Convenience constructors for common error types
    pub fn config<T: ToString>(msg: T) -> Self {
        GlobeError::Config(msg.to_string())
    }

    pub fn terrain<T: ToString>(msg: T) -> Self {
        GlobeError::Terrain(msg.to_string())
    }
}

/// Result type alias for planet/quadtree operations.
pub type GlobeResult<T> = Result<T, GlobeError>;
