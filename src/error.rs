//! Error types for uvatlas.
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias using [`AtlasError`].
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Errors that can occur during atlas generation.
#[derive(Error, Debug)]
pub enum AtlasError {
    /// The mesh has no faces (or every input face was rejected).
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references a vertex index outside the valid range.
    ///
    /// This is detected before any mesh construction and aborts the run.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// Invalid parameter value in the supplied options.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },

    /// An advertised but unimplemented algorithm selection was requested.
    #[error("not implemented: {feature}")]
    NotImplemented {
        /// The requested configuration.
        feature: &'static str,
    },

    /// The pipeline stages were invoked out of order.
    #[error("invalid atlas state: {0}")]
    InvalidState(&'static str),

    /// An iterative solver failed to converge.
    ///
    /// The parameterizer catches this internally and falls back to a trivial
    /// mapping; it never escapes a generation call.
    #[error("solver failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// Packing would require a canvas larger than the supported maximum.
    ///
    /// The packer grows its canvas until every chart fits, up to
    /// [`MAX_CANVAS_SIZE`](crate::atlas::MAX_CANVAS_SIZE) texels per side.
    #[error("packed atlas would exceed {max}x{max} texels (needs {required})")]
    CanvasLimitExceeded {
        /// The canvas extent that would have been required.
        required: usize,
        /// The supported maximum extent.
        max: usize,
    },
}

impl AtlasError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        AtlasError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}
