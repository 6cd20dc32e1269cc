//! Error types shared by the restoration filters and the deconvolution engine.

use thiserror::Error;

/// Image shape as `(depth, height, width)`.
pub type Shape = (usize, usize, usize);

/// Errors produced while validating inputs or configuration.
///
/// All variants are precondition failures: they are reported before any
/// iteration runs and are never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RestorationError {
    /// An image that must match the observed image has a different shape.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Shape of the observed image.
        expected: Shape,
        /// Shape of the offending image.
        actual: Shape,
    },

    /// Iteration count was negative.
    #[error("invalid iteration count: {0}")]
    InvalidIteration(i64),

    /// One of the image axes has length zero.
    #[error("image has no samples")]
    EmptyImage,

    /// NaN or infinite samples in an input image.
    #[error("{0} contains non-finite samples")]
    NonFiniteInput(&'static str),

    /// Configuration validation failure.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Flat buffer length does not match the declared shape.
    #[error("buffer length {actual} does not match shape ({expected} samples)")]
    InvalidBuffer {
        /// Number of samples implied by the shape.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, RestorationError>;

#[cfg(feature = "python")]
impl From<RestorationError> for pyo3::PyErr {
    fn from(err: RestorationError) -> Self {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
