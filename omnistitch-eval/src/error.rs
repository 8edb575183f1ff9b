use std::path::PathBuf;

use thiserror::Error;

/// The error type for evaluation runs.
///
/// Every failure of the evaluation loop is fatal: none of these variants is
/// retried by the library.
#[derive(Error, Debug)]
pub enum EvalError {
    /// A batch or image violates the input contract (channel count, frame sizes, empty batch).
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// Error for when a tensor has an unexpected shape.
    #[error("Invalid tensor shape: expected {expected}, got {actual}")]
    InvalidTensorShape {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// Error for when the requested interpolation model is not registered.
    #[error("Unsupported model: {name} (available: {available})")]
    UnsupportedModel {
        /// The requested model name.
        name: String,
        /// Comma separated list of registered models.
        available: String,
    },

    /// Error for when loading network weights fails.
    #[error("Failed to load weights: {reason}")]
    WeightLoadingFailed {
        /// The reason for the weight loading failure.
        reason: String,
    },

    /// Error for when dataset discovery or decoding fails.
    #[error("Dataset error: {message}")]
    DatasetError {
        /// The error message.
        message: String,
    },

    /// Filesystem failure while preparing or writing outputs.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Image encoding or decoding failure.
    #[error("Image error at {}: {source}", path.display())]
    Image {
        /// The image path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: image::ImageError,
    },

    /// Error for when tensor data cannot be read back from the device.
    #[error("Tensor data error: {reason}")]
    TensorData {
        /// The reason reported by the backend.
        reason: String,
    },

    /// No sample was evaluated, so no average exists.
    #[error("Empty dataset: no samples were evaluated")]
    EmptyDataset,
}

/// A specialized `Result` type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;
