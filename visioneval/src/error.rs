use std::path::PathBuf;

use thiserror::Error;

/// The error type for `visioneval` operations.
///
/// This enum covers the failure modes of the evaluation utilities, from
/// unsupported evaluation modes to annotation and result-file I/O problems.
#[derive(Error, Debug)]
pub enum VisionEvalError {
    /// Error for when an IoU type has no update logic (keypoints, or any
    /// future addition to the enum without a matching branch).
    #[error("not support iou_type: {iou_type}")]
    UnsupportedIouType {
        /// The name of the unsupported IoU type.
        iou_type: String,
    },

    /// Error for when confusion-matrix statistics are requested before any
    /// labels have been accumulated.
    #[error("confusion matrix is empty: call update() at least once before compute()")]
    EmptyConfusionMatrix,

    /// Error for when the metric inputs are malformed.
    #[error("invalid metric input: {reason}")]
    InvalidInput {
        /// The reason why the input is invalid.
        reason: String,
    },

    /// Error for when a reference annotation file cannot be interpreted.
    #[error("invalid annotations: {reason}")]
    InvalidAnnotations {
        /// The reason why the annotations are invalid.
        reason: String,
    },

    /// Error for when dataset operations fail.
    #[error("dataset error: {message}")]
    Dataset {
        /// The error message.
        message: String,
    },

    /// Error for when a file cannot be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Error for when JSON serialization or deserialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for `visioneval` operations.
pub type VisionEvalResult<T> = Result<T, VisionEvalError>;
