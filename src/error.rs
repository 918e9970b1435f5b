//! Error types for metric accumulation, dataset loading and evaluation runs.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the [`ConfusionMatrix`](crate::evaluation::ConfusionMatrix) accumulator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    /// The class count must be strictly positive.
    #[error("Invalid class count: {0}, expected at least 1")]
    InvalidClassCount(usize),

    /// Predictions and labels of one image differ in length.
    #[error("Shape mismatch: {predictions} predictions vs {labels} labels")]
    ShapeMismatch { predictions: usize, labels: usize },

    /// A valid pixel was predicted as a class outside `[0, num_classes)`.
    #[error("Prediction {prediction} at pixel {index} is outside [0, {num_classes})")]
    PredictionOutOfRange {
        index: usize,
        prediction: u32,
        num_classes: usize,
    },

    /// Two confusion matrices with different class counts cannot be merged.
    #[error("Cannot merge a {other}-class confusion matrix into a {expected}-class one")]
    ClassCountMismatch { expected: usize, other: usize },
}

/// Errors raised while reading the image/label list and decoding samples.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read data list: {path}")]
    ListReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Data list is empty: {path}")]
    EmptyList { path: PathBuf },

    #[error("Failed to open image: {path}")]
    ImageOpenFailed {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Labels must be single-channel class index maps.
    #[error("Unsupported label color type {color:?}: {path}")]
    UnsupportedLabelFormat {
        path: PathBuf,
        color: image::ColorType,
    },

    #[error("Image {image:?} and label {label:?} dimensions differ: {path}")]
    DimensionMismatch {
        path: PathBuf,
        image: [usize; 2],
        label: [usize; 2],
    },

    #[error("Sample {index} is missing from the dataset")]
    MissingSample { index: usize },

    #[error("Background reader thread panicked")]
    ReaderPanicked,
}

/// Top-level error of an evaluation run.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Unknown encoder `{0}`, expected one of: res101, res50")]
    UnknownEncoder(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to restore checkpoint {path}: {message}")]
    Checkpoint { path: PathBuf, message: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Data source exhausted after {processed} of {expected} steps")]
    SourceExhausted { processed: usize, expected: usize },
}
