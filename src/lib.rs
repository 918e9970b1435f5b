pub mod error;
pub mod model;

#[cfg(feature = "dataset")]
pub mod dataset;

#[cfg(feature = "evaluation")]
pub mod evaluation;

pub use error::{DatasetError, EvaluationError, MetricError};
pub use model::{DeepLab, DeepLabConfig, Encoder};

#[cfg(feature = "dataset")]
pub use dataset::{Prefetcher, SegmentationItem, VocDataset};

#[cfg(feature = "evaluation")]
pub use evaluation::{
    ConfusionMatrix, EvaluationConfig, EvaluationReport, Evaluator, ModelSegmenter, Segmenter,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
