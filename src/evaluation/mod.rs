pub mod config;
pub mod evaluator;
pub mod inference;
pub mod metrics;

pub use config::{EvaluationConfig, EvaluationReport};
pub use evaluator::Evaluator;
pub use inference::{ModelSegmenter, Segmenter, dense_predictions};
pub use metrics::ConfusionMatrix;
