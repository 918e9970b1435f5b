use burn::prelude::*;

use crate::error::EvaluationError;

#[derive(Config, Debug)]
pub struct EvaluationConfig {
    /// Number of classes, background included.
    #[config(default = 21)]
    pub num_classes: usize,

    /// Label value marking void pixels. Any label outside
    /// `[0, num_classes)` is ignored; this value is kept for reporting.
    #[config(default = 255)]
    pub ignore_label: u32,

    /// Number of images to evaluate.
    #[config(default = 1449)]
    pub num_steps: usize,

    /// Progress is reported every `log_every` images.
    #[config(default = 100)]
    pub log_every: usize,

    /// Decoded samples buffered ahead of the model.
    #[config(default = 4)]
    pub prefetch_capacity: usize,
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<(), EvaluationError> {
        let checks = [
            (self.num_classes, "num_classes"),
            (self.num_steps, "num_steps"),
            (self.log_every, "log_every"),
            (self.prefetch_capacity, "prefetch_capacity"),
        ];

        for (value, name) in checks {
            if value == 0 {
                return Err(EvaluationError::InvalidConfig(format!(
                    "{name} must be at least 1"
                )));
            }
        }

        Ok(())
    }
}

/// Final metrics of an evaluation run.
#[derive(Config, Debug)]
pub struct EvaluationReport {
    pub steps: usize,
    pub mean_iou: f64,
    pub pixel_accuracy: f64,
    /// `None` for classes absent from both labels and predictions.
    pub class_iou: Vec<Option<f64>>,
    pub valid_pixels: u64,
    pub ignored_pixels: u64,
}
