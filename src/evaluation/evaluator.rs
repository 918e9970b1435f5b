use derive_new::new;

use super::{ConfusionMatrix, EvaluationConfig, EvaluationReport, Segmenter};
use crate::{
    dataset::SegmentationItem,
    error::{DatasetError, EvaluationError},
};

/// Single pass evaluation loop: one image at a time, strictly sequential.
#[derive(new)]
pub struct Evaluator<S: Segmenter> {
    segmenter: S,
    config: EvaluationConfig,
}

impl<S: Segmenter> Evaluator<S> {
    /// Evaluate `num_steps` samples pulled from `source`.
    ///
    /// `on_progress` is called with the zero-based step index every
    /// `log_every` steps, starting with step 0. The first error aborts the
    /// run.
    pub fn run<I, F>(
        &self,
        source: I,
        mut on_progress: F,
    ) -> Result<EvaluationReport, EvaluationError>
    where
        I: IntoIterator<Item = Result<SegmentationItem, DatasetError>>,
        F: FnMut(usize),
    {
        self.config.validate()?;

        let mut matrix = ConfusionMatrix::new(self.config.num_classes, self.config.ignore_label)?;
        let mut source = source.into_iter();

        for step in 0..self.config.num_steps {
            let item = source.next().ok_or(EvaluationError::SourceExhausted {
                processed: step,
                expected: self.config.num_steps,
            })??;

            let predictions = self.segmenter.segment(&item)?;
            let valid = matrix.update(&predictions, &item.label)?;
            tracing::debug!(step, name = %item.name, valid, "accumulated sample");

            if step % self.config.log_every == 0 {
                on_progress(step);
            }
        }

        let report = EvaluationReport::new(
            self.config.num_steps,
            matrix.mean_iou(),
            matrix.pixel_accuracy(),
            matrix.class_iou(),
            matrix.total(),
            matrix.ignored_pixels(),
        );

        tracing::info!(
            steps = report.steps,
            mean_iou = report.mean_iou,
            pixel_accuracy = report.pixel_accuracy,
            "evaluation finished"
        );

        Ok(report)
    }
}
