use std::path::Path;

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    record::CompactRecorder,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

use crate::{
    dataset::{SegmentationBatcher, SegmentationItem},
    error::EvaluationError,
    model::{DeepLab, DeepLabConfig},
};

/// Produces a dense class prediction for one sample.
pub trait Segmenter {
    /// Row-major class indices, one per label pixel.
    fn segment(&self, item: &SegmentationItem) -> Result<Vec<u32>, EvaluationError>;
}

/// Upsample logits bilinearly to `size` and take the per-pixel argmax.
///
/// Returns `batch * height * width` class indices.
pub fn dense_predictions<B: Backend>(
    logits: Tensor<B, 4>,
    size: [usize; 2],
) -> Result<Vec<u32>, EvaluationError> {
    // burn samples bilinearly with aligned corners; TF's default
    // (`align_corners=False`) shifts sample points by half a pixel, so
    // boundary pixels may pick a different class.
    let logits = interpolate(
        logits,
        size,
        InterpolateOptions::new(InterpolateMode::Bilinear),
    );

    logits
        .argmax(1)
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map(|classes| classes.into_iter().map(|c| c as u32).collect())
        .map_err(|err| EvaluationError::Inference(format!("{err:?}")))
}

pub struct ModelSegmenter<B: Backend> {
    model: DeepLab<B>,
    batcher: SegmentationBatcher<B>,
}

impl<B: Backend> ModelSegmenter<B> {
    pub fn new(model: DeepLab<B>, device: B::Device) -> Self {
        Self {
            model,
            batcher: SegmentationBatcher::new(device),
        }
    }

    /// Build the network and restore its weights from a checkpoint saved
    /// with burn's `CompactRecorder`.
    pub fn restore(
        config: &DeepLabConfig,
        checkpoint: &Path,
        device: &B::Device,
    ) -> Result<Self, EvaluationError> {
        let model = config
            .init::<B>(device)?
            .load_file(checkpoint, &CompactRecorder::new(), device)
            .map_err(|err| EvaluationError::Checkpoint {
                path: checkpoint.to_path_buf(),
                message: format!("{err:?}"),
            })?;

        tracing::info!(checkpoint = %checkpoint.display(), "restored model parameters");

        Ok(Self::new(model, device.clone()))
    }
}

impl<B: Backend> Segmenter for ModelSegmenter<B> {
    fn segment(&self, item: &SegmentationItem) -> Result<Vec<u32>, EvaluationError> {
        let batch = self.batcher.batch(vec![item.clone()]);
        let logits = self.model.forward(batch.images);

        dense_predictions(logits, item.size())
    }
}
