use burn::{data::dataloader::batcher::Batcher, prelude::*};
use derive_new::new;

/// One decoded evaluation sample.
///
/// `image` holds `3 * height * width` mean-subtracted BGR values in CHW
/// order, `label` holds `height * width` class indices in row-major order.
#[derive(new, Clone, Debug)]
pub struct SegmentationItem {
    pub name: String,
    pub image: Vec<f32>,
    pub label: Vec<u32>,
    pub height: usize,
    pub width: usize,
}

impl SegmentationItem {
    pub fn size(&self) -> [usize; 2] {
        [self.height, self.width]
    }
}

#[derive(Clone)]
pub struct SegmentationBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SegmentationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

#[derive(Clone, Debug)]
pub struct SegmentationBatch<B: Backend> {
    pub images: Tensor<B, 4, Float>,
    pub labels: Tensor<B, 3, Int>,
}

impl<B: Backend> Batcher<SegmentationItem, SegmentationBatch<B>> for SegmentationBatcher<B> {
    /// Stack items into a batch. Images are not resized, so every item of
    /// a batch must share the same size; evaluation batches hold one item.
    fn batch(&self, items: Vec<SegmentationItem>) -> SegmentationBatch<B> {
        let mut images = Vec::with_capacity(items.len());
        let mut labels = Vec::with_capacity(items.len());

        for item in items {
            let [height, width] = item.size();

            let image_tensor = Tensor::<B, 3>::from_data(
                TensorData::new(item.image, Shape::new([3, height, width]))
                    .convert::<B::FloatElem>(),
                &self.device,
            );

            let label: Vec<i64> = item.label.iter().map(|&x| x as i64).collect();
            let label_tensor = Tensor::<B, 2, Int>::from_data(
                TensorData::new(label, Shape::new([height, width])).convert::<B::IntElem>(),
                &self.device,
            );

            images.push(image_tensor);
            labels.push(label_tensor);
        }

        let images: Tensor<B, 4> = Tensor::stack::<4>(images, 0);
        let labels: Tensor<B, 3, Int> = Tensor::stack::<3>(labels, 0);

        SegmentationBatch { images, labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn batches_single_item() {
        let item = SegmentationItem::new(
            "sample".to_string(),
            (0..3 * 2 * 4).map(|x| x as f32).collect(),
            vec![0, 1, 2, 255, 0, 1, 2, 255],
            2,
            4,
        );

        let batch = SegmentationBatcher::<TestBackend>::new(Default::default()).batch(vec![item]);

        assert_eq!(batch.images.dims(), [1, 3, 2, 4]);
        assert_eq!(batch.labels.dims(), [1, 2, 4]);

        let labels = batch.labels.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![0, 1, 2, 255, 0, 1, 2, 255]);

        // Channel 1, row 0, column 0.
        let images = batch.images.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(images[8], 8.0);
    }
}
