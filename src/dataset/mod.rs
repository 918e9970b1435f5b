mod prefetch;
mod segmentation;
mod voc;

pub use prefetch::Prefetcher;
pub use segmentation::{SegmentationBatch, SegmentationBatcher, SegmentationItem};
pub use voc::{IMG_MEAN, SamplePaths, VocDataset, VocItem, load_image, load_item, load_label};
