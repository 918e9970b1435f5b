use std::path::{Path, PathBuf};

use burn::data::dataset::{
    Dataset, InMemDataset,
    transform::{Mapper, MapperDataset},
};
use image::ColorType;

use super::SegmentationItem;
use crate::error::DatasetError;

/// Per-channel mean in BGR order, subtracted from every input pixel.
pub const IMG_MEAN: [f32; 3] = [104.006_99, 116.668_77, 122.678_92];

/// Paths of one image and its ground-truth label map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplePaths {
    pub image_path: PathBuf,
    pub label_path: PathBuf,
}

/// Decoded sample, or the error raised while reading it.
pub type VocItem = Result<SegmentationItem, DatasetError>;

struct PathToSegmentationItem;

impl Mapper<SamplePaths, VocItem> for PathToSegmentationItem {
    fn map(&self, item: &SamplePaths) -> VocItem {
        load_item(item)
    }
}

type VocDatasetMapper =
    MapperDataset<InMemDataset<SamplePaths>, PathToSegmentationItem, SamplePaths>;

/// Image/label pairs read from a VOC style list file, decoded on access.
///
/// Each line holds an image path and a label path separated by whitespace,
/// both relative to the data directory (for example
/// `/JPEGImages/2007_000033.jpg /SegmentationClassAug/2007_000033.png`).
/// A line with a single path uses it for both.
pub struct VocDataset {
    dataset: VocDatasetMapper,
}

impl Dataset<VocItem> for VocDataset {
    fn get(&self, index: usize) -> Option<VocItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl VocDataset {
    pub fn from_list_file<P: AsRef<Path>, Q: AsRef<Path>>(
        data_dir: P,
        list_path: Q,
    ) -> Result<Self, DatasetError> {
        let list_path = list_path.as_ref();
        let content =
            std::fs::read_to_string(list_path).map_err(|source| DatasetError::ListReadFailed {
                path: list_path.to_path_buf(),
                source,
            })?;

        let samples = parse_list(data_dir.as_ref(), &content);
        if samples.is_empty() {
            return Err(DatasetError::EmptyList {
                path: list_path.to_path_buf(),
            });
        }

        tracing::info!(
            samples = samples.len(),
            list = %list_path.display(),
            "loaded data list"
        );

        Ok(Self::with_items(samples))
    }

    pub fn with_items(samples: Vec<SamplePaths>) -> Self {
        let dataset = MapperDataset::new(InMemDataset::new(samples), PathToSegmentationItem);

        Self { dataset }
    }

    /// Lazily decode `steps` samples, wrapping around to the start of the
    /// list when it holds fewer entries.
    pub fn into_cycled_items(
        self,
        steps: usize,
    ) -> impl Iterator<Item = VocItem> + Send + 'static {
        let len = self.len();
        if steps > len {
            tracing::warn!(
                steps,
                samples = len,
                "more steps than listed samples, cycling through the list"
            );
        }

        (0..steps).map(move |step| {
            let index = step.checked_rem(len).unwrap_or(step);
            self.get(index)
                .unwrap_or(Err(DatasetError::MissingSample { index }))
        })
    }
}

fn parse_list(data_dir: &Path, content: &str) -> Vec<SamplePaths> {
    content
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let image = tokens.next()?;
            let label = tokens.next().unwrap_or(image);

            Some(SamplePaths {
                image_path: data_dir.join(image.trim_start_matches('/')),
                label_path: data_dir.join(label.trim_start_matches('/')),
            })
        })
        .collect()
}

/// Decode an image into mean-subtracted BGR values in CHW order.
pub fn load_image(path: &Path) -> Result<(Vec<f32>, [usize; 2]), DatasetError> {
    let image = image::open(path)
        .map_err(|source| DatasetError::ImageOpenFailed {
            path: path.to_path_buf(),
            source,
        })?
        .into_rgb8();

    let (width, height) = (image.width() as usize, image.height() as usize);
    let mut data = vec![0.0; 3 * height * width];

    for (x, y, pixel) in image.enumerate_pixels() {
        let offset = y as usize * width + x as usize;
        // RGB -> BGR
        for (channel, &value) in pixel.0.iter().rev().enumerate() {
            data[channel * height * width + offset] = value as f32 - IMG_MEAN[channel];
        }
    }

    Ok((data, [height, width]))
}

/// Decode a single-channel class index map.
///
/// RGB8 labels are accepted only when every pixel is grey: palette PNGs
/// (such as VOC `SegmentationClass`) decode to RGB colours, not indices.
pub fn load_label(path: &Path) -> Result<(Vec<u32>, [usize; 2]), DatasetError> {
    let image = image::open(path).map_err(|source| DatasetError::ImageOpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let size = [image.height() as usize, image.width() as usize];

    let label = match image.color() {
        ColorType::L8 => image.into_luma8().iter().map(|&x| x as u32).collect(),
        ColorType::L16 => image.into_luma16().iter().map(|&x| x as u32).collect(),
        ColorType::Rgb8 => {
            let image = image.into_rgb8();
            if image.pixels().any(|pixel| {
                let [r, g, b] = pixel.0;
                r != g || r != b
            }) {
                return Err(DatasetError::UnsupportedLabelFormat {
                    path: path.to_path_buf(),
                    color: ColorType::Rgb8,
                });
            }

            image.iter().step_by(3).map(|&x| x as u32).collect()
        }
        color => {
            return Err(DatasetError::UnsupportedLabelFormat {
                path: path.to_path_buf(),
                color,
            });
        }
    };

    Ok((label, size))
}

pub fn load_item(sample: &SamplePaths) -> Result<SegmentationItem, DatasetError> {
    let (image, image_size) = load_image(&sample.image_path)?;
    let (label, label_size) = load_label(&sample.label_path)?;

    if image_size != label_size {
        return Err(DatasetError::DimensionMismatch {
            path: sample.image_path.clone(),
            image: image_size,
            label: label_size,
        });
    }

    let name = sample
        .image_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let [height, width] = image_size;

    Ok(SegmentationItem::new(name, image, label, height, width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("deeplab-eval-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parses_pairs_and_single_paths() {
        let content = "/JPEGImages/a.jpg /SegmentationClassAug/a.png\n\n  b.jpg\n";

        let samples = parse_list(Path::new("/data/voc"), content);

        assert_eq!(
            samples,
            vec![
                SamplePaths {
                    image_path: PathBuf::from("/data/voc/JPEGImages/a.jpg"),
                    label_path: PathBuf::from("/data/voc/SegmentationClassAug/a.png"),
                },
                SamplePaths {
                    image_path: PathBuf::from("/data/voc/b.jpg"),
                    label_path: PathBuf::from("/data/voc/b.jpg"),
                },
            ]
        );
    }

    #[test]
    fn missing_list_file_is_an_error() {
        let err = VocDataset::from_list_file("/nonexistent", "/nonexistent/val.txt").unwrap_err();

        assert!(matches!(err, DatasetError::ListReadFailed { .. }));
    }

    #[test]
    fn empty_list_file_is_an_error() {
        let dir = scratch_dir("empty-list");
        let list = dir.join("val.txt");
        std::fs::write(&list, "\n\n").unwrap();

        let err = VocDataset::from_list_file(&dir, &list).unwrap_err();

        assert!(matches!(err, DatasetError::EmptyList { .. }));
    }

    #[test]
    fn loads_item_with_mean_subtracted_bgr() {
        let dir = scratch_dir("load-item");
        let image_path = dir.join("img.png");
        let label_path = dir.join("label.png");

        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([10, 20, 30]));
        image.put_pixel(1, 0, Rgb([200, 150, 100]));
        image.save(&image_path).unwrap();

        let mut label = GrayImage::new(2, 1);
        label.put_pixel(0, 0, Luma([3]));
        label.put_pixel(1, 0, Luma([255]));
        label.save(&label_path).unwrap();

        let item = load_item(&SamplePaths {
            image_path,
            label_path,
        })
        .unwrap();

        assert_eq!(item.name, "img");
        assert_eq!(item.size(), [1, 2]);
        assert_eq!(item.label, vec![3, 255]);
        // Blue plane first.
        assert!((item.image[0] - (30.0 - IMG_MEAN[0])).abs() < 1e-4);
        assert!((item.image[1] - (100.0 - IMG_MEAN[0])).abs() < 1e-4);
        // Red plane last.
        assert!((item.image[4] - (10.0 - IMG_MEAN[2])).abs() < 1e-4);
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let dir = scratch_dir("mismatch");
        let image_path = dir.join("img.png");
        let label_path = dir.join("label.png");
        RgbImage::new(4, 4).save(&image_path).unwrap();
        GrayImage::new(4, 3).save(&label_path).unwrap();

        let err = load_item(&SamplePaths {
            image_path,
            label_path,
        })
        .unwrap_err();

        assert!(matches!(
            err,
            DatasetError::DimensionMismatch {
                image: [4, 4],
                label: [3, 4],
                ..
            }
        ));
    }

    #[test]
    fn rejects_rgba_labels() {
        let dir = scratch_dir("rgba");
        let label_path = dir.join("label.png");
        let mut label = RgbaImage::new(1, 1);
        label.put_pixel(0, 0, Rgba([1, 2, 3, 4]));
        label.save(&label_path).unwrap();

        let err = load_label(&label_path).unwrap_err();

        assert!(matches!(err, DatasetError::UnsupportedLabelFormat { .. }));
    }

    #[test]
    fn cycles_when_steps_exceed_samples() {
        let dir = scratch_dir("cycle");
        let image_path = dir.join("img.png");
        let label_path = dir.join("label.png");
        RgbImage::new(1, 1).save(&image_path).unwrap();
        GrayImage::new(1, 1).save(&label_path).unwrap();

        let dataset = VocDataset::with_items(vec![SamplePaths {
            image_path,
            label_path,
        }]);
        assert_eq!(dataset.len(), 1);

        let items: Vec<_> = dataset.into_cycled_items(3).collect();

        assert_eq!(items.len(), 3);
        assert!(items.iter().all(Result::is_ok));
    }

    #[test]
    fn decodes_items_on_access() {
        let dir = scratch_dir("mapper");
        let image_path = dir.join("img.png");
        let label_path = dir.join("label.png");
        RgbImage::new(2, 2).save(&image_path).unwrap();
        GrayImage::from_pixel(2, 2, Luma([4])).save(&label_path).unwrap();

        let dataset = VocDataset::with_items(vec![
            SamplePaths {
                image_path: image_path.clone(),
                label_path,
            },
            SamplePaths {
                image_path: image_path.clone(),
                label_path: dir.join("missing.png"),
            },
        ]);

        let first = dataset.get(0).unwrap().unwrap();
        assert_eq!(first.label, vec![4; 4]);
        assert!(matches!(
            dataset.get(1),
            Some(Err(DatasetError::ImageOpenFailed { .. }))
        ));
        assert!(dataset.get(2).is_none());
    }

    #[test]
    fn empty_dataset_yields_missing_samples() {
        let items: Vec<_> = VocDataset::with_items(Vec::new())
            .into_cycled_items(2)
            .collect();

        assert_eq!(items.len(), 2);
        assert!(matches!(
            items[1],
            Err(DatasetError::MissingSample { index: 1 })
        ));
    }

    #[test]
    fn accepts_grey_rgb_labels() {
        let dir = scratch_dir("grey-rgb");
        let label_path = dir.join("label.png");
        let mut label = RgbImage::new(2, 1);
        label.put_pixel(0, 0, Rgb([3, 3, 3]));
        label.put_pixel(1, 0, Rgb([255, 255, 255]));
        label.save(&label_path).unwrap();

        let (label, size) = load_label(&label_path).unwrap();

        assert_eq!(size, [1, 2]);
        assert_eq!(label, vec![3, 255]);
    }

    #[test]
    fn rejects_palette_colours_decoded_as_rgb() {
        let dir = scratch_dir("palette-rgb");
        let label_path = dir.join("label.png");
        // VOC colours of class 0 (black) and class 1 (dark red).
        let mut label = RgbImage::new(2, 1);
        label.put_pixel(0, 0, Rgb([0, 0, 0]));
        label.put_pixel(1, 0, Rgb([128, 0, 0]));
        label.save(&label_path).unwrap();

        let err = load_label(&label_path).unwrap_err();

        assert!(matches!(
            err,
            DatasetError::UnsupportedLabelFormat {
                color: ColorType::Rgb8,
                ..
            }
        ));
    }
}
