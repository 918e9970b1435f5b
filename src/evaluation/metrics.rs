use crate::error::MetricError;

/// Streaming confusion matrix over `num_classes` classes.
///
/// Rows are indexed by the ground-truth class and columns by the predicted
/// class. A pixel contributes only when its label lies in
/// `[0, num_classes)`; every other label value (the ignore label included)
/// is left out of both the numerator and the denominator of every metric.
///
/// Metrics with an empty denominator fall back to `0.0`:
/// - [`mean_iou`](Self::mean_iou) averages over classes whose union is
///   non-empty, and returns `0.0` when there is no such class.
/// - [`pixel_accuracy`](Self::pixel_accuracy) returns `0.0` when no valid
///   pixel has been accumulated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfusionMatrix {
    num_classes: usize,
    ignore_label: u32,
    counts: Vec<u64>,
    ignored_pixels: u64,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize, ignore_label: u32) -> Result<Self, MetricError> {
        if num_classes == 0 {
            return Err(MetricError::InvalidClassCount(num_classes));
        }

        Ok(Self {
            num_classes,
            ignore_label,
            counts: vec![0; num_classes * num_classes],
            ignored_pixels: 0,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn ignore_label(&self) -> u32 {
        self.ignore_label
    }

    /// Accumulate one image worth of flattened predictions and labels.
    ///
    /// Returns the number of valid pixels added to the matrix. On error the
    /// matrix is left untouched.
    pub fn update(&mut self, predictions: &[u32], labels: &[u32]) -> Result<u64, MetricError> {
        if predictions.len() != labels.len() {
            return Err(MetricError::ShapeMismatch {
                predictions: predictions.len(),
                labels: labels.len(),
            });
        }

        let last_class = (self.num_classes - 1) as u64;
        let is_valid = |label: u32| label as u64 <= last_class;

        if let Some((index, &prediction)) = predictions
            .iter()
            .zip(labels)
            .enumerate()
            .find(|(_, (prediction, label))| {
                is_valid(**label) && **prediction as usize >= self.num_classes
            })
            .map(|(index, (prediction, _))| (index, prediction))
        {
            return Err(MetricError::PredictionOutOfRange {
                index,
                prediction,
                num_classes: self.num_classes,
            });
        }

        let mut valid = 0;
        for (&prediction, &label) in predictions.iter().zip(labels) {
            if is_valid(label) {
                self.counts[label as usize * self.num_classes + prediction as usize] += 1;
                valid += 1;
            }
        }
        self.ignored_pixels += labels.len() as u64 - valid;

        Ok(valid)
    }

    /// Add the counts of another matrix with the same class count.
    ///
    /// Workers that evaluate images in parallel accumulate into private
    /// matrices and merge them here under exclusive access.
    pub fn merge(&mut self, other: &ConfusionMatrix) -> Result<(), MetricError> {
        if other.num_classes != self.num_classes {
            return Err(MetricError::ClassCountMismatch {
                expected: self.num_classes,
                other: other.num_classes,
            });
        }

        for (count, other) in self.counts.iter_mut().zip(&other.counts) {
            *count += other;
        }
        self.ignored_pixels += other.ignored_pixels;

        Ok(())
    }

    pub fn get(&self, true_class: usize, predicted_class: usize) -> u64 {
        self.counts[true_class * self.num_classes + predicted_class]
    }

    /// Total number of valid pixels accumulated.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Pixels skipped because their label was outside `[0, num_classes)`.
    pub fn ignored_pixels(&self) -> u64 {
        self.ignored_pixels
    }

    pub fn reset(&mut self) {
        self.counts.fill(0);
        self.ignored_pixels = 0;
    }

    fn row_sum(&self, class: usize) -> u64 {
        let start = class * self.num_classes;
        self.counts[start..start + self.num_classes].iter().sum()
    }

    fn column_sum(&self, class: usize) -> u64 {
        (0..self.num_classes).map(|row| self.get(row, class)).sum()
    }

    /// IoU of every class, `None` where the class never occurred in either
    /// the labels or the predictions.
    pub fn class_iou(&self) -> Vec<Option<f64>> {
        (0..self.num_classes)
            .map(|class| {
                let intersection = self.get(class, class);
                let union = self.row_sum(class) + self.column_sum(class) - intersection;

                (union > 0).then(|| intersection as f64 / union as f64)
            })
            .collect()
    }

    pub fn mean_iou(&self) -> f64 {
        let mut total_iou = 0.0;
        let mut valid_classes = 0;

        for iou in self.class_iou().into_iter().flatten() {
            total_iou += iou;
            valid_classes += 1;
        }

        if valid_classes > 0 {
            total_iou / valid_classes as f64
        } else {
            0.0
        }
    }

    pub fn pixel_accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }

        let correct: u64 = (0..self.num_classes).map(|c| self.get(c, c)).sum();
        correct as f64 / total as f64
    }
}
