//! Mean multiclass Dice coefficient accumulator.

use burn::{prelude::*, tensor::ElementConversion};
use burn_extra_ops::one_hot_4d;

use crate::error::{VisionEvalError, VisionEvalResult};
use crate::losses::{build_target, multiclass_dice_coeff, DICE_EPSILON};

/// Streaming mean Dice coefficient for multiclass segmentation.
///
/// Each `update` computes the multiclass Dice score of one batch — arg-max
/// prediction against a one-hot target, background channel excluded — and
/// adds it to a running sum. [`DiceCoefficient::value`] reports the mean over
/// all batches seen since the last reset, and 0 before any batch has been
/// seen (unlike [`super::ConfusionMatrix`], which reports NaN on an empty
/// matrix).
#[derive(Debug, Clone)]
pub struct DiceCoefficient {
    num_classes: usize,
    ignore_index: Option<i64>,
    dice_sum: f64,
    count: usize,
}

impl DiceCoefficient {
    /// Create an accumulator for `num_classes` classes (background included,
    /// so at least 2). Pixels labelled `ignore_index` are excluded from the
    /// score.
    pub fn new(num_classes: usize, ignore_index: Option<i64>) -> Self {
        debug_assert!(num_classes >= 2, "dice needs background plus foreground");
        Self {
            num_classes,
            ignore_index,
            dice_sum: 0.0,
            count: 0,
        }
    }

    /// Number of batches accumulated since the last reset.
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Accumulate one batch.
    ///
    /// `pred` is `[batch, num_classes, height, width]` probabilities or
    /// logits (only the arg-max matters); `target` is `[batch, height,
    /// width]` integer labels.
    pub fn update<B: Backend>(&mut self, pred: Tensor<B, 4>, target: Tensor<B, 3, Int>) {
        let pred_labels = pred.argmax(1).squeeze::<3>(1);
        let pred_one_hot = one_hot_4d(pred_labels, self.num_classes);
        let dice_target = build_target(target.clone(), self.num_classes, self.ignore_index);
        let roi = self
            .ignore_index
            .map(|index| target.not_equal_elem(index));

        // Dice score ignoring the background channel.
        let foreground_pred = pred_one_hot.slice(s![.., 1.., .., ..]);
        let foreground_target = dice_target.slice(s![.., 1.., .., ..]);
        let dice = multiclass_dice_coeff(foreground_pred, foreground_target, roi, DICE_EPSILON);

        self.dice_sum += dice.into_scalar().elem::<f64>();
        self.count += 1;
    }

    /// Mean Dice over the accumulated batches; 0 when nothing has been seen.
    pub fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.dice_sum / self.count as f64
        }
    }

    /// Zero the running sum and batch count in place.
    pub fn reset(&mut self) {
        self.dice_sum = 0.0;
        self.count = 0;
    }

    /// Fold another worker's running state into this one.
    pub fn merge(&mut self, other: &Self) -> VisionEvalResult<()> {
        if other.num_classes != self.num_classes || other.ignore_index != self.ignore_index {
            return Err(VisionEvalError::InvalidInput {
                reason: "cannot merge dice accumulators with different configurations".to_owned(),
            });
        }

        self.dice_sum += other.dice_sum;
        self.count += other.count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    /// Logits that arg-max onto the given label map.
    fn logits_for_labels(labels: &[[i64; 2]; 2], num_classes: usize) -> Tensor<TestBackend, 4> {
        let device = Default::default();
        let mut data = vec![0.0f32; num_classes * 4];
        for (row, cols) in labels.iter().enumerate() {
            for (col, &label) in cols.iter().enumerate() {
                data[label as usize * 4 + row * 2 + col] = 10.0;
            }
        }
        Tensor::from_data(
            TensorData::new(data, [1, num_classes, 2, 2]),
            &device,
        )
    }

    fn labels(values: [[i64; 2]; 2]) -> Tensor<TestBackend, 3, Int> {
        let device = Default::default();
        let flat: Vec<i64> = values.into_iter().flatten().collect();
        Tensor::from_data(TensorData::new(flat, [1, 2, 2]), &device)
    }

    #[test]
    fn value_is_zero_before_any_update() {
        let dice = DiceCoefficient::new(2, None);
        assert_eq!(dice.value(), 0.0);
        assert_eq!(dice.count(), 0);
    }

    #[test]
    fn single_update_reports_the_batch_score_exactly() {
        let mut dice = DiceCoefficient::new(2, None);
        let target = [[0i64, 1], [1, 0]];
        dice.update(logits_for_labels(&target, 2), labels(target));

        assert_eq!(dice.count(), 1);
        assert!((dice.value() - 1.0).abs() < 1e-4, "value {}", dice.value());
    }

    #[test]
    fn value_averages_over_batches() {
        let mut dice = DiceCoefficient::new(2, None);
        let perfect = [[0i64, 1], [1, 0]];
        dice.update(logits_for_labels(&perfect, 2), labels(perfect));
        // Second batch: prediction misses every foreground pixel.
        let all_background = [[0i64, 0], [0, 0]];
        let target = [[1i64, 1], [1, 1]];
        dice.update(logits_for_labels(&all_background, 2), labels(target));

        assert_eq!(dice.count(), 2);
        // First batch is ~1, second ~0, mean ~0.5.
        assert!((dice.value() - 0.5).abs() < 1e-3, "value {}", dice.value());
    }

    #[test]
    fn ignored_pixels_do_not_hurt_the_score() {
        let mut dice = DiceCoefficient::new(2, Some(255));
        // Prediction says background where the target says ignore.
        let prediction = [[1i64, 0], [1, 1]];
        let target = [[1i64, 255], [1, 1]];
        dice.update(logits_for_labels(&prediction, 2), labels(target));

        assert!((dice.value() - 1.0).abs() < 1e-4, "value {}", dice.value());
    }

    #[test]
    fn reset_restores_the_empty_state() {
        let mut dice = DiceCoefficient::new(2, None);
        let target = [[0i64, 1], [1, 0]];
        dice.update(logits_for_labels(&target, 2), labels(target));
        dice.reset();

        assert_eq!(dice.count(), 0);
        assert_eq!(dice.value(), 0.0);
    }

    #[test]
    fn merge_combines_sums_and_counts() {
        let target = [[0i64, 1], [1, 0]];

        let mut left = DiceCoefficient::new(2, None);
        left.update(logits_for_labels(&target, 2), labels(target));
        let mut right = DiceCoefficient::new(2, None);
        right.update(logits_for_labels(&target, 2), labels(target));

        left.merge(&right).unwrap();
        assert_eq!(left.count(), 2);
        assert!((left.value() - 1.0).abs() < 1e-4);

        let incompatible = DiceCoefficient::new(3, None);
        assert!(left.merge(&incompatible).is_err());
    }
}
