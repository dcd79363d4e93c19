//! Dice coefficient and Dice loss for semantic segmentation.
//!
//! The Dice coefficient `2·|A∩B| / (|A|+|B|)` is computed per batch item on
//! flattened class planes, then averaged; the multiclass variant averages it
//! over class channels. Pixels carrying an ignore label are excluded from
//! both numerator and denominator through a region-of-interest mask.

use burn::{prelude::*, tensor::activation::softmax};
use burn_extra_ops::one_hot_4d;

/// Default smoothing term protecting the ratio against empty masks.
pub const DICE_EPSILON: f64 = 1e-6;

/// Build a one-hot Dice target from integer labels.
///
/// `target` is `[batch, height, width]` class labels; the result is
/// `[batch, num_classes, height, width]`. Pixels equal to `ignore_index` are
/// zeroed across all class channels, so they contribute nothing to either
/// side of the Dice ratio.
pub fn build_target<B: Backend>(
    target: Tensor<B, 3, Int>,
    num_classes: usize,
    ignore_index: Option<i64>,
) -> Tensor<B, 4> {
    match ignore_index {
        Some(index) => {
            let ignored = target.clone().equal_elem(index);
            // Clamp ignored pixels onto class 0 so one-hot indexing stays in
            // range, then zero them out across every channel.
            let clamped = target.mask_fill(ignored.clone(), 0);
            let valid = ignored.bool_not().float().unsqueeze_dim::<4>(1);
            one_hot_4d(clamped, num_classes) * valid
        }
        None => one_hot_4d(target, num_classes),
    }
}

/// Average Dice coefficient over a batch of single-class planes.
///
/// `pred` and `target` are `[batch, height, width]`. When both masks are
/// empty the per-item denominator falls back to `2·inter`, making the ratio
/// `epsilon / epsilon = 1` — an empty prediction of an empty target is a
/// perfect match.
pub fn dice_coeff<B: Backend>(
    pred: Tensor<B, 3>,
    target: Tensor<B, 3>,
    roi: Option<Tensor<B, 3, Bool>>,
    epsilon: f64,
) -> Tensor<B, 1> {
    let (pred, target) = match roi {
        Some(mask) => {
            let mask = mask.float();
            (pred * mask.clone(), target * mask)
        }
        None => (pred, target),
    };

    let [batch_size, _, _] = pred.dims();
    let pred = pred.reshape([batch_size as i32, -1]);
    let target = target.reshape([batch_size as i32, -1]);

    let inter = (pred.clone() * target.clone()).sum_dim(1);
    let sets_sum = pred.sum_dim(1) + target.sum_dim(1);
    let empty = sets_sum.clone().equal_elem(0.0);
    let sets_sum = sets_sum.mask_where(empty, inter.clone() * 2.0);

    let dice = (inter * 2.0 + epsilon) / (sets_sum + epsilon);
    dice.mean()
}

/// Average Dice coefficient over every class channel.
///
/// `pred` and `target` are `[batch, channels, height, width]`; callers that
/// want background excluded slice it off before calling.
pub fn multiclass_dice_coeff<B: Backend>(
    pred: Tensor<B, 4>,
    target: Tensor<B, 4>,
    roi: Option<Tensor<B, 3, Bool>>,
    epsilon: f64,
) -> Tensor<B, 1> {
    let [_, channels, _, _] = pred.dims();

    let mut dice = Tensor::<B, 1>::zeros([1], &pred.device());
    for channel in 0..channels {
        let pred_plane = pred
            .clone()
            .slice(s![.., channel..channel + 1, .., ..])
            .squeeze::<3>(1);
        let target_plane = target
            .clone()
            .slice(s![.., channel..channel + 1, .., ..])
            .squeeze::<3>(1);
        dice = dice + dice_coeff(pred_plane, target_plane, roi.clone(), epsilon);
    }

    dice / channels as f64
}

/// Multiclass Dice loss: `1 − dice(softmax(pred), one-hot target)`.
///
/// `target` is `[batch, height, width]` integer labels. Unlike the metric
/// accumulator, the loss keeps the background channel in play.
pub fn dice_loss<B: Backend>(
    pred: Tensor<B, 4>,
    target: Tensor<B, 3, Int>,
    num_classes: usize,
    ignore_index: Option<i64>,
) -> Tensor<B, 1> {
    let probabilities = softmax(pred, 1);
    let dice_target = build_target(target.clone(), num_classes, ignore_index);
    let roi = ignore_index.map(|index| target.not_equal_elem(index));

    let dice = multiclass_dice_coeff(probabilities, dice_target, roi, DICE_EPSILON);
    dice.neg() + 1.0
}
