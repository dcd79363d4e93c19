//! Dense one-hot encoding over a new channel dimension

use burn::prelude::*;

/// One-hot encode per-pixel integer labels into a dense class-channel tensor.
///
/// Input is `[batch, height, width]` integer labels; output is
/// `[batch, num_classes, height, width]` with 1.0 in the labelled channel and
/// 0.0 elsewhere. Labels outside `[0, num_classes)` produce an all-zero pixel
/// across every channel, which is what segmentation ignore-labels rely on.
pub fn one_hot_4d<B: Backend>(labels: Tensor<B, 3, Int>, num_classes: usize) -> Tensor<B, 4> {
    let channels: Vec<Tensor<B, 3>> = (0..num_classes)
        .map(|class| labels.clone().equal_elem(class as i64).float())
        .collect();

    Tensor::stack::<4>(channels, 1)
}
