//! MobileNetV2 implementation for image classification.
//!
//! The implementation follows the original MobileNetV2 paper layout
//! (inverted residuals with linear bottlenecks) with a configurable width
//! multiplier.

use burn::{
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig, Initializer, Linear, LinearConfig,
    },
    prelude::*,
};

mod blocks;
pub use blocks::*;

// Per-stage settings: expansion factor t, output channels c, repeats n, stride s.
const INVERTED_RESIDUAL_SETTINGS: [[usize; 4]; 7] = [
    [1, 16, 1, 1],
    [6, 24, 2, 2],
    [6, 32, 3, 2],
    [6, 64, 4, 2],
    [6, 96, 3, 1],
    [6, 160, 3, 2],
    [6, 320, 1, 1],
];

/// Round a channel count to the nearest multiple of `divisor`, never going
/// below `min_ch` and never rounding down by more than 10%.
///
/// Taken from the original TensorFlow slim implementation; keeps all layer
/// widths divisible by 8 so they map well onto hardware.
pub fn make_divisible(channels: f64, divisor: usize, min_ch: Option<usize>) -> usize {
    let min_ch = min_ch.unwrap_or(divisor);
    let mut new_ch = ((channels + divisor as f64 / 2.0) as usize / divisor * divisor).max(min_ch);
    if (new_ch as f64) < 0.9 * channels {
        new_ch += divisor;
    }
    new_ch
}

/// MobileNetV2 configuration.
#[derive(Config, Debug)]
pub struct MobileNetV2Config {
    /// Number of output classes.
    #[config(default = 1000)]
    pub num_classes: usize,
    /// Width multiplier applied to every layer's channel count.
    #[config(default = 1.0)]
    pub alpha: f64,
    /// Channel counts are rounded to multiples of this value.
    #[config(default = 8)]
    pub round_nearest: usize,
    /// Dropout probability before the classifier.
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl MobileNetV2Config {
    /// Initialize a MobileNetV2 model on the given device.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> MobileNetV2<B> {
        let mut input_channel = make_divisible(32.0 * self.alpha, self.round_nearest, None);
        let last_channel = make_divisible(1280.0 * self.alpha, self.round_nearest, None);

        let stem = ConvBnRelu6::new(3, input_channel, 3, 2, 1, device);

        let mut blocks = Vec::new();
        for [t, c, n, s] in INVERTED_RESIDUAL_SETTINGS {
            let output_channel = make_divisible(c as f64 * self.alpha, self.round_nearest, None);
            for i in 0..n {
                let stride = if i == 0 { s } else { 1 };
                blocks.push(InvertedResidual::new(
                    input_channel,
                    output_channel,
                    stride,
                    t,
                    device,
                ));
                input_channel = output_channel;
            }
        }

        let head = ConvBnRelu6::new(input_channel, last_channel, 1, 1, 1, device);

        let classifier = LinearConfig::new(last_channel, self.num_classes)
            .with_initializer(Initializer::Normal {
                mean: 0.0,
                std: 0.01,
            })
            .init(device);

        MobileNetV2 {
            stem,
            blocks,
            head,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            classifier,
            num_classes: self.num_classes,
        }
    }
}

/// MobileNetV2 image classification model.
#[derive(Module, Debug)]
pub struct MobileNetV2<B: Backend> {
    stem: ConvBnRelu6<B>,
    blocks: Vec<InvertedResidual<B>>,
    head: ConvBnRelu6<B>,
    pool: AdaptiveAvgPool2d,
    dropout: Dropout,
    classifier: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> MobileNetV2<B> {
    /// Number of output classes.
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Feature extraction: everything up to (and including) the final 1x1 conv.
    pub fn forward_features(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut out = self.stem.forward(input);
        for block in &self.blocks {
            out = block.forward(out);
        }
        self.head.forward(out)
    }

    /// Classification head: global average pool, dropout, linear.
    pub fn forward_head(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.pool.forward(features);
        let out = out.flatten::<2>(1, 3);
        let out = self.dropout.forward(out);
        self.classifier.forward(out)
    }

    /// Forward pass: `[batch, 3, height, width]` -> `[batch, num_classes]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.forward_features(input);
        self.forward_head(features)
    }
}
