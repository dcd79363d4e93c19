//! DenseNet building blocks: DenseLayer, DenseBlock, and Transition.

use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AvgPool2d, AvgPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

pub(crate) fn conv_initializer() -> Initializer {
    Initializer::KaimingNormal {
        gain: SQRT_2,
        fan_out_only: true,
    }
}

/// Basic unit of a DenseBlock (bottleneck layer).
///
/// Pre-activation ordering: BN -> ReLU -> 1x1 conv -> BN -> ReLU -> 3x3 conv.
/// Produces `growth_rate` new feature channels regardless of input width.
#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    norm1: BatchNorm<B, 2>,
    relu1: Relu,
    conv1: Conv2d<B>,
    norm2: BatchNorm<B, 2>,
    relu2: Relu,
    conv2: Conv2d<B>,
    dropout: Option<Dropout>,
}

impl<B: Backend> DenseLayer<B> {
    pub fn new(
        num_input_features: usize,
        growth_rate: usize,
        bn_size: usize,
        drop_rate: f64,
        device: &Device<B>,
    ) -> Self {
        let bottleneck_channels = bn_size * growth_rate;

        let norm1 = BatchNormConfig::new(num_input_features).init(device);
        let conv1 = Conv2dConfig::new([num_input_features, bottleneck_channels], [1, 1])
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);

        let norm2 = BatchNormConfig::new(bottleneck_channels).init(device);
        let conv2 = Conv2dConfig::new([bottleneck_channels, growth_rate], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);

        let dropout = (drop_rate > 0.0).then(|| DropoutConfig::new(drop_rate).init());

        Self {
            norm1,
            relu1: Relu::new(),
            conv1,
            norm2,
            relu2: Relu::new(),
            conv2,
            dropout,
        }
    }

    /// Returns only the new features; concatenation happens in the block.
    pub fn forward(&self, features: Tensor<B, 4>) -> Tensor<B, 4> {
        let bottleneck = self.conv1.forward(self.relu1.forward(self.norm1.forward(features)));
        let new_features = self
            .conv2
            .forward(self.relu2.forward(self.norm2.forward(bottleneck)));

        match &self.dropout {
            Some(dropout) => dropout.forward(new_features),
            None => new_features,
        }
    }
}

/// DenseBlock. Layers within a block are densely connected: each layer sees
/// the concatenation of every previous layer's output.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    layers: Vec<DenseLayer<B>>,
}

impl<B: Backend> DenseBlock<B> {
    pub fn new(
        num_layers: usize,
        num_input_features: usize,
        bn_size: usize,
        growth_rate: usize,
        drop_rate: f64,
        device: &Device<B>,
    ) -> Self {
        let layers = (0..num_layers)
            .map(|i| {
                DenseLayer::new(
                    num_input_features + i * growth_rate,
                    growth_rate,
                    bn_size,
                    drop_rate,
                    device,
                )
            })
            .collect();

        Self { layers }
    }

    pub fn forward(&self, init_features: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut features = init_features;
        for layer in &self.layers {
            let new_features = layer.forward(features.clone());
            features = Tensor::cat(vec![features, new_features], 1);
        }
        features
    }
}

/// Transition layer between two adjacent DenseBlocks: BN -> ReLU -> 1x1 conv
/// (channel reduction) -> 2x2 average pool (spatial halving).
#[derive(Module, Debug)]
pub struct Transition<B: Backend> {
    norm: BatchNorm<B, 2>,
    relu: Relu,
    conv: Conv2d<B>,
    pool: AvgPool2d,
}

impl<B: Backend> Transition<B> {
    pub fn new(num_input_features: usize, num_output_features: usize, device: &Device<B>) -> Self {
        let norm = BatchNormConfig::new(num_input_features).init(device);
        let conv = Conv2dConfig::new([num_input_features, num_output_features], [1, 1])
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);
        let pool = AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            norm,
            relu: Relu::new(),
            conv,
            pool,
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(self.relu.forward(self.norm.forward(input)));
        self.pool.forward(out)
    }
}
