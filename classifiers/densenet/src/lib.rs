//! DenseNet-BC implementation for image classification, based on
//! "Densely Connected Convolutional Networks" <https://arxiv.org/pdf/1608.06993.pdf>.
//!
//! Provides the standard 121/161/169/201 presets plus a fully configurable
//! variant.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

mod blocks;
pub use blocks::*;

/// DenseNet configuration.
#[derive(Config, Debug)]
pub struct DenseNetConfig {
    /// How many filters each dense layer adds (`k` in the paper).
    #[config(default = 32)]
    pub growth_rate: usize,
    /// Number of dense layers in each block.
    #[config(default = "vec![6, 12, 24, 16]")]
    pub block_config: Vec<usize>,
    /// Number of filters produced by the stem convolution.
    #[config(default = 64)]
    pub num_init_features: usize,
    /// Multiplicative factor for bottleneck width (`bn_size * k` bottleneck channels).
    #[config(default = 4)]
    pub bn_size: usize,
    /// Dropout rate after each dense layer.
    #[config(default = 0.0)]
    pub drop_rate: f64,
    /// Number of input image channels.
    #[config(default = 3)]
    pub in_channels: usize,
    /// Number of output classes.
    #[config(default = 1000)]
    pub num_classes: usize,
}

impl DenseNetConfig {
    /// DenseNet-121 preset.
    pub fn densenet121() -> Self {
        Self::new()
    }

    /// DenseNet-161 preset.
    pub fn densenet161() -> Self {
        Self::new()
            .with_growth_rate(48)
            .with_block_config(vec![6, 12, 36, 24])
            .with_num_init_features(96)
    }

    /// DenseNet-169 preset.
    pub fn densenet169() -> Self {
        Self::new().with_block_config(vec![6, 12, 32, 32])
    }

    /// DenseNet-201 preset.
    pub fn densenet201() -> Self {
        Self::new().with_block_config(vec![6, 12, 48, 32])
    }

    /// Number of feature channels entering the classifier.
    pub fn num_features(&self) -> usize {
        let mut num_features = self.num_init_features;
        for (i, &num_layers) in self.block_config.iter().enumerate() {
            num_features += num_layers * self.growth_rate;
            if i != self.block_config.len() - 1 {
                num_features /= 2;
            }
        }
        num_features
    }

    /// Initialize a DenseNet model on the given device.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DenseNet<B> {
        let stem_conv = Conv2dConfig::new([self.in_channels, self.num_init_features], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);
        let stem_norm = BatchNormConfig::new(self.num_init_features).init(device);
        let stem_pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut blocks = Vec::new();
        let mut transitions = Vec::new();
        let mut num_features = self.num_init_features;
        for (i, &num_layers) in self.block_config.iter().enumerate() {
            blocks.push(DenseBlock::new(
                num_layers,
                num_features,
                self.bn_size,
                self.growth_rate,
                self.drop_rate,
                device,
            ));
            num_features += num_layers * self.growth_rate;
            if i != self.block_config.len() - 1 {
                transitions.push(Transition::new(num_features, num_features / 2, device));
                num_features /= 2;
            }
        }

        let final_norm = BatchNormConfig::new(num_features).init(device);
        let classifier = LinearConfig::new(num_features, self.num_classes).init(device);

        DenseNet {
            stem_conv,
            stem_norm,
            relu: Relu::new(),
            stem_pool,
            blocks,
            transitions,
            final_norm,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            classifier,
            num_features,
            num_classes: self.num_classes,
        }
    }
}

/// DenseNet image classification model.
#[derive(Module, Debug)]
pub struct DenseNet<B: Backend> {
    stem_conv: Conv2d<B>,
    stem_norm: BatchNorm<B, 2>,
    relu: Relu,
    stem_pool: MaxPool2d,
    blocks: Vec<DenseBlock<B>>,
    transitions: Vec<Transition<B>>,
    final_norm: BatchNorm<B, 2>,
    pool: AdaptiveAvgPool2d,
    classifier: Linear<B>,
    num_features: usize,
    num_classes: usize,
}

impl<B: Backend> DenseNet<B> {
    /// Number of feature channels entering the classifier.
    pub const fn num_features(&self) -> usize {
        self.num_features
    }

    /// Number of output classes.
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Feature extraction: stem, dense blocks with transitions, final BN + ReLU.
    pub fn forward_features(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.stem_conv.forward(input);
        let out = self.stem_norm.forward(out);
        let out = self.relu.forward(out);
        let mut out = self.stem_pool.forward(out);

        for (i, block) in self.blocks.iter().enumerate() {
            out = block.forward(out);
            if let Some(transition) = self.transitions.get(i) {
                out = transition.forward(out);
            }
        }

        let out = self.final_norm.forward(out);
        self.relu.forward(out)
    }

    /// Classification head: global average pool and linear.
    pub fn forward_head(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.pool.forward(features);
        let out = out.flatten::<2>(1, 3);
        self.classifier.forward(out)
    }

    /// Forward pass: `[batch, in_channels, height, width]` -> `[batch, num_classes]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.forward_features(input);
        self.forward_head(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn preset_feature_widths_match_the_paper() {
        assert_eq!(DenseNetConfig::densenet121().num_features(), 1024);
        assert_eq!(DenseNetConfig::densenet161().num_features(), 2208);
        assert_eq!(DenseNetConfig::densenet169().num_features(), 1664);
        assert_eq!(DenseNetConfig::densenet201().num_features(), 1920);
    }

    #[test]
    fn densenet121_forward_shape() {
        let device = Default::default();
        let model = DenseNetConfig::densenet121()
            .with_num_classes(10)
            .init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 64, 64],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = model.forward(input);

        assert_eq!(output.dims(), [1, 10]);
    }

    #[test]
    fn densenet121_feature_map_shape() {
        let device = Default::default();
        let model = DenseNetConfig::densenet121().init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 64, 64],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let features = model.forward_features(input);

        // 64 / 4 (stem) / 8 (three transitions) = 2 spatial, 1024 channels.
        assert_eq!(features.dims(), [1, 1024, 2, 2]);
    }

    #[test]
    fn custom_block_config_is_respected() {
        let device = Default::default();
        let config = DenseNetConfig::new()
            .with_block_config(vec![2, 2])
            .with_num_classes(4);
        let model = config.init::<TestBackend>(&device);

        // 64 + 2*32 = 128 -> 64 after transition; 64 + 2*32 = 128 final.
        assert_eq!(model.num_features(), 128);
        assert_eq!(config.num_features(), 128);

        let input = Tensor::<TestBackend, 4>::random(
            [2, 3, 32, 32],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        assert_eq!(model.forward(input).dims(), [2, 4]);
    }
}
