//! MobileNetV2 building blocks: ConvBnRelu6 and InvertedResidual.

use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d,
    },
    prelude::*,
};
use burn_extra_ops::Relu6;

pub(crate) fn conv_initializer() -> Initializer {
    Initializer::KaimingUniform {
        gain: SQRT_2,
        fan_out_only: false,
    }
}

/// Conv2d + BatchNorm + ReLU6, the basic unit of MobileNetV2.
///
/// Padding is `(kernel_size - 1) / 2`, so spatial size is preserved for
/// stride 1 and halved for stride 2. `groups == in_channels` gives the
/// depthwise variant.
#[derive(Module, Debug)]
pub struct ConvBnRelu6<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu6: Relu6,
}

impl<B: Backend> ConvBnRelu6<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        groups: usize,
        device: &Device<B>,
    ) -> Self {
        let padding = (kernel_size - 1) / 2;

        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_groups(groups)
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);

        Self {
            conv,
            bn,
            relu6: Relu6::new(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(input);
        let out = self.bn.forward(out);
        self.relu6.forward(out)
    }
}

/// Inverted residual block with linear bottleneck.
/// Derived from the MobileNetV2 paper (expansion -> depthwise -> projection).
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    /// 1x1 pointwise expansion, absent when `expand_ratio == 1`.
    expand: Option<ConvBnRelu6<B>>,
    /// 3x3 depthwise conv.
    depthwise: ConvBnRelu6<B>,
    /// 1x1 pointwise projection (linear, no activation).
    project_conv: Conv2d<B>,
    project_bn: BatchNorm<B, 2>,
    use_shortcut: bool,
}

impl<B: Backend> InvertedResidual<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        expand_ratio: usize,
        device: &Device<B>,
    ) -> Self {
        let hidden_channels = in_channels * expand_ratio;
        let use_shortcut = stride == 1 && in_channels == out_channels;

        let expand = (expand_ratio != 1)
            .then(|| ConvBnRelu6::new(in_channels, hidden_channels, 1, 1, 1, device));

        let depthwise = ConvBnRelu6::new(
            hidden_channels,
            hidden_channels,
            3,
            stride,
            hidden_channels,
            device,
        );

        let project_conv = Conv2dConfig::new([hidden_channels, out_channels], [1, 1])
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);
        let project_bn = BatchNormConfig::new(out_channels).init(device);

        Self {
            expand,
            depthwise,
            project_conv,
            project_bn,
            use_shortcut,
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = input.clone();

        let out = match &self.expand {
            Some(expand) => expand.forward(input),
            None => input,
        };
        let out = self.depthwise.forward(out);
        let out = self.project_conv.forward(out);
        let out = self.project_bn.forward(out);

        if self.use_shortcut {
            identity + out
        } else {
            out
        }
    }
}
