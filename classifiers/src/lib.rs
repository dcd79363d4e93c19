//! Unified classifier interface for the supported CNN architectures.
//!
//! This crate re-exports the individual model crates and provides a common
//! trait so evaluation code can drive any classifier through one signature.

use burn::prelude::*;

pub use densenet::{DenseNet, DenseNetConfig};
pub use mobilenet_v2::{MobileNetV2, MobileNetV2Config};

/// Unified classifier trait.
pub trait Classifier<B: Backend> {
    /// Forward pass through the full network.
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape `[batch_size, channels, height, width]`
    ///
    /// # Returns
    /// Class logits of shape `[batch_size, num_classes]`
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Number of output classes.
    fn num_classes(&self) -> usize;
}

impl<B: Backend> Classifier<B> for MobileNetV2<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(input)
    }

    fn num_classes(&self) -> usize {
        self.num_classes()
    }
}

impl<B: Backend> Classifier<B> for DenseNet<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(input)
    }

    fn num_classes(&self) -> usize {
        self.num_classes()
    }
}
