//! ReLU6 activation module implementation

use burn::prelude::*;

/// ReLU6 activation: `min(max(x, 0), 6)`.
///
/// Used by mobile architectures (MobileNetV1/V2) to keep activations in a
/// range that survives low-precision inference.
#[derive(Module, Debug, Clone, Default)]
pub struct Relu6;

impl Relu6 {
    /// Create new ReLU6 module
    pub const fn new() -> Self {
        Self
    }

    /// Forward pass
    pub fn forward<B: Backend, const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        input.clamp(0.0, 6.0)
    }
}
