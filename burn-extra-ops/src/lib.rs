//! Additional operations for the Burn deep learning framework
//!
//! This crate provides operations that are commonly used in deep learning but are not
//! yet available in the core Burn framework.

mod one_hot;
mod relu6;

// Convenient re-exports
pub use one_hot::one_hot_4d;
pub use relu6::Relu6;
