//! Evaluation utilities for CNN detection and segmentation models.
//!
//! This crate provides the evaluation side of a Burn-based vision stack:
//!
//! - [`metrics::ConfusionMatrix`] and [`metrics::DiceCoefficient`], streaming
//!   accumulators for semantic-segmentation evaluation;
//! - [`coco::EvalCocoMetric`], which assembles per-image detection or
//!   instance-segmentation predictions into the COCO results format and
//!   drives an external [`coco::CocoEvaluator`];
//! - [`losses::dice`], the Dice coefficient/loss helpers the accumulators
//!   build on.
//!
//! The model architectures themselves live in the `classifiers` workspace
//! crates and are re-exported here for convenience.

pub mod coco;
#[cfg(feature = "dataset")]
pub mod dataset;
pub mod error;
pub mod losses;
pub mod metrics;

pub use coco::{CocoAnnotations, CocoEvaluator, EvalCocoMetric, EvalTarget, IouType, Prediction};
pub use error::{VisionEvalError, VisionEvalResult};
pub use metrics::{ConfusionMatrix, DiceCoefficient};

pub use classifiers::{Classifier, DenseNet, DenseNetConfig, MobileNetV2, MobileNetV2Config};
