//! Streaming metric accumulators for semantic-segmentation evaluation.
//!
//! Both accumulators follow the same lifecycle: created once per evaluation
//! run, fed one batch at a time through `update`, read through
//! `compute`/`value`, and explicitly `reset` before reuse. Neither is
//! internally synchronized; distributed evaluation merges per-worker state
//! through `merge` before reading.

pub mod confusion_matrix;
pub mod dice;

pub use confusion_matrix::ConfusionMatrix;
pub use dice::DiceCoefficient;
