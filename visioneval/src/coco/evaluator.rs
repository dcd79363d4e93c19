//! Seam to the external COCO-style evaluator.

use std::path::Path;

use crate::coco::{annotations::CocoAnnotations, IouType};
use crate::error::VisionEvalResult;

/// A COCO-style detection/segmentation evaluator.
///
/// [`super::EvalCocoMetric::evaluate`] drives implementations through the
/// standard pipeline: load the serialized predictions, match them against
/// the ground truth, accumulate precision/recall tables, and summarize into
/// the fixed list of AP/AR statistics. Reproducing the matching and
/// accumulation math is explicitly out of scope for this crate; the trait
/// exists so any implementation (an FFI binding, a native port, a test stub)
/// can slot in.
pub trait CocoEvaluator {
    /// Load the serialized predictions written by the accumulator.
    fn load_results(
        &mut self,
        ground_truth: &CocoAnnotations,
        results_file: &Path,
        iou_type: IouType,
    ) -> VisionEvalResult<()>;

    /// Match predictions against ground truth per image and category.
    fn evaluate(&mut self) -> VisionEvalResult<()>;

    /// Accumulate per-image matches into precision/recall tables.
    fn accumulate(&mut self) -> VisionEvalResult<()>;

    /// Produce the standard summary statistics (AP and AR at the usual IoU
    /// thresholds and object scales) as a flat list.
    fn summarize(&mut self) -> VisionEvalResult<Vec<f64>>;
}
