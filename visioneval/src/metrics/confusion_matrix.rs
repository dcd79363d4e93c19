//! Class-confusion matrix accumulator.

use std::fmt;

use burn::prelude::*;

use crate::error::{VisionEvalError, VisionEvalResult};

/// Streaming confusion-matrix accumulator for semantic segmentation.
///
/// Accumulates a `C x C` count matrix indexed `[true_class][predicted_class]`
/// across mini-batches and derives global accuracy, per-class accuracy, and
/// per-class IoU from it. Ground-truth labels outside `[0, num_classes)` are
/// treated as ignore labels and silently excluded, so the matrix total always
/// equals the number of valid label/prediction pairs observed since the last
/// reset.
///
/// The derived statistics are not guarded against division by zero: a class
/// that never occurs yields NaN accuracy/IoU, and NaN shows up as such in
/// the [`fmt::Display`] report. Callers that want a different policy can
/// filter the vectors.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    num_classes: usize,
    /// Row-major `C x C` counts; allocated lazily on the first update.
    mat: Option<Vec<i64>>,
}

impl ConfusionMatrix {
    /// Create an accumulator for `num_classes` classes.
    pub const fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            mat: None,
        }
    }

    /// Number of classes this matrix tracks.
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Total number of counted pairs since the last reset.
    pub fn total(&self) -> i64 {
        self.mat
            .as_ref()
            .map(|mat| mat.iter().sum())
            .unwrap_or_default()
    }

    /// Accumulate one batch of flat label pairs.
    ///
    /// `targets` and `predictions` are equal-length rank-1 integer tensors,
    /// already flattened over batch and spatial dimensions. Pairs whose
    /// ground-truth label is out of range are dropped (ignore-label masking,
    /// not an error); predictions are range-checked as well so a malformed
    /// input cannot index outside the matrix.
    pub fn update<B: Backend>(
        &mut self,
        targets: Tensor<B, 1, Int>,
        predictions: Tensor<B, 1, Int>,
    ) {
        let n = self.num_classes;
        let mat = self.mat.get_or_insert_with(|| vec![0; n * n]);

        let targets: Vec<i64> = targets.into_data().iter::<i64>().collect();
        let predictions: Vec<i64> = predictions.into_data().iter::<i64>().collect();

        for (&target, &prediction) in targets.iter().zip(predictions.iter()) {
            if (0..n as i64).contains(&target) && (0..n as i64).contains(&prediction) {
                mat[target as usize * n + prediction as usize] += 1;
            }
        }
    }

    /// Derive `(global_accuracy, per_class_accuracy, per_class_iou)`.
    ///
    /// Fails with [`VisionEvalError::EmptyConfusionMatrix`] when called
    /// before any `update`. On an allocated matrix the divisions are not
    /// guarded: an all-zero matrix yields NaN global accuracy, an empty row
    /// NaN for that class.
    pub fn compute(&self) -> VisionEvalResult<(f64, Vec<f64>, Vec<f64>)> {
        let mat = self
            .mat
            .as_ref()
            .ok_or(VisionEvalError::EmptyConfusionMatrix)?;
        let n = self.num_classes;

        let total: i64 = mat.iter().sum();
        let mut diagonal: i64 = 0;
        let mut accuracy = Vec::with_capacity(n);
        let mut iou = Vec::with_capacity(n);

        for i in 0..n {
            let hit = mat[i * n + i];
            let row: i64 = mat[i * n..(i + 1) * n].iter().sum();
            let col: i64 = (0..n).map(|r| mat[r * n + i]).sum();

            diagonal += hit;
            accuracy.push(hit as f64 / row as f64);
            iou.push(hit as f64 / (row + col - hit) as f64);
        }

        Ok((diagonal as f64 / total as f64, accuracy, iou))
    }

    /// Zero the matrix in place. No-op when nothing has been accumulated yet.
    pub fn reset(&mut self) {
        if let Some(mat) = &mut self.mat {
            mat.fill(0);
        }
    }

    /// Fold another worker's matrix into this one (element-wise addition).
    pub fn merge(&mut self, other: &Self) -> VisionEvalResult<()> {
        if other.num_classes != self.num_classes {
            return Err(VisionEvalError::InvalidInput {
                reason: format!(
                    "cannot merge confusion matrices with {} and {} classes",
                    self.num_classes, other.num_classes
                ),
            });
        }

        if let Some(theirs) = &other.mat {
            let n = self.num_classes;
            let mat = self.mat.get_or_insert_with(|| vec![0; n * n]);
            for (mine, their) in mat.iter_mut().zip(theirs.iter()) {
                *mine += their;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok((global, accuracy, iou)) = self.compute() else {
            return write!(f, "confusion matrix: no samples");
        };

        let percent_list = |values: &[f64]| {
            values
                .iter()
                .map(|value| format!("{:.1}", value * 100.0))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mean_iou = iou.iter().sum::<f64>() / iou.len() as f64;

        write!(
            f,
            "global correct: {:.1}\n\
             average row correct: [{}]\n\
             IoU: [{}]\n\
             mean IoU: {:.1}",
            global * 100.0,
            percent_list(&accuracy),
            percent_list(&iou),
            mean_iou * 100.0
        )
    }
}
