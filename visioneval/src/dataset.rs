//! Label-map dataset for driving the segmentation accumulators from disk.
//!
//! Pairs a directory of predicted label maps with a directory of
//! ground-truth label maps by file name. Label maps are 8-bit grayscale
//! images whose pixel values are class ids (255 conventionally marking
//! ignored pixels).

use std::path::{Path, PathBuf};

use burn::data::dataset::Dataset;
use burn::prelude::*;
use walkdir::WalkDir;

use crate::error::{VisionEvalError, VisionEvalResult};

/// One prediction/ground-truth label-map pair.
#[derive(Debug, Clone)]
pub struct LabelMapPair {
    /// File name shared by both maps.
    pub name: String,
    /// Path to the predicted label map.
    pub prediction: PathBuf,
    /// Path to the ground-truth label map.
    pub ground_truth: PathBuf,
}

/// Dataset of label-map pairs discovered on disk.
pub struct LabelMapDataset {
    items: Vec<LabelMapPair>,
}

impl LabelMapDataset {
    /// Discover pairs: every ground-truth image must have a same-named file
    /// in the prediction directory.
    pub fn from_dirs(
        prediction_dir: impl AsRef<Path>,
        ground_truth_dir: impl AsRef<Path>,
    ) -> VisionEvalResult<Self> {
        let prediction_dir = prediction_dir.as_ref();
        let mut items = Vec::new();

        for entry in WalkDir::new(ground_truth_dir).sort_by_file_name() {
            let entry = entry.map_err(|error| VisionEvalError::Dataset {
                message: format!("failed to walk ground-truth directory: {error}"),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let prediction = prediction_dir.join(&name);
            if !prediction.is_file() {
                return Err(VisionEvalError::Dataset {
                    message: format!("no prediction found for {name}"),
                });
            }

            items.push(LabelMapPair {
                name,
                prediction,
                ground_truth: entry.into_path(),
            });
        }

        Ok(Self { items })
    }
}

impl Dataset<LabelMapPair> for LabelMapDataset {
    fn get(&self, index: usize) -> Option<LabelMapPair> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Load an 8-bit grayscale label map as a `[height, width]` integer tensor.
pub fn load_label_map<B: Backend>(
    path: &Path,
    device: &Device<B>,
) -> VisionEvalResult<Tensor<B, 2, Int>> {
    let image = image::open(path)
        .map_err(|error| VisionEvalError::Dataset {
            message: format!("failed to decode {}: {error}", path.display()),
        })?
        .to_luma8();

    let (width, height) = image.dimensions();
    let labels: Vec<i64> = image.pixels().map(|pixel| i64::from(pixel.0[0])).collect();

    Ok(Tensor::from_data(
        TensorData::new(labels, [height as usize, width as usize]),
        device,
    ))
}
