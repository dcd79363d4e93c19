//! Reference annotation set in the standard COCO schema.
//!
//! Consumed read-only: the accumulator clones it at construction and hands
//! it to the external evaluator unchanged.

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{VisionEvalError, VisionEvalResult};

/// An image entry in a COCO annotation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoImage {
    pub id: i64,
    pub width: u32,
    pub height: u32,
    pub file_name: String,
}

/// A ground-truth object annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoAnnotation {
    pub id: i64,
    pub image_id: i64,
    pub category_id: i64,
    /// `[x, y, width, height]`.
    pub bbox: [f64; 4],
    pub area: f64,
    #[serde(default)]
    pub iscrowd: u8,
    /// Polygon or RLE segmentation, kept opaque; only the evaluator
    /// interprets it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<serde_json::Value>,
}

/// A category entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub supercategory: String,
}

/// A COCO-format reference annotation set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CocoAnnotations {
    #[serde(default)]
    pub images: Vec<CocoImage>,
    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
}

impl CocoAnnotations {
    /// Load an annotation set from a COCO JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> VisionEvalResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| VisionEvalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Look up an image entry by id.
    pub fn image(&self, image_id: i64) -> Option<&CocoImage> {
        self.images.iter().find(|image| image.id == image_id)
    }

    /// All category ids, in file order.
    pub fn category_ids(&self) -> Vec<i64> {
        self.categories.iter().map(|category| category.id).collect()
    }
}
