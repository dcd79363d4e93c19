//! Serialized result records in the COCO results format.

use serde::{Deserialize, Serialize};

/// A run-length-encoded binary mask in COCO's compressed string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RleMask {
    /// Mask dimensions as `[height, width]`.
    pub size: [usize; 2],
    /// Compressed run counts, already decoded to text for JSON serialization.
    pub counts: String,
}

/// One predicted object instance, as consumed by a COCO-style evaluator.
///
/// Detection results carry `bbox` (`[x, y, width, height]`), segmentation
/// results carry `segmentation`; the unused field is omitted from the JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoResult {
    pub image_id: i64,
    pub category_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<RleMask>,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_record_omits_segmentation() {
        let record = CocoResult {
            image_id: 7,
            category_id: 3,
            bbox: Some([10.0, 20.0, 20.0, 30.0]),
            segmentation: None,
            score: 0.988,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"image_id":7,"category_id":3,"bbox":[10.0,20.0,20.0,30.0],"score":0.988}"#
        );
    }

    #[test]
    fn segmentation_record_round_trips() {
        let record = CocoResult {
            image_id: 1,
            category_id: 2,
            bbox: None,
            segmentation: Some(RleMask {
                size: [2, 2],
                counts: "02".to_owned(),
            }),
            score: 0.5,
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: CocoResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
