//! COCO-format result accumulation for detection and instance segmentation.
//!
//! [`EvalCocoMetric`] reformats per-image predictions into the record format
//! a COCO-style evaluator consumes, deduplicates images across workers and
//! passes, serializes the records to a results file, and drives the external
//! evaluator over it.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    fs::File,
    io::BufWriter,
    path::PathBuf,
};

use burn::prelude::*;

use crate::error::{VisionEvalError, VisionEvalResult};

pub mod annotations;
pub mod evaluator;
pub mod mask;
pub mod records;

pub use annotations::{CocoAnnotation, CocoAnnotations, CocoCategory, CocoImage};
pub use evaluator::CocoEvaluator;
pub use records::{CocoResult, RleMask};

/// The evaluation mode of a COCO-style evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IouType {
    /// Bounding-box detection.
    Bbox,
    /// Instance segmentation masks.
    Segm,
    /// Keypoint detection. Declared for completeness; no update logic exists
    /// for it.
    Keypoints,
}

impl IouType {
    /// The evaluator-facing name of this mode.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bbox => "bbox",
            Self::Segm => "segm",
            Self::Keypoints => "keypoints",
        }
    }
}

impl fmt::Display for IouType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-image ground-truth context carried alongside a batch of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalTarget {
    pub image_id: i64,
}

/// One image's worth of predictions.
#[derive(Debug, Clone)]
pub struct Prediction<B: Backend> {
    /// Predicted boxes in corner format `[x_min, y_min, x_max, y_max]`,
    /// shape `[num_objects, 4]`.
    pub boxes: Tensor<B, 2>,
    /// Predicted class labels, shape `[num_objects]`.
    pub labels: Tensor<B, 1, Int>,
    /// Confidence scores, shape `[num_objects]`.
    pub scores: Tensor<B, 1>,
    /// Per-instance mask probabilities, shape `[num_objects, height, width]`.
    /// Required for [`IouType::Segm`].
    pub masks: Option<Tensor<B, 3>>,
}

/// Streaming accumulator of COCO-format detection/segmentation results.
///
/// Created once per evaluation run with a reference annotation set, fed one
/// batch of (target, prediction) pairs at a time, and finally handed to an
/// external [`CocoEvaluator`] through [`EvalCocoMetric::evaluate`]. Images
/// already processed are skipped, so feeding overlapping batches (as happens
/// with distributed samplers that pad the last batch) cannot double-count.
#[derive(Debug, Clone)]
pub struct EvalCocoMetric {
    coco_gt: CocoAnnotations,
    iou_type: IouType,
    results_file_name: PathBuf,
    classes_mapping: Option<HashMap<i64, i64>>,
    img_ids: HashSet<i64>,
    results: Vec<Vec<CocoResult>>,
}

impl EvalCocoMetric {
    /// Create an accumulator. `coco_gt` is cloned and never mutated.
    pub fn new(
        coco_gt: &CocoAnnotations,
        iou_type: IouType,
        results_file_name: impl Into<PathBuf>,
    ) -> Self {
        Self {
            coco_gt: coco_gt.clone(),
            iou_type,
            results_file_name: results_file_name.into(),
            classes_mapping: None,
            img_ids: HashSet::new(),
            results: Vec::new(),
        }
    }

    /// Remap contiguous training-time class indices to the dataset's original
    /// category ids.
    pub fn with_classes_mapping(mut self, mapping: HashMap<i64, i64>) -> Self {
        self.classes_mapping = Some(mapping);
        self
    }

    /// The configured evaluation mode.
    pub const fn iou_type(&self) -> IouType {
        self.iou_type
    }

    /// The accumulated per-image record lists, in processing order.
    pub fn results(&self) -> &[Vec<CocoResult>] {
        &self.results
    }

    /// Whether an image has already contributed results.
    pub fn contains_image(&self, image_id: i64) -> bool {
        self.img_ids.contains(&image_id)
    }

    /// Accumulate one batch of per-image predictions.
    ///
    /// Images with zero predictions and images already processed are
    /// silently skipped. Fails when the configured IoU type has no update
    /// logic (keypoints) or when segmentation mode is driven without masks.
    pub fn update<B: Backend>(
        &mut self,
        targets: &[EvalTarget],
        outputs: &[Prediction<B>],
    ) -> VisionEvalResult<()> {
        match self.iou_type {
            IouType::Bbox => self.prepare_for_detection(targets, outputs),
            IouType::Segm => self.prepare_for_segmentation(targets, outputs),
            other => Err(VisionEvalError::UnsupportedIouType {
                iou_type: other.to_string(),
            }),
        }
    }

    /// Reformat detection outputs into COCO records.
    fn prepare_for_detection<B: Backend>(
        &mut self,
        targets: &[EvalTarget],
        outputs: &[Prediction<B>],
    ) -> VisionEvalResult<()> {
        for (target, output) in targets.iter().zip(outputs.iter()) {
            let count = output.labels.dims()[0];
            if count == 0 {
                continue;
            }
            if self.img_ids.contains(&target.image_id) {
                continue;
            }
            self.img_ids.insert(target.image_id);

            let boxes: Vec<f64> = output.boxes.clone().into_data().iter::<f64>().collect();
            let labels: Vec<i64> = output.labels.clone().into_data().iter::<i64>().collect();
            let scores: Vec<f64> = output.scores.clone().into_data().iter::<f64>().collect();

            let mut records = Vec::with_capacity(count);
            for i in 0..count {
                let (x_min, y_min) = (boxes[4 * i], boxes[4 * i + 1]);
                let (x_max, y_max) = (boxes[4 * i + 2], boxes[4 * i + 3]);
                // Corner format -> COCO [x, y, width, height]. Coordinates are
                // rounded to hundredths to keep the results file small.
                let bbox = [
                    round_to(x_min, 2),
                    round_to(y_min, 2),
                    round_to(x_max - x_min, 2),
                    round_to(y_max - y_min, 2),
                ];

                records.push(CocoResult {
                    image_id: target.image_id,
                    category_id: self.map_category(labels[i])?,
                    bbox: Some(bbox),
                    segmentation: None,
                    score: round_to(scores[i], 3),
                });
            }
            self.results.push(records);
        }
        Ok(())
    }

    /// Reformat instance-segmentation outputs into COCO records.
    fn prepare_for_segmentation<B: Backend>(
        &mut self,
        targets: &[EvalTarget],
        outputs: &[Prediction<B>],
    ) -> VisionEvalResult<()> {
        for (target, output) in targets.iter().zip(outputs.iter()) {
            let count = output.labels.dims()[0];
            if count == 0 {
                continue;
            }
            if self.img_ids.contains(&target.image_id) {
                continue;
            }

            let masks = output
                .masks
                .as_ref()
                .ok_or_else(|| VisionEvalError::InvalidInput {
                    reason: format!(
                        "segm evaluation requires masks for image {}",
                        target.image_id
                    ),
                })?;
            self.img_ids.insert(target.image_id);

            let [_, height, width] = masks.dims();
            let binary: Vec<bool> = masks
                .clone()
                .greater_elem(0.5)
                .into_data()
                .iter::<bool>()
                .collect();
            let labels: Vec<i64> = output.labels.clone().into_data().iter::<i64>().collect();
            let scores: Vec<f64> = output.scores.clone().into_data().iter::<f64>().collect();

            let mut records = Vec::with_capacity(count);
            for i in 0..count {
                let plane = &binary[i * height * width..(i + 1) * height * width];
                let rle = mask::encode(plane, height, width)?;

                records.push(CocoResult {
                    image_id: target.image_id,
                    category_id: self.map_category(labels[i])?,
                    bbox: None,
                    segmentation: Some(rle),
                    score: round_to(scores[i], 3),
                });
            }
            self.results.push(records);
        }
        Ok(())
    }

    fn map_category(&self, label: i64) -> VisionEvalResult<i64> {
        match &self.classes_mapping {
            Some(mapping) => {
                mapping
                    .get(&label)
                    .copied()
                    .ok_or_else(|| VisionEvalError::InvalidInput {
                        reason: format!("no category mapping for label {label}"),
                    })
            }
            None => Ok(label),
        }
    }

    /// Serialize the accumulated records (flattened) to the results file.
    pub fn write_results(&self) -> VisionEvalResult<()> {
        let flattened: Vec<&CocoResult> = self.results.iter().flatten().collect();

        let file =
            File::create(&self.results_file_name).map_err(|source| VisionEvalError::Io {
                path: self.results_file_name.clone(),
                source,
            })?;
        serde_json::to_writer(BufWriter::new(file), &flattened)?;
        Ok(())
    }

    /// Write the results file and drive the external evaluator over it.
    ///
    /// Returns the evaluator's summary statistics (AP/AR at the standard IoU
    /// thresholds and scales) as a flat list.
    pub fn evaluate<E: CocoEvaluator>(&mut self, evaluator: &mut E) -> VisionEvalResult<Vec<f64>> {
        self.write_results()?;

        evaluator.load_results(&self.coco_gt, &self.results_file_name, self.iou_type)?;
        evaluator.evaluate()?;
        evaluator.accumulate()?;
        evaluator.summarize()
    }

    /// Fold another worker's accumulated results into this one. Images this
    /// accumulator has already seen keep their first-seen records.
    pub fn merge(&mut self, other: Self) -> VisionEvalResult<()> {
        if other.iou_type != self.iou_type {
            return Err(VisionEvalError::InvalidInput {
                reason: format!(
                    "cannot merge {} results into a {} accumulator",
                    other.iou_type, self.iou_type
                ),
            });
        }

        for records in other.results {
            let Some(image_id) = records.first().map(|record| record.image_id) else {
                continue;
            };
            if self.img_ids.insert(image_id) {
                self.results.push(records);
            }
        }
        Ok(())
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn prediction(
        boxes: Vec<[f32; 4]>,
        labels: Vec<i64>,
        scores: Vec<f32>,
    ) -> Prediction<TestBackend> {
        let device = Default::default();
        let count = labels.len();
        let flat_boxes: Vec<f32> = boxes.into_iter().flatten().collect();
        Prediction {
            boxes: Tensor::from_data(TensorData::new(flat_boxes, [count, 4]), &device),
            labels: Tensor::from_data(TensorData::new(labels, [count]), &device),
            scores: Tensor::from_data(TensorData::new(scores, [count]), &device),
            masks: None,
        }
    }

    fn flattened(metric: &EvalCocoMetric) -> Vec<&CocoResult> {
        metric.results().iter().flatten().collect()
    }

    #[test]
    fn bbox_conversion_corner_to_xywh() {
        let mut metric =
            EvalCocoMetric::new(&CocoAnnotations::default(), IouType::Bbox, "results.json");
        metric
            .update(
                &[EvalTarget { image_id: 1 }],
                &[prediction(vec![[10.0, 20.0, 30.0, 50.0]], vec![3], vec![0.9])],
            )
            .unwrap();

        let records = flattened(&metric);
        assert_eq!(records[0].bbox, Some([10.0, 20.0, 20.0, 30.0]));
        assert_eq!(records[0].category_id, 3);
    }

    #[test]
    fn coordinates_and_scores_are_rounded() {
        let mut metric =
            EvalCocoMetric::new(&CocoAnnotations::default(), IouType::Bbox, "results.json");
        metric
            .update(
                &[EvalTarget { image_id: 1 }],
                &[prediction(
                    vec![[12.3456, 0.0, 14.0, 1.0]],
                    vec![1],
                    vec![0.987_654],
                )],
            )
            .unwrap();

        let records = flattened(&metric);
        let bbox = records[0].bbox.unwrap();
        assert_eq!(bbox[0], 12.35);
        assert_eq!(records[0].score, 0.988);
    }

    #[test]
    fn duplicate_image_ids_keep_first_seen_results() {
        let mut metric =
            EvalCocoMetric::new(&CocoAnnotations::default(), IouType::Bbox, "results.json");

        metric
            .update(
                &[EvalTarget { image_id: 7 }],
                &[prediction(vec![[0.0, 0.0, 10.0, 10.0]], vec![1], vec![0.9])],
            )
            .unwrap();
        metric
            .update(
                &[EvalTarget { image_id: 7 }],
                &[prediction(vec![[5.0, 5.0, 20.0, 20.0]], vec![2], vec![0.8])],
            )
            .unwrap();

        let records = flattened(&metric);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].bbox, Some([0.0, 0.0, 10.0, 10.0]));
    }

    #[test]
    fn images_without_predictions_are_skipped() {
        let mut metric =
            EvalCocoMetric::new(&CocoAnnotations::default(), IouType::Bbox, "results.json");
        metric
            .update(&[EvalTarget { image_id: 4 }], &[prediction(vec![], vec![], vec![])])
            .unwrap();

        assert!(metric.results().is_empty());
        assert!(!metric.contains_image(4));
    }

    #[test]
    fn keypoints_update_is_unsupported() {
        let mut metric = EvalCocoMetric::new(
            &CocoAnnotations::default(),
            IouType::Keypoints,
            "results.json",
        );
        let error = metric
            .update(
                &[EvalTarget { image_id: 1 }],
                &[prediction(vec![[0.0, 0.0, 1.0, 1.0]], vec![1], vec![0.5])],
            )
            .unwrap_err();

        assert!(matches!(
            error,
            VisionEvalError::UnsupportedIouType { ref iou_type } if iou_type == "keypoints"
        ));
    }

    #[test]
    fn classes_mapping_remaps_category_ids() {
        let mapping = HashMap::from([(1i64, 17i64)]);
        let mut metric =
            EvalCocoMetric::new(&CocoAnnotations::default(), IouType::Bbox, "results.json")
                .with_classes_mapping(mapping);

        metric
            .update(
                &[EvalTarget { image_id: 1 }],
                &[prediction(vec![[0.0, 0.0, 1.0, 1.0]], vec![1], vec![0.5])],
            )
            .unwrap();
        assert_eq!(flattened(&metric)[0].category_id, 17);

        // An unmapped label is a configuration error, not a silent pass-through.
        let result = metric.update(
            &[EvalTarget { image_id: 2 }],
            &[prediction(vec![[0.0, 0.0, 1.0, 1.0]], vec![9], vec![0.5])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn segmentation_mode_encodes_masks() {
        let device = Default::default();
        let mut metric =
            EvalCocoMetric::new(&CocoAnnotations::default(), IouType::Segm, "results.json");

        // One 2x2 instance mask: probabilities above 0.5 only on the left
        // column.
        let masks = Tensor::<TestBackend, 3>::from_data([[[0.9f32, 0.1], [0.8, 0.2]]], &device);
        let output = Prediction {
            boxes: Tensor::from_data(TensorData::new(vec![0.0f32; 4], [1, 4]), &device),
            labels: Tensor::from_data(TensorData::new(vec![2i64], [1]), &device),
            scores: Tensor::from_data(TensorData::new(vec![0.75f32], [1]), &device),
            masks: Some(masks),
        };

        metric
            .update(&[EvalTarget { image_id: 3 }], &[output])
            .unwrap();

        let records = flattened(&metric);
        let rle = records[0].segmentation.as_ref().unwrap();
        assert_eq!(rle.size, [2, 2]);
        assert_eq!(
            mask::decode(rle),
            vec![true, false, true, false],
            "left column set, right column clear"
        );
        assert!(records[0].bbox.is_none());
    }

    #[test]
    fn segmentation_mode_requires_masks() {
        let mut metric =
            EvalCocoMetric::new(&CocoAnnotations::default(), IouType::Segm, "results.json");
        let result = metric.update(
            &[EvalTarget { image_id: 1 }],
            &[prediction(vec![[0.0, 0.0, 1.0, 1.0]], vec![1], vec![0.5])],
        );

        assert!(matches!(result, Err(VisionEvalError::InvalidInput { .. })));
        assert!(!metric.contains_image(1));
    }

    #[test]
    fn merge_concatenates_unseen_images() {
        let gt = CocoAnnotations::default();
        let mut left = EvalCocoMetric::new(&gt, IouType::Bbox, "results.json");
        left.update(
            &[EvalTarget { image_id: 1 }],
            &[prediction(vec![[0.0, 0.0, 1.0, 1.0]], vec![1], vec![0.5])],
        )
        .unwrap();

        let mut right = EvalCocoMetric::new(&gt, IouType::Bbox, "results.json");
        right
            .update(
                &[EvalTarget { image_id: 1 }, EvalTarget { image_id: 2 }],
                &[
                    prediction(vec![[9.0, 9.0, 10.0, 10.0]], vec![1], vec![0.4]),
                    prediction(vec![[2.0, 2.0, 4.0, 4.0]], vec![1], vec![0.6]),
                ],
            )
            .unwrap();

        left.merge(right).unwrap();
        let records = flattened(&left);
        // Image 1 keeps the left worker's record; image 2 arrives from the
        // right worker.
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bbox, Some([0.0, 0.0, 1.0, 1.0]));
        assert_eq!(records[1].image_id, 2);

        let segm = EvalCocoMetric::new(&gt, IouType::Segm, "results.json");
        assert!(left.merge(segm).is_err());
    }

    mod evaluate {
        use super::*;
        use std::path::Path;

        /// Recording stub standing in for the external evaluator.
        #[derive(Default)]
        struct StubEvaluator {
            calls: Vec<&'static str>,
            loaded: Vec<CocoResult>,
        }

        impl CocoEvaluator for StubEvaluator {
            fn load_results(
                &mut self,
                _ground_truth: &CocoAnnotations,
                results_file: &Path,
                _iou_type: IouType,
            ) -> VisionEvalResult<()> {
                self.calls.push("load_results");
                let data = std::fs::read(results_file).map_err(|source| VisionEvalError::Io {
                    path: results_file.to_path_buf(),
                    source,
                })?;
                self.loaded = serde_json::from_slice(&data)?;
                Ok(())
            }

            fn evaluate(&mut self) -> VisionEvalResult<()> {
                self.calls.push("evaluate");
                Ok(())
            }

            fn accumulate(&mut self) -> VisionEvalResult<()> {
                self.calls.push("accumulate");
                Ok(())
            }

            fn summarize(&mut self) -> VisionEvalResult<Vec<f64>> {
                self.calls.push("summarize");
                Ok(vec![0.5; 12])
            }
        }

        #[test]
        fn evaluate_writes_results_and_drives_the_pipeline() {
            let dir = std::env::temp_dir().join("visioneval-coco-eval-test");
            std::fs::create_dir_all(&dir).unwrap();
            let results_file = dir.join("predict_results.json");

            let mut metric =
                EvalCocoMetric::new(&CocoAnnotations::default(), IouType::Bbox, &results_file);
            metric
                .update(
                    &[EvalTarget { image_id: 1 }, EvalTarget { image_id: 2 }],
                    &[
                        prediction(vec![[0.0, 0.0, 2.0, 2.0]], vec![1], vec![0.9]),
                        prediction(
                            vec![[1.0, 1.0, 3.0, 3.0], [0.0, 0.0, 1.0, 1.0]],
                            vec![2, 3],
                            vec![0.8, 0.7],
                        ),
                    ],
                )
                .unwrap();

            let mut evaluator = StubEvaluator::default();
            let stats = metric.evaluate(&mut evaluator).unwrap();

            assert_eq!(stats.len(), 12);
            assert_eq!(
                evaluator.calls,
                vec!["load_results", "evaluate", "accumulate", "summarize"]
            );
            // The file holds the flattened records: 1 + 2 across two images.
            assert_eq!(evaluator.loaded.len(), 3);
            assert_eq!(evaluator.loaded[1].image_id, 2);

            std::fs::remove_file(&results_file).ok();
        }
    }
}
