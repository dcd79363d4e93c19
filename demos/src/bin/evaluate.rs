//! Evaluation demo driver.
//!
//! ```bash
//! # Segmentation metrics over directories of label maps
//! cargo run --bin evaluate -- segm --predictions pred/ --ground-truth gt/ --num-classes 21
//!
//! # Convert detection dumps into a COCO results file
//! cargo run --bin evaluate -- export-coco detections.json instances_val.json -o results.json
//!
//! # Show backend information
//! cargo run --bin evaluate -- info
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::{data::dataset::Dataset, prelude::*};
use burn_extra_ops::one_hot_4d;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use visioneval_burn::{
    dataset::{load_label_map, LabelMapDataset},
    CocoAnnotations, ConfusionMatrix, DiceCoefficient, EvalCocoMetric, EvalTarget, IouType,
    Prediction,
};
use visioneval_demos::backend::{create_device, get_backend_name, SelectedBackend};

#[derive(Parser)]
#[command(name = "evaluate")]
#[command(about = "Detection and segmentation evaluation demos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute segmentation metrics over directories of label maps
    Segm {
        /// Directory of predicted label maps
        #[arg(short, long)]
        predictions: PathBuf,

        /// Directory of ground-truth label maps
        #[arg(short, long)]
        ground_truth: PathBuf,

        /// Number of classes, background included
        #[arg(long, default_value_t = 21)]
        num_classes: usize,

        /// Label value excluded from the metrics (e.g. 255)
        #[arg(long)]
        ignore_index: Option<i64>,
    },

    /// Convert detection dumps into a COCO results file
    ExportCoco {
        /// Detection dump (JSON array of per-image predictions)
        detections: PathBuf,

        /// COCO annotation file of the evaluated split
        annotations: PathBuf,

        /// Output results file
        #[arg(short, long, default_value = "predict_results.json")]
        output: PathBuf,
    },

    /// Show backend information
    Info,
}

/// One image's predictions in the detection dump format.
#[derive(Deserialize)]
struct DetectionDump {
    image_id: i64,
    /// Corner-format boxes `[x_min, y_min, x_max, y_max]`.
    boxes: Vec<[f32; 4]>,
    labels: Vec<i64>,
    scores: Vec<f32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Segm {
            predictions,
            ground_truth,
            num_classes,
            ignore_index,
        } => run_segmentation(&predictions, &ground_truth, num_classes, ignore_index),
        Commands::ExportCoco {
            detections,
            annotations,
            output,
        } => run_export_coco(&detections, &annotations, &output),
        Commands::Info => {
            println!("Backend: {}", get_backend_name());
            println!("Device: {:?}", create_device());
            Ok(())
        }
    }
}

fn run_segmentation(
    predictions: &Path,
    ground_truth: &Path,
    num_classes: usize,
    ignore_index: Option<i64>,
) -> Result<()> {
    let device = create_device();
    let dataset = LabelMapDataset::from_dirs(predictions, ground_truth)
        .context("failed to pair prediction and ground-truth label maps")?;
    tracing::info!(pairs = dataset.len(), "label maps paired");

    let mut confusion = ConfusionMatrix::new(num_classes);
    let mut dice = DiceCoefficient::new(num_classes, ignore_index);

    for index in 0..dataset.len() {
        let pair = dataset.get(index).context("dataset shrank while iterating")?;
        let predicted = load_label_map::<SelectedBackend>(&pair.prediction, &device)?;
        let target = load_label_map::<SelectedBackend>(&pair.ground_truth, &device)?;

        let [height, width] = target.dims();
        confusion.update(
            target.clone().reshape([-1]),
            predicted.clone().reshape([-1]),
        );

        // Label maps carry hard assignments; one-hot them so the Dice
        // accumulator sees them as (degenerate) class probabilities.
        let predicted_scores = one_hot_4d(
            predicted.reshape([1, height as i32, width as i32]),
            num_classes,
        );
        dice.update(
            predicted_scores,
            target.reshape([1, height as i32, width as i32]),
        );

        tracing::debug!(name = %pair.name, "evaluated");
    }

    println!("{confusion}");
    println!("dice coefficient: {:.3}", dice.value());
    Ok(())
}

fn run_export_coco(detections: &Path, annotations: &Path, output: &Path) -> Result<()> {
    let device = create_device();

    let annotations =
        CocoAnnotations::from_file(annotations).context("failed to load reference annotations")?;
    let dumps: Vec<DetectionDump> = serde_json::from_reader(std::io::BufReader::new(
        std::fs::File::open(detections)
            .with_context(|| format!("failed to open {}", detections.display()))?,
    ))?;
    tracing::info!(images = dumps.len(), "detection dumps loaded");

    let mut metric = EvalCocoMetric::new(&annotations, IouType::Bbox, output);
    for dump in &dumps {
        let count = dump.labels.len();
        let boxes: Vec<f32> = dump.boxes.iter().flatten().copied().collect();
        let prediction = Prediction::<SelectedBackend> {
            boxes: Tensor::from_data(TensorData::new(boxes, [count, 4]), &device),
            labels: Tensor::from_data(TensorData::new(dump.labels.clone(), [count]), &device),
            scores: Tensor::from_data(TensorData::new(dump.scores.clone(), [count]), &device),
            masks: None,
        };
        metric.update(
            &[EvalTarget {
                image_id: dump.image_id,
            }],
            &[prediction],
        )?;
    }

    metric.write_results()?;
    let records: usize = metric.results().iter().map(Vec::len).sum();
    tracing::info!(records, output = %output.display(), "results file written");
    println!("wrote {records} records to {}", output.display());
    Ok(())
}
