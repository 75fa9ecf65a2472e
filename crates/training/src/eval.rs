//! Checkpoint evaluation over a class-folder directory.

use crate::checkpoint::{load_model_from_checkpoint, CheckpointMeta};
use crate::fit::{count_correct, scalar_f32, validate_backend_choice, BackendKind};
use crate::TrainBackend;
use anyhow::{anyhow, bail, Context};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::backend::Backend;
use clap::Parser;
use folder_dataset::{index_classes, BatchIter, LoaderConfig, TransformPipeline};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(
    name = "eval",
    about = "Evaluate a saved checkpoint on a class-folder image directory (avg loss/accuracy)"
)]
pub struct EvalArgs {
    /// Directory of class subfolders to evaluate (held-out or generated images).
    #[arg(long, default_value = "data/faces/val")]
    pub data_dir: String,
    /// Checkpoint directory produced by the train binary.
    #[arg(long, default_value = "checkpoints/face_classifier")]
    pub checkpoint: String,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Batch size.
    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,
    /// Decode worker pool size.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,
    /// Print predicted vs. actual class names for the first N samples.
    #[arg(long, default_value_t = 0)]
    pub preview: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct EvalReport {
    pub average_loss: f64,
    pub accuracy: f64,
    pub samples: usize,
}

/// Load the checkpoint and compute average loss and accuracy over the
/// directory, using the inference transform recipe and a fixed sample order.
pub fn run_eval(args: &EvalArgs) -> anyhow::Result<EvalReport> {
    validate_backend_choice(args.backend)?;

    let ckpt_dir = Path::new(&args.checkpoint);
    let meta = CheckpointMeta::load(ckpt_dir)?;

    let data_dir = Path::new(&args.data_dir);
    let (indices, classes) = index_classes(data_dir)
        .with_context(|| format!("indexing evaluation images at {}", data_dir.display()))?;
    if classes.len() != meta.num_classes {
        bail!(
            "checkpoint was trained on {} classes but {} contains {} ({:?})",
            meta.num_classes,
            data_dir.display(),
            classes.len(),
            classes.names()
        );
    }

    let device = <TrainBackend as Backend>::Device::default();
    let model = load_model_from_checkpoint(ckpt_dir, meta.num_classes, &device)
        .map_err(|e| anyhow!("failed to load checkpoint at {}: {e}", ckpt_dir.display()))?;
    let loss_fn = CrossEntropyLossConfig::new().init(&device);

    let cfg = LoaderConfig {
        batch_size: args.batch_size,
        shuffle: false,
        seed: None,
        workers: args.workers,
        drop_last: false,
        permissive: true,
        transform: TransformPipeline::infer(),
    };
    let mut iter = BatchIter::new(indices, cfg)?;

    let mut metrics = crate::fit::PhaseMetrics::default();
    let mut previewed = 0usize;
    while let Some(batch) = iter.next_batch::<TrainBackend>(&device)? {
        let targets = batch.targets;
        let batch_len = targets.dims()[0];
        let logits = model.forward(batch.images);
        let loss = loss_fn.forward(logits.clone(), targets.clone());

        if previewed < args.preview {
            let preds: Vec<f32> = logits
                .clone()
                .argmax(1)
                .reshape([batch_len])
                .float()
                .into_data()
                .to_vec()
                .unwrap_or_default();
            let actual: Vec<f32> = targets
                .clone()
                .float()
                .into_data()
                .to_vec()
                .unwrap_or_default();
            for (p, t) in preds.iter().zip(actual.iter()) {
                if previewed >= args.preview {
                    break;
                }
                let predicted = meta
                    .classes
                    .get(*p as usize)
                    .map(String::as_str)
                    .unwrap_or("?");
                let actual = classes.name(*t as usize).unwrap_or("?");
                println!("predicted: {predicted} actual: {actual}");
                previewed += 1;
            }
        }

        metrics.record(scalar_f32(loss), count_correct(logits, targets), batch_len);
    }

    Ok(EvalReport {
        average_loss: metrics.average_loss(),
        accuracy: metrics.accuracy(),
        samples: metrics.seen,
    })
}
