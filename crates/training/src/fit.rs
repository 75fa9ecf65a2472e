//! The train/validate epoch loop with checkpoint-on-improvement.

use crate::checkpoint::{save_checkpoint, CheckpointMeta};
use crate::{ADBackend, TrainBackend};
use anyhow::{bail, Context};
use burn::module::{AutodiffModule, Module};
use burn::nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig};
use burn::optim::{momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use clap::{Parser, ValueEnum};
use folder_dataset::{index_classes, BatchIter, LoaderConfig, TransformPipeline};
use models::{ExpressionNet, ExpressionNetConfig};
use std::path::Path;
use std::time::Instant;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(Parser, Debug)]
#[command(
    name = "train",
    about = "Fine-tune the expression classifier head on a class-folder dataset"
)]
pub struct TrainArgs {
    /// Dataset root containing train/ and val/ class-folder splits.
    #[arg(long, default_value = "data/faces")]
    pub data_dir: String,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Number of epochs.
    #[arg(long, default_value_t = 25)]
    pub epochs: usize,
    /// Batch size.
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,
    /// Initial learning rate.
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,
    /// SGD momentum.
    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,
    /// Decay the learning rate every this many epochs.
    #[arg(long, default_value_t = 7)]
    pub lr_step_size: usize,
    /// Multiplicative learning-rate decay factor.
    #[arg(long, default_value_t = 0.1)]
    pub lr_gamma: f64,
    /// Decode worker pool size.
    #[arg(long, default_value_t = 8)]
    pub workers: usize,
    /// Seed for shuffling and augmentation.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Checkpoint output directory (overwritten on each improvement).
    #[arg(long, default_value = "checkpoints/face_classifier")]
    pub checkpoint_out: String,
    /// Fine-tune every layer instead of only the classification head.
    #[arg(long)]
    pub train_full: bool,
    /// Pretrained backbone record to start from.
    #[arg(long)]
    pub pretrained: Option<String>,
    /// Head size the pretrained record was saved with.
    #[arg(long, default_value_t = 8)]
    pub pretrained_classes: usize,
}

/// Step decay: lr_at(epoch) = initial * gamma^(epoch / step_size).
#[derive(Debug, Clone, Copy)]
pub struct StepDecay {
    pub initial_lr: f64,
    pub step_size: usize,
    pub gamma: f64,
}

impl StepDecay {
    pub fn new(initial_lr: f64, step_size: usize, gamma: f64) -> Self {
        Self {
            initial_lr,
            step_size,
            gamma,
        }
    }

    pub fn lr_at(&self, epoch: usize) -> f64 {
        if self.step_size == 0 {
            return self.initial_lr;
        }
        self.initial_lr * self.gamma.powi((epoch / self.step_size) as i32)
    }
}

/// Running loss/correct bookkeeping for one phase of one epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhaseMetrics {
    pub loss_sum: f64,
    pub correct: f64,
    pub seen: usize,
}

impl PhaseMetrics {
    pub fn record(&mut self, batch_loss: f32, correct: f32, batch_len: usize) {
        self.loss_sum += batch_loss as f64 * batch_len as f64;
        self.correct += correct as f64;
        self.seen += batch_len;
    }

    /// Loss averaged over samples seen, not batches.
    pub fn average_loss(&self) -> f64 {
        if self.seen == 0 {
            0.0
        } else {
            self.loss_sum / self.seen as f64
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.seen == 0 {
            0.0
        } else {
            self.correct / self.seen as f64
        }
    }
}

pub(crate) fn scalar_f32<B: Backend>(t: Tensor<B, 1>) -> f32 {
    t.into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .first()
        .copied()
        .unwrap_or(0.0)
}

/// Number of rows whose argmax matches the target.
pub(crate) fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> f32 {
    let batch = logits.dims()[0];
    let preds = logits.argmax(1).reshape([batch]);
    scalar_f32(preds.equal(targets).float().sum())
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            println!("note: built with backend-wgpu; training will still use the WGPU backend despite --backend ndarray");
        }
        _ => {}
    }
    Ok(())
}

fn build_model(
    args: &TrainArgs,
    num_classes: usize,
    device: &<ADBackend as Backend>::Device,
) -> anyhow::Result<ExpressionNet<ADBackend>> {
    let model = ExpressionNet::<ADBackend>::new(
        ExpressionNetConfig {
            num_classes: args.pretrained_classes,
            ..Default::default()
        },
        device,
    );
    let model = match &args.pretrained {
        Some(path) => {
            let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
            model
                .load_file(Path::new(path), &recorder, device)
                .map_err(|e| {
                    anyhow::anyhow!("failed to load pretrained weights from {path}: {e}")
                })?
        }
        None => model,
    };
    Ok(model.with_head(num_classes, device))
}

/// Run the full fine-tuning loop: alternate train and validation phases per
/// epoch, and overwrite the checkpoint whenever validation accuracy strictly
/// improves on the best seen so far.
pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    validate_backend_choice(args.backend)?;

    let data_dir = Path::new(&args.data_dir);
    let train_root = data_dir.join("train");
    let val_root = data_dir.join("val");
    let (train_idx, classes) = index_classes(&train_root)
        .with_context(|| format!("indexing training split at {}", train_root.display()))?;
    let (val_idx, val_classes) = index_classes(&val_root)
        .with_context(|| format!("indexing validation split at {}", val_root.display()))?;
    if classes != val_classes {
        bail!(
            "train and val splits disagree on class names: {:?} vs {:?}",
            classes.names(),
            val_classes.names()
        );
    }
    println!("classes: {:?}", classes.names());
    println!(
        "dataset sizes: train={} val={}",
        train_idx.len(),
        val_idx.len()
    );
    println!("train transform: {}", TransformPipeline::train().describe());

    let device = <ADBackend as Backend>::Device::default();
    let mut model = build_model(&args, classes.len(), &device)?;
    let mut optim = SgdConfig::new()
        .with_momentum(Some(MomentumConfig::new().with_momentum(args.momentum)))
        .init();
    let schedule = StepDecay::new(args.lr, args.lr_step_size, args.lr_gamma);
    let train_loss: CrossEntropyLoss<ADBackend> = CrossEntropyLossConfig::new().init(&device);
    let val_loss: CrossEntropyLoss<TrainBackend> = CrossEntropyLossConfig::new().init(&device);

    let ckpt_dir = Path::new(&args.checkpoint_out);
    let mut best_acc = 0.0f64;
    let since = Instant::now();

    for epoch in 0..args.epochs {
        println!("Epoch {}/{}", epoch, args.epochs.saturating_sub(1));
        println!("----------");
        let lr = schedule.lr_at(epoch);

        // Train phase: gradients enabled, fresh shuffle each epoch.
        let train_cfg = LoaderConfig {
            batch_size: args.batch_size,
            shuffle: true,
            seed: args.seed.map(|s| s.wrapping_add(epoch as u64)),
            workers: args.workers,
            drop_last: false,
            permissive: true,
            transform: TransformPipeline::train(),
        };
        let mut iter = BatchIter::new(train_idx.clone(), train_cfg)?;
        let mut metrics = PhaseMetrics::default();
        while let Some(batch) = iter.next_batch::<ADBackend>(&device)? {
            let targets = batch.targets;
            let batch_len = targets.dims()[0];

            let features = model.forward_features(batch.images);
            // Head-only fine-tuning: cut the graph below the classifier.
            let features = if args.train_full {
                features
            } else {
                features.detach()
            };
            let logits = model.classify(features);
            let loss = train_loss.forward(logits.clone(), targets.clone());
            let loss_detached = loss.clone().detach();
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(lr, model, grads);

            metrics.record(
                scalar_f32(loss_detached),
                count_correct(logits.detach(), targets),
                batch_len,
            );
        }
        println!(
            "train Loss: {:.4} Acc: {:.4}",
            metrics.average_loss(),
            metrics.accuracy()
        );

        // Validation phase: no gradients, no augmentation, no shuffle.
        let val_cfg = LoaderConfig {
            batch_size: args.batch_size,
            shuffle: false,
            seed: None,
            workers: args.workers,
            drop_last: false,
            permissive: true,
            transform: TransformPipeline::val(),
        };
        let model_valid = model.valid();
        let mut iter = BatchIter::new(val_idx.clone(), val_cfg)?;
        let mut val_metrics = PhaseMetrics::default();
        while let Some(batch) = iter.next_batch::<TrainBackend>(&device)? {
            let targets = batch.targets;
            let batch_len = targets.dims()[0];
            let logits = model_valid.forward(batch.images);
            let loss = val_loss.forward(logits.clone(), targets.clone());
            val_metrics.record(scalar_f32(loss), count_correct(logits, targets), batch_len);
        }
        println!(
            "val Loss: {:.4} Acc: {:.4}",
            val_metrics.average_loss(),
            val_metrics.accuracy()
        );

        if val_metrics.seen > 0 && val_metrics.accuracy() > best_acc {
            best_acc = val_metrics.accuracy();
            let meta = CheckpointMeta {
                epoch,
                loss: val_metrics.average_loss(),
                accuracy: best_acc,
                classes: classes.names().to_vec(),
                num_classes: classes.len(),
            };
            save_checkpoint(ckpt_dir, &model, &optim, &meta)?;
            println!(
                "saved checkpoint to {} (val acc {:.4})",
                ckpt_dir.display(),
                best_acc
            );
        }

        println!();
    }

    let elapsed = since.elapsed().as_secs();
    println!("Training complete in {}m {}s", elapsed / 60, elapsed % 60);
    println!("Best val Acc: {:.4}", best_acc);
    Ok(())
}

#[cfg(test)]
mod fit_tests {
    use super::{PhaseMetrics, StepDecay};

    #[test]
    fn step_decay_follows_the_schedule() {
        let schedule = StepDecay::new(0.001, 7, 0.1);
        assert!((schedule.lr_at(0) - 0.001).abs() < 1e-12);
        assert!((schedule.lr_at(6) - 0.001).abs() < 1e-12);
        assert!((schedule.lr_at(7) - 0.0001).abs() < 1e-12);
        assert!((schedule.lr_at(14) - 0.00001).abs() < 1e-12);
    }

    #[test]
    fn step_decay_handles_zero_step_size() {
        let schedule = StepDecay::new(0.5, 0, 0.1);
        assert!((schedule.lr_at(100) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn metrics_average_over_samples_not_batches() {
        let mut m = PhaseMetrics::default();
        m.record(1.0, 2.0, 4);
        m.record(0.5, 1.0, 2);
        // (1.0*4 + 0.5*2) / 6 samples
        assert!((m.average_loss() - 5.0 / 6.0).abs() < 1e-12);
        assert!((m.accuracy() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_phase_reports_zero() {
        let m = PhaseMetrics::default();
        assert_eq!(m.average_loss(), 0.0);
        assert_eq!(m.accuracy(), 0.0);
    }
}
