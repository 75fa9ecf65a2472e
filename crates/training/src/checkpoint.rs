//! Best-validation checkpoint persistence.
//!
//! A checkpoint is a directory holding the model record (`model.bin`), the
//! optimizer record (`optim.bin`), and a JSON sidecar (`meta.json`) with the
//! epoch, loss, accuracy, and class names it was saved at. The directory is
//! overwritten in place whenever a better validation epoch is observed.

use crate::{ADBackend, TrainBackend};
use anyhow::{anyhow, Context};
use burn::module::Module;
use burn::optim::Optimizer;
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder, RecorderError};
use models::{ExpressionNet, ExpressionNetConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Model record stem; `BinFileRecorder` appends the `.bin` extension.
pub const MODEL_FILE: &str = "model";
/// Optimizer record stem.
pub const OPTIM_FILE: &str = "optim";
pub const META_FILE: &str = "meta.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub epoch: usize,
    /// Average validation loss at the saved epoch.
    pub loss: f64,
    /// Validation accuracy at the saved epoch.
    pub accuracy: f64,
    /// Sorted class names, aligned with the head's output indices.
    pub classes: Vec<String>,
    pub num_classes: usize,
}

impl CheckpointMeta {
    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        let path = dir.join(META_FILE);
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(&path, json)
            .with_context(|| format!("writing checkpoint metadata to {}", path.display()))
    }

    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(META_FILE);
        let raw = fs::read(&path)
            .with_context(|| format!("reading checkpoint metadata at {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("parsing checkpoint metadata at {}", path.display()))
    }
}

/// Write model record, optimizer record, and metadata under `dir`.
pub fn save_checkpoint<O>(
    dir: &Path,
    model: &ExpressionNet<ADBackend>,
    optim: &O,
    meta: &CheckpointMeta,
) -> anyhow::Result<()>
where
    O: Optimizer<ExpressionNet<ADBackend>, ADBackend>,
{
    fs::create_dir_all(dir)
        .with_context(|| format!("creating checkpoint directory {}", dir.display()))?;
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(dir.join(MODEL_FILE), &recorder)
        .map_err(|e| anyhow!("failed to save model record: {e}"))?;
    recorder
        .record(optim.to_record(), dir.join(OPTIM_FILE))
        .map_err(|e| anyhow!("failed to save optimizer record: {e}"))?;
    meta.save(dir)
}

/// Load the model record from a checkpoint directory into a fresh network
/// whose head is sized to `num_classes`.
pub fn load_model_from_checkpoint(
    dir: &Path,
    num_classes: usize,
    device: &<TrainBackend as burn::tensor::backend::Backend>::Device,
) -> Result<ExpressionNet<TrainBackend>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    ExpressionNet::<TrainBackend>::new(
        ExpressionNetConfig {
            num_classes,
            ..Default::default()
        },
        device,
    )
    .load_file(dir.join(MODEL_FILE), &recorder, device)
}
