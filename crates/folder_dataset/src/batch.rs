//! Batch iteration for training, validation, and evaluation.

use crate::folder::load_sample;
use crate::transform::TransformPipeline;
use crate::types::{DatasetResult, FolderDatasetError, SampleIndex};
use burn::tensor::{backend::Backend, Int, Tensor};
use rand::{seq::SliceRandom, SeedableRng};
use rayon::prelude::*;
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

/// One collated batch: normalized images and integer class targets.
pub struct ClassBatch<B: Backend> {
    /// Shape [batch, 3, height, width].
    pub images: Tensor<B, 4>,
    /// Shape [batch].
    pub targets: Tensor<B, 1, Int>,
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub batch_size: usize,
    /// Shuffle samples before iteration.
    pub shuffle: bool,
    /// Seed for reproducible shuffling (also threaded into the transform).
    pub seed: Option<u64>,
    /// Size of the decode worker pool.
    pub workers: usize,
    /// Drop the last partial batch.
    pub drop_last: bool,
    /// Skip undecodable images with a warning instead of failing the run.
    pub permissive: bool,
    pub transform: TransformPipeline,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle: true,
            seed: None,
            workers: 8,
            drop_last: false,
            permissive: true,
            transform: TransformPipeline::train(),
        }
    }
}

/// Cursor over an indexed dataset that yields Burn tensors batch by batch.
///
/// Decoding and transforming the images of a batch runs on a fixed-size
/// rayon pool; sample order within the batch is preserved.
pub struct BatchIter {
    indices: Vec<SampleIndex>,
    cursor: usize,
    cfg: LoaderConfig,
    pipeline: TransformPipeline,
    pool: rayon::ThreadPool,
    processed_samples: usize,
    processed_batches: usize,
    skipped_errors: usize,
    started: Instant,
    last_log: Instant,
    last_logged_samples: usize,
    log_every_samples: Option<usize>,
    permissive: bool,
    images_buf: Vec<f32>,
    targets_buf: Vec<i32>,
}

impl BatchIter {
    pub fn new(mut indices: Vec<SampleIndex>, cfg: LoaderConfig) -> DatasetResult<Self> {
        let mut rng = match cfg.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
        };
        if cfg.shuffle {
            indices.shuffle(&mut rng);
        }

        let log_every_samples = match std::env::var("FOLDER_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        let permissive = std::env::var("FOLDER_DATASET_PERMISSIVE")
            .ok()
            .map(|v| v.trim().to_ascii_lowercase())
            .map(|v| !(v == "0" || v == "false" || v == "off"))
            .unwrap_or(cfg.permissive);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.workers.max(1))
            .build()
            .map_err(|e| FolderDatasetError::Other(format!("failed to build worker pool: {e}")))?;

        let mut pipeline = cfg.transform.clone();
        if pipeline.seed.is_none() {
            pipeline.seed = cfg.seed;
        }

        let now = Instant::now();
        Ok(Self {
            indices,
            cursor: 0,
            cfg,
            pipeline,
            pool,
            processed_samples: 0,
            processed_batches: 0,
            skipped_errors: 0,
            started: now,
            last_log: now,
            last_logged_samples: 0,
            log_every_samples,
            permissive,
            images_buf: Vec::new(),
            targets_buf: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn next_batch<B: Backend>(
        &mut self,
        device: &B::Device,
    ) -> DatasetResult<Option<ClassBatch<B>>> {
        let batch_size = self.cfg.batch_size.max(1);
        loop {
            if self.cursor >= self.indices.len() {
                return Ok(None);
            }
            let start = self.cursor;
            let end = (self.cursor + batch_size).min(self.indices.len());
            let slice = &self.indices[start..end];
            self.cursor = end;

            self.images_buf.clear();
            self.targets_buf.clear();

            let pipeline = &self.pipeline;
            // Indexed parallel iterators collect in order, so no re-sort.
            let loaded: Vec<_> = self.pool.install(|| {
                slice
                    .par_iter()
                    .enumerate()
                    .map(|(i, idx)| (idx, load_sample(idx, pipeline, (start + i) as u64)))
                    .collect()
            });

            let mut expected_size: Option<(u32, u32)> = None;
            for (idx, res) in loaded {
                let sample = match res {
                    Ok(s) => s,
                    Err(e) => {
                        if self.permissive {
                            eprintln!(
                                "Warning: skipping image {}: {e}",
                                idx.image_path.display()
                            );
                            self.skipped_errors += 1;
                            continue;
                        } else {
                            return Err(e);
                        }
                    }
                };

                let size = (sample.width, sample.height);
                match expected_size {
                    None => expected_size = Some(size),
                    Some(sz) if sz != size => {
                        return Err(FolderDatasetError::Other(
                            "batch contains varying image sizes; set a resize in the transform"
                                .to_string(),
                        ));
                    }
                    _ => {}
                }

                self.images_buf.extend_from_slice(&sample.image_chw);
                self.targets_buf.push(sample.class_index as i32);
            }

            // Every sample in this chunk was skipped; move on to the next one.
            if self.targets_buf.is_empty() {
                continue;
            }

            // drop_last only discards the trailing partial batch; a mid-stream
            // batch shrunk by skipped samples is still emitted.
            let batch_len = self.targets_buf.len();
            if self.cfg.drop_last && batch_len < batch_size && self.cursor >= self.indices.len() {
                return Ok(None);
            }

            let (width, height) = expected_size.expect("non-empty batch has a size");
            let images =
                Tensor::<B, 1>::from_floats(self.images_buf.as_slice(), device)
                    .reshape([batch_len, 3, height as usize, width as usize]);
            let targets = Tensor::<B, 1, Int>::from_ints(self.targets_buf.as_slice(), device);

            self.processed_samples += batch_len;
            self.processed_batches += 1;
            self.maybe_log_progress();

            return Ok(Some(ClassBatch { images, targets }));
        }
    }

    fn maybe_log_progress(&mut self) {
        let Some(threshold) = self.log_every_samples else {
            return;
        };
        let processed_since = self
            .processed_samples
            .saturating_sub(self.last_logged_samples);
        let since_last = self.last_log.elapsed();
        if processed_since < threshold && since_last < Duration::from_secs(30) {
            return;
        }
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        let rate = self.processed_samples as f32 / secs;
        eprintln!(
            "[dataset] batches={} samples={} skipped_errors={} elapsed={:.1}s rate={:.1} img/s",
            self.processed_batches, self.processed_samples, self.skipped_errors, secs, rate
        );
        self.last_logged_samples = self.processed_samples;
        self.last_log = Instant::now();
    }
}
