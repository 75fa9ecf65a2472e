//! Per-split image transform recipes.

use crate::types::{DatasetResult, DatasetSample};
use image::imageops::FilterType;
use rand::{Rng, SeedableRng};

/// Channel means used by the pretrained-backbone recipes.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Channel standard deviations used by the pretrained-backbone recipes.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Square side for the training/validation center crop.
pub const CENTER_CROP_SIDE: u32 = 680;
/// Network input size after resizing.
pub const INPUT_SIZE: u32 = 128;

/// A fixed recipe of crop/resize/flip/normalize steps, applied in that order.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    /// Center-crop to a square of this side before resizing. Clamped to the
    /// image dimensions, so smaller images pass through uncropped.
    pub center_crop: Option<u32>,
    /// Resize to (width, height) with triangle filtering.
    pub resize: Option<(u32, u32)>,
    /// Probability of flipping horizontally.
    pub flip_horizontal_prob: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    /// Seed for per-sample deterministic augmentation (mixed with the sample
    /// ordinal). None uses the thread-local RNG.
    pub seed: Option<u64>,
}

impl TransformPipeline {
    /// Training recipe: center-crop, resize, random horizontal flip, normalize.
    pub fn train() -> Self {
        Self {
            center_crop: Some(CENTER_CROP_SIDE),
            resize: Some((INPUT_SIZE, INPUT_SIZE)),
            flip_horizontal_prob: 0.5,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            seed: None,
        }
    }

    /// Validation recipe: like training but without the flip.
    pub fn val() -> Self {
        Self {
            flip_horizontal_prob: 0.0,
            ..Self::train()
        }
    }

    /// Inference recipe: resize and normalize only.
    pub fn infer() -> Self {
        Self {
            center_crop: None,
            resize: Some((INPUT_SIZE, INPUT_SIZE)),
            flip_horizontal_prob: 0.0,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            seed: None,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "center_crop={} resize={} flip_p={:.2} seed={}",
            self.center_crop
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.resize
                .map(|(w, h)| format!("{}x{}", w, h))
                .unwrap_or_else(|| "none".to_string()),
            self.flip_horizontal_prob,
            self.seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string()),
        )
    }

    /// Apply the recipe to a decoded image and emit a normalized CHW sample.
    ///
    /// `ordinal` identifies the sample within the dataset so seeded runs
    /// reproduce the same flips regardless of iteration order.
    pub fn apply(
        &self,
        img: image::RgbImage,
        class_index: usize,
        ordinal: u64,
    ) -> DatasetResult<DatasetSample> {
        let mut rng_local;
        let mut seeded_rng;
        let rng: &mut dyn rand::RngCore = if let Some(seed) = self.seed {
            seeded_rng = rand::rngs::StdRng::seed_from_u64(seed ^ ordinal);
            &mut seeded_rng
        } else {
            rng_local = rand::rng();
            &mut rng_local
        };

        let mut img = img;
        if let Some(side) = self.center_crop {
            img = center_crop(&img, side);
        }
        if let Some((w, h)) = self.resize {
            if img.dimensions() != (w, h) {
                img = image::imageops::resize(&img, w, h, FilterType::Triangle);
            }
        }
        maybe_hflip(&mut img, self.flip_horizontal_prob, rng);

        let (width, height) = img.dimensions();
        let plane = (width * height) as usize;
        let mut image_chw = vec![0.0f32; plane * 3];
        for (y, x, pixel) in img.enumerate_pixels() {
            let base = (y * width + x) as usize;
            for c in 0..3 {
                let v = pixel[c] as f32 / 255.0;
                image_chw[c * plane + base] = (v - self.mean[c]) / self.std[c];
            }
        }

        Ok(DatasetSample {
            class_index,
            image_chw,
            width,
            height,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TransformPipelineBuilder {
    inner: TransformPipeline,
}

impl Default for TransformPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformPipelineBuilder {
    pub fn new() -> Self {
        Self {
            inner: TransformPipeline::val(),
        }
    }
    pub fn center_crop(mut self, side: Option<u32>) -> Self {
        self.inner.center_crop = side;
        self
    }
    pub fn resize(mut self, size: Option<(u32, u32)>) -> Self {
        self.inner.resize = size;
        self
    }
    pub fn flip_horizontal_prob(mut self, p: f32) -> Self {
        self.inner.flip_horizontal_prob = p;
        self
    }
    pub fn normalize(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.inner.mean = mean;
        self.inner.std = std;
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.inner.seed = seed;
        self
    }
    pub fn build(self) -> TransformPipeline {
        self.inner
    }
}

fn center_crop(img: &image::RgbImage, side: u32) -> image::RgbImage {
    let (w, h) = img.dimensions();
    let crop_w = side.min(w);
    let crop_h = side.min(h);
    if crop_w == w && crop_h == h {
        return img.clone();
    }
    let x0 = (w - crop_w) / 2;
    let y0 = (h - crop_h) / 2;
    image::imageops::crop_imm(img, x0, y0, crop_w, crop_h).to_image()
}

fn maybe_hflip(img: &mut image::RgbImage, prob: f32, rng: &mut dyn rand::RngCore) {
    if prob <= 0.0 {
        return;
    }
    if rng.random_range(0.0..1.0) < prob {
        image::imageops::flip_horizontal_in_place(img);
    }
}
