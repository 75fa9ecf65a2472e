//! Burn ML models for expression classification.
//!
//! This crate defines the network used for fine-tuning:
//! - `ExpressionNet`: a small convolutional backbone with a replaceable
//!   linear classification head.
//!
//! The backbone plays the role of a pretrained feature extractor: its
//! weights can be loaded from a record file, and `with_head` swaps in a
//! freshly initialized final layer sized to a new class count. Training
//! code decides whether gradients flow into the backbone.

use burn::module::Module;
use burn::nn;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::relu;
use burn::tensor::Tensor;

#[derive(Debug, Clone)]
pub struct ExpressionNetConfig {
    /// Output width of each backbone stage.
    pub channels: [usize; 3],
    /// Number of classes the head predicts.
    pub num_classes: usize,
    /// Dropout on the pooled features before the head.
    pub dropout: f64,
}

impl Default for ExpressionNetConfig {
    fn default() -> Self {
        Self {
            channels: [16, 32, 64],
            num_classes: 8,
            dropout: 0.0,
        }
    }
}

#[derive(Debug, Module)]
pub struct ExpressionNet<B: burn::tensor::backend::Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool: MaxPool2d,
    avg_pool: AdaptiveAvgPool2d,
    dropout: nn::Dropout,
    fc: nn::Linear<B>,
    feature_dim: usize,
    num_classes: usize,
}

impl<B: burn::tensor::backend::Backend> ExpressionNet<B> {
    pub fn new(cfg: ExpressionNetConfig, device: &B::Device) -> Self {
        let [c1, c2, c3] = cfg.channels;
        let conv = |cin: usize, cout: usize| {
            Conv2dConfig::new([cin, cout], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };
        Self {
            conv1: conv(3, c1),
            conv2: conv(c1, c2),
            conv3: conv(c2, c3),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            avg_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: nn::DropoutConfig::new(cfg.dropout).init(),
            fc: nn::LinearConfig::new(c3, cfg.num_classes).init(device),
            feature_dim: c3,
            num_classes: cfg.num_classes,
        }
    }

    /// Pooled backbone features, shape [batch, feature_dim].
    pub fn forward_features(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(relu(self.conv1.forward(images)));
        let x = self.pool.forward(relu(self.conv2.forward(x)));
        let x = self.pool.forward(relu(self.conv3.forward(x)));
        let x = self.avg_pool.forward(x);
        let [batch, channels, _, _] = x.dims();
        let x = x.reshape([batch, channels]);
        self.dropout.forward(x)
    }

    /// Classification head only: features -> logits.
    pub fn classify(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.fc.forward(features)
    }

    /// Logits [batch, num_classes].
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.forward_features(images);
        self.classify(features)
    }

    /// Replace the final layer with a fresh one sized to `num_classes`,
    /// keeping the backbone weights.
    pub fn with_head(self, num_classes: usize, device: &B::Device) -> Self {
        Self {
            fc: nn::LinearConfig::new(self.feature_dim, num_classes).init(device),
            num_classes,
            ..self
        }
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

pub mod prelude {
    pub use super::{ExpressionNet, ExpressionNetConfig};
}
