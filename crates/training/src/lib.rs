#![recursion_limit = "256"]

pub mod checkpoint;
pub mod eval;
pub mod fit;

pub use checkpoint::{load_model_from_checkpoint, save_checkpoint, CheckpointMeta};
pub use eval::{run_eval, EvalArgs, EvalReport};
pub use fit::{run_train, BackendKind, PhaseMetrics, StepDecay, TrainArgs};

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;

/// Autodiff wrapper used by the train loop.
pub type ADBackend = burn::backend::Autodiff<TrainBackend>;
