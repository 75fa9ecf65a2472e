//! Class-folder dataset loading, transforms, and Burn-compatible batching.
//!
//! This crate provides utilities for:
//! - Indexing datasets where each subdirectory is a class label
//! - Fixed per-split transform recipes (crop/resize/flip/normalize)
//! - Batch iteration with a fixed-size decode worker pool
//! - Batch preview grids

pub mod batch;
pub mod folder;
pub mod grid;
pub mod transform;
pub mod types;

pub use batch::{BatchIter, ClassBatch, LoaderConfig};
pub use folder::{index_classes, load_sample, summarize};
pub use grid::{make_grid, save_grid};
pub use transform::{
    TransformPipeline, TransformPipelineBuilder, CENTER_CROP_SIDE, IMAGENET_MEAN, IMAGENET_STD,
    INPUT_SIZE,
};
pub use types::*;
