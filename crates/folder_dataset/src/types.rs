//! Core types and error definitions for folder_dataset.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, FolderDatasetError>;

#[derive(Debug, Error)]
pub enum FolderDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid dataset layout at {path}: {msg}")]
    Validation { path: PathBuf, msg: String },
    #[error("no labeled images found under {path}")]
    EmptyDataset { path: PathBuf },
    #[error("unknown class name: {0}")]
    UnknownClass(String),
    #[error("{0}")]
    Other(String),
}

/// One labeled image on disk, prior to decoding.
#[derive(Debug, Clone)]
pub struct SampleIndex {
    pub class_index: usize,
    pub image_path: PathBuf,
}

/// Sorted class-name table derived from the dataset's subdirectory names.
///
/// The sorted position of a class name is its integer label, so two datasets
/// with the same subdirectories always agree on the label mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMap {
    names: Vec<String>,
}

impl ClassMap {
    pub fn from_names(mut names: Vec<String>) -> Self {
        names.sort();
        Self { names }
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn index(&self, name: &str) -> DatasetResult<usize> {
        self.names
            .binary_search_by(|n| n.as_str().cmp(name))
            .map_err(|_| FolderDatasetError::UnknownClass(name.to_string()))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A decoded, transformed sample ready for batching.
#[derive(Debug, Clone)]
pub struct DatasetSample {
    pub class_index: usize,
    /// Image in CHW layout, normalized with the pipeline's mean/std.
    pub image_chw: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

/// Per-class file counts, without building tensors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassSummary {
    pub class: String,
    /// Files with a recognized image extension.
    pub total: usize,
    /// Files whose image header decoded cleanly.
    pub decodable: usize,
    /// Files with an image extension that failed to decode.
    pub unreadable: usize,
    /// Files skipped because of their extension.
    pub non_image: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub classes: Vec<ClassSummary>,
    pub totals: ClassSummary,
}
