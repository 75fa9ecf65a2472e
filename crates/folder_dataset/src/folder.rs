//! Indexing and loading of class-folder datasets.
//!
//! A dataset root contains one subdirectory per class; every image file in a
//! subdirectory is a labeled example of that class.

use crate::transform::TransformPipeline;
use crate::types::{
    ClassMap, ClassSummary, DatasetResult, DatasetSample, DatasetSummary, FolderDatasetError,
    SampleIndex,
};
use std::fs;
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Scan a dataset root and index every image file under its class folders.
///
/// Class labels follow the sorted subdirectory names; within a class, files
/// are indexed in sorted order so runs are deterministic.
pub fn index_classes(root: &Path) -> DatasetResult<(Vec<SampleIndex>, ClassMap)> {
    let entries = fs::read_dir(root).map_err(|e| FolderDatasetError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut class_dirs = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        class_dirs.push((name.to_string(), path));
    }
    class_dirs.sort_by(|a, b| a.0.cmp(&b.0));

    let classes = ClassMap::from_names(class_dirs.iter().map(|(n, _)| n.clone()).collect());

    let mut indices = Vec::new();
    for (class_index, (_, dir)) in class_dirs.iter().enumerate() {
        let files = fs::read_dir(dir).map_err(|e| FolderDatasetError::Io {
            path: dir.clone(),
            source: e,
        })?;
        let mut image_paths: Vec<_> = files
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && has_image_extension(p))
            .collect();
        image_paths.sort();
        for image_path in image_paths {
            indices.push(SampleIndex {
                class_index,
                image_path,
            });
        }
    }

    if indices.is_empty() {
        return Err(FolderDatasetError::EmptyDataset {
            path: root.to_path_buf(),
        });
    }
    Ok((indices, classes))
}

/// Decode one indexed image and run it through the transform pipeline.
pub fn load_sample(
    idx: &SampleIndex,
    pipeline: &TransformPipeline,
    ordinal: u64,
) -> DatasetResult<DatasetSample> {
    let img = image::open(&idx.image_path)
        .map_err(|e| FolderDatasetError::Image {
            path: idx.image_path.clone(),
            source: e,
        })?
        .to_rgb8();
    pipeline.apply(img, idx.class_index, ordinal)
}

/// Count files per class without building tensors. Image headers are probed
/// so unreadable files show up before a training run trips over them.
pub fn summarize(root: &Path) -> DatasetResult<DatasetSummary> {
    let (indices, classes) = index_classes(root)?;

    let mut summaries: Vec<ClassSummary> = classes
        .names()
        .iter()
        .map(|name| ClassSummary {
            class: name.clone(),
            ..Default::default()
        })
        .collect();

    for idx in &indices {
        let entry = &mut summaries[idx.class_index];
        entry.total += 1;
        match image::image_dimensions(&idx.image_path) {
            Ok(_) => entry.decodable += 1,
            Err(_) => entry.unreadable += 1,
        }
    }

    // Files skipped by extension, per class directory.
    for (class_index, name) in classes.names().iter().enumerate() {
        let dir = root.join(name);
        let Ok(files) = fs::read_dir(&dir) else {
            continue;
        };
        summaries[class_index].non_image = files
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && !has_image_extension(p))
            .count();
    }

    let mut totals = ClassSummary::default();
    for summary in &summaries {
        totals.total += summary.total;
        totals.decodable += summary.decodable;
        totals.unreadable += summary.unreadable;
        totals.non_image += summary.non_image;
    }

    Ok(DatasetSummary {
        classes: summaries,
        totals,
    })
}
