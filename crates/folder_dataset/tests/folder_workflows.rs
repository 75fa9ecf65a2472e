//! Integration tests for end-to-end folder_dataset workflows:
//! indexing a class-folder tree, batching it into tensors, and
//! summarizing dataset health.

use folder_dataset::{
    index_classes, summarize, BatchIter, LoaderConfig, TransformPipelineBuilder,
};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

type TestBackend = burn_ndarray::NdArray<f32>;

/// Create a synthetic class folder with `count` solid-color images.
fn create_class_dir(
    root: &Path,
    class: &str,
    count: usize,
    color: [u8; 3],
) -> anyhow::Result<PathBuf> {
    let dir = root.join(class);
    fs::create_dir_all(&dir)?;
    for i in 0..count {
        let img = RgbImage::from_pixel(16, 16, Rgb(color));
        img.save(dir.join(format!("img_{i:03}.png")))?;
    }
    Ok(dir)
}

#[test]
fn index_sorts_classes_and_files() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_class_dir(tmp.path(), "happy", 3, [0, 255, 0])?;
    create_class_dir(tmp.path(), "angry", 2, [255, 0, 0])?;
    // A stray non-image file must be ignored.
    fs::write(tmp.path().join("angry").join("notes.txt"), "not an image")?;

    let (indices, classes) = index_classes(tmp.path())?;
    assert_eq!(classes.names(), &["angry", "happy"]);
    assert_eq!(indices.len(), 5);
    assert_eq!(indices[0].class_index, 0, "angry sorts first");
    assert!(indices[..2].iter().all(|i| i.class_index == 0));
    assert!(indices[2..].iter().all(|i| i.class_index == 1));
    Ok(())
}

#[test]
fn index_fails_on_missing_or_empty_root() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    assert!(index_classes(&tmp.path().join("nope")).is_err());
    fs::create_dir_all(tmp.path().join("empty_class"))?;
    assert!(index_classes(tmp.path()).is_err(), "no images at all");
    Ok(())
}

#[test]
fn batch_iteration_yields_expected_shapes() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_class_dir(tmp.path(), "happy", 3, [0, 255, 0])?;
    create_class_dir(tmp.path(), "sad", 2, [0, 0, 255])?;

    let (indices, _classes) = index_classes(tmp.path())?;
    let cfg = LoaderConfig {
        batch_size: 2,
        shuffle: false,
        workers: 2,
        transform: TransformPipelineBuilder::new()
            .center_crop(None)
            .resize(Some((32, 32)))
            .build(),
        ..Default::default()
    };
    let mut iter = BatchIter::new(indices, cfg)?;
    assert_eq!(iter.len(), 5);

    let device = Default::default();
    let b1 = iter.next_batch::<TestBackend>(&device)?.expect("batch 1");
    assert_eq!(b1.images.dims(), [2, 3, 32, 32]);
    assert_eq!(b1.targets.dims(), [2]);

    let b2 = iter.next_batch::<TestBackend>(&device)?.expect("batch 2");
    assert_eq!(b2.images.dims()[0], 2);

    let b3 = iter.next_batch::<TestBackend>(&device)?.expect("batch 3");
    assert_eq!(b3.images.dims()[0], 1, "trailing partial batch");

    assert!(iter.next_batch::<TestBackend>(&device)?.is_none());
    Ok(())
}

#[test]
fn drop_last_skips_partial_batches() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_class_dir(tmp.path(), "happy", 5, [0, 255, 0])?;

    let (indices, _classes) = index_classes(tmp.path())?;
    let cfg = LoaderConfig {
        batch_size: 2,
        shuffle: false,
        drop_last: true,
        workers: 1,
        transform: TransformPipelineBuilder::new()
            .center_crop(None)
            .resize(Some((16, 16)))
            .build(),
        ..Default::default()
    };
    let mut iter = BatchIter::new(indices, cfg)?;
    let device = Default::default();
    let mut batches = 0;
    while iter.next_batch::<TestBackend>(&device)?.is_some() {
        batches += 1;
    }
    assert_eq!(batches, 2, "5 samples at batch 2 with drop_last");
    Ok(())
}

#[test]
fn drop_last_keeps_mid_stream_batches_shrunk_by_skips() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_class_dir(tmp.path(), "happy", 4, [0, 255, 0])?;
    // Sorts ahead of img_000..img_003, so the first chunk loses one sample.
    fs::write(tmp.path().join("happy").join("a_corrupt.png"), b"not a png")?;

    let (indices, _classes) = index_classes(tmp.path())?;
    assert_eq!(indices.len(), 5);

    let cfg = LoaderConfig {
        batch_size: 2,
        shuffle: false,
        drop_last: true,
        workers: 1,
        permissive: true,
        transform: TransformPipelineBuilder::new()
            .center_crop(None)
            .resize(Some((8, 8)))
            .build(),
        ..Default::default()
    };
    let mut iter = BatchIter::new(indices, cfg)?;
    let device = Default::default();
    let mut sizes = Vec::new();
    while let Some(batch) = iter.next_batch::<TestBackend>(&device)? {
        sizes.push(batch.images.dims()[0]);
    }
    // The shrunk first batch survives; only the trailing partial is dropped.
    assert_eq!(sizes, vec![1, 2]);
    Ok(())
}

#[test]
fn seeded_shuffle_is_reproducible() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_class_dir(tmp.path(), "a", 4, [10, 10, 10])?;
    create_class_dir(tmp.path(), "b", 4, [200, 200, 200])?;

    let (indices, _classes) = index_classes(tmp.path())?;
    let cfg = LoaderConfig {
        batch_size: 8,
        shuffle: true,
        seed: Some(42),
        workers: 2,
        transform: TransformPipelineBuilder::new()
            .center_crop(None)
            .resize(Some((8, 8)))
            .build(),
        ..Default::default()
    };
    let device = Default::default();

    let mut order_a = Vec::new();
    let mut iter = BatchIter::new(indices.clone(), cfg.clone())?;
    while let Some(batch) = iter.next_batch::<TestBackend>(&device)? {
        order_a.extend(batch.targets.float().into_data().to_vec::<f32>().unwrap());
    }
    let mut order_b = Vec::new();
    let mut iter = BatchIter::new(indices, cfg)?;
    while let Some(batch) = iter.next_batch::<TestBackend>(&device)? {
        order_b.extend(batch.targets.float().into_data().to_vec::<f32>().unwrap());
    }
    assert_eq!(order_a, order_b);
    Ok(())
}

#[test]
fn permissive_mode_skips_corrupt_images() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_class_dir(tmp.path(), "happy", 2, [0, 255, 0])?;
    fs::write(tmp.path().join("happy").join("corrupt.png"), b"not a png")?;

    let (indices, _classes) = index_classes(tmp.path())?;
    assert_eq!(indices.len(), 3, "corrupt file is still indexed");

    let cfg = LoaderConfig {
        batch_size: 4,
        shuffle: false,
        workers: 2,
        permissive: true,
        transform: TransformPipelineBuilder::new()
            .center_crop(None)
            .resize(Some((8, 8)))
            .build(),
        ..Default::default()
    };
    let mut iter = BatchIter::new(indices.clone(), cfg.clone())?;
    let device = Default::default();
    let batch = iter
        .next_batch::<TestBackend>(&device)?
        .expect("good samples survive");
    assert_eq!(batch.images.dims()[0], 2);

    let strict = LoaderConfig {
        permissive: false,
        ..cfg
    };
    let mut iter = BatchIter::new(indices, strict)?;
    assert!(iter.next_batch::<TestBackend>(&device).is_err());
    Ok(())
}

#[test]
fn summary_counts_per_class() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    create_class_dir(tmp.path(), "happy", 3, [0, 255, 0])?;
    create_class_dir(tmp.path(), "sad", 1, [0, 0, 255])?;
    fs::write(tmp.path().join("sad").join("broken.png"), b"nope")?;
    fs::write(tmp.path().join("sad").join("readme.md"), b"notes")?;

    let report = summarize(tmp.path())?;
    assert_eq!(report.classes.len(), 2);
    assert_eq!(report.totals.total, 5);
    assert_eq!(report.totals.decodable, 4);
    assert_eq!(report.totals.unreadable, 1);
    assert_eq!(report.totals.non_image, 1);

    let sad = report.classes.iter().find(|c| c.class == "sad").unwrap();
    assert_eq!(sad.total, 2);
    assert_eq!(sad.unreadable, 1);
    Ok(())
}
