//! End-to-end smoke tests for the fine-tuning loop on tiny synthetic data.

use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;
use training::{run_train, BackendKind, CheckpointMeta, TrainArgs};

fn write_class(root: &Path, split: &str, class: &str, count: usize, color: [u8; 3]) {
    let dir = root.join(split).join(class);
    fs::create_dir_all(&dir).unwrap();
    for i in 0..count {
        let img = RgbImage::from_pixel(16, 16, Rgb(color));
        img.save(dir.join(format!("img_{i:02}.png"))).unwrap();
    }
}

fn args_for(root: &Path, ckpt: &Path, epochs: usize) -> TrainArgs {
    TrainArgs {
        data_dir: root.to_string_lossy().into_owned(),
        backend: BackendKind::NdArray,
        epochs,
        batch_size: 2,
        lr: 0.01,
        momentum: 0.9,
        lr_step_size: 7,
        lr_gamma: 0.1,
        workers: 2,
        seed: Some(7),
        checkpoint_out: ckpt.to_string_lossy().into_owned(),
        train_full: false,
        pretrained: None,
        pretrained_classes: 8,
    }
}

#[test]
fn single_class_run_writes_best_checkpoint() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    write_class(root, "train", "neutral", 4, [120, 120, 120]);
    write_class(root, "val", "neutral", 2, [120, 120, 120]);

    let ckpt = root.join("ckpt");
    run_train(args_for(root, &ckpt, 1))?;

    // One class means validation accuracy is 1.0, which beats the initial
    // best of 0.0, so exactly one checkpoint must exist.
    assert!(ckpt.join("model.bin").exists());
    assert!(ckpt.join("optim.bin").exists());
    let meta = CheckpointMeta::load(&ckpt)?;
    assert_eq!(meta.epoch, 0);
    assert_eq!(meta.num_classes, 1);
    assert_eq!(meta.classes, vec!["neutral".to_string()]);
    assert!((meta.accuracy - 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn two_class_run_completes() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    write_class(root, "train", "happy", 3, [0, 200, 0]);
    write_class(root, "train", "sad", 3, [0, 0, 200]);
    write_class(root, "val", "happy", 2, [0, 200, 0]);
    write_class(root, "val", "sad", 2, [0, 0, 200]);

    let ckpt = root.join("ckpt");
    run_train(args_for(root, &ckpt, 2))?;
    Ok(())
}

#[test]
fn undecodable_val_split_writes_no_checkpoint() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    write_class(root, "train", "neutral", 4, [120, 120, 120]);
    // val/ indexes fine but every file is skipped at decode time, so the
    // validation phase sees zero samples.
    let val_dir = root.join("val").join("neutral");
    fs::create_dir_all(&val_dir)?;
    for i in 0..2 {
        fs::write(val_dir.join(format!("img_{i:02}.png")), b"not a png")?;
    }

    let ckpt = root.join("ckpt");
    run_train(args_for(root, &ckpt, 1))?;

    assert!(!ckpt.join("meta.json").exists());
    assert!(!ckpt.join("model.bin").exists());
    Ok(())
}

#[test]
fn mismatched_splits_are_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    write_class(root, "train", "happy", 2, [0, 200, 0]);
    write_class(root, "val", "angry", 2, [200, 0, 0]);

    let ckpt = root.join("ckpt");
    assert!(run_train(args_for(root, &ckpt, 1)).is_err());
    Ok(())
}

#[test]
fn missing_split_fails_before_training() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    write_class(root, "train", "happy", 2, [0, 200, 0]);
    // no val/ at all

    let ckpt = root.join("ckpt");
    let err = run_train(args_for(root, &ckpt, 1)).unwrap_err();
    assert!(err.to_string().contains("validation split"));
    Ok(())
}
