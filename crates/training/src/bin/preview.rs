//! Save one batch of transformed training images as a grid PNG.

use anyhow::Context;
use clap::Parser;
use folder_dataset::{
    index_classes, load_sample, save_grid, TransformPipeline, IMAGENET_MEAN, IMAGENET_STD,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(
    name = "preview",
    about = "Tile one shuffled batch of transformed images into a grid PNG"
)]
struct Args {
    /// Class-folder directory to sample from.
    #[arg(long, default_value = "data/faces/train")]
    data_dir: String,
    /// Number of images in the grid.
    #[arg(long, default_value_t = 32)]
    count: usize,
    /// Grid columns.
    #[arg(long, default_value_t = 8)]
    columns: usize,
    /// Output image path.
    #[arg(long, default_value = "img.png")]
    out: String,
    /// Seed for shuffling and augmentation.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = Path::new(&args.data_dir);
    let (mut indices, classes) = index_classes(data_dir)
        .with_context(|| format!("indexing images at {}", data_dir.display()))?;

    let mut rng = match args.seed {
        Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
        None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
    };
    indices.shuffle(&mut rng);

    let mut pipeline = TransformPipeline::train();
    pipeline.seed = args.seed;

    let mut samples = Vec::new();
    for (i, idx) in indices.iter().take(args.count.max(1)).enumerate() {
        samples.push(load_sample(idx, &pipeline, i as u64)?);
    }

    let out = Path::new(&args.out);
    save_grid(&samples, args.columns, IMAGENET_MEAN, IMAGENET_STD, out)?;
    println!(
        "saved {} samples across {} classes to {}",
        samples.len(),
        classes.len(),
        out.display()
    );
    Ok(())
}
