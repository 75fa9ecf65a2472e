//! Tiling a batch of samples into a single preview image.

use crate::types::{DatasetResult, DatasetSample, FolderDatasetError};
use std::path::Path;

const GRID_PADDING: u32 = 2;

/// Tile samples left-to-right, top-to-bottom into one image, undoing the
/// pipeline's normalization so the preview looks like the source photos.
pub fn make_grid(
    samples: &[DatasetSample],
    columns: usize,
    mean: [f32; 3],
    std: [f32; 3],
) -> DatasetResult<image::RgbImage> {
    let Some(first) = samples.first() else {
        return Err(FolderDatasetError::Other(
            "cannot build a grid from zero samples".to_string(),
        ));
    };
    let (w, h) = (first.width, first.height);
    for sample in samples {
        if (sample.width, sample.height) != (w, h) {
            return Err(FolderDatasetError::Other(
                "grid samples must share one image size".to_string(),
            ));
        }
    }

    let columns = columns.max(1).min(samples.len());
    let rows = samples.len().div_ceil(columns);
    let cell_w = w + GRID_PADDING;
    let cell_h = h + GRID_PADDING;
    let grid_w = cell_w * columns as u32 + GRID_PADDING;
    let grid_h = cell_h * rows as u32 + GRID_PADDING;

    let mut canvas = image::RgbImage::new(grid_w, grid_h);
    let plane = (w * h) as usize;
    for (i, sample) in samples.iter().enumerate() {
        let x0 = GRID_PADDING + (i % columns) as u32 * cell_w;
        let y0 = GRID_PADDING + (i / columns) as u32 * cell_h;
        for y in 0..h {
            for x in 0..w {
                let base = (y * w + x) as usize;
                let mut rgb = [0u8; 3];
                for c in 0..3 {
                    let v = sample.image_chw[c * plane + base] * std[c] + mean[c];
                    rgb[c] = (v.clamp(0.0, 1.0) * 255.0) as u8;
                }
                canvas.put_pixel(x0 + x, y0 + y, image::Rgb(rgb));
            }
        }
    }
    Ok(canvas)
}

/// Build a grid and write it as a PNG (or whatever the extension names).
pub fn save_grid(
    samples: &[DatasetSample],
    columns: usize,
    mean: [f32; 3],
    std: [f32; 3],
    path: &Path,
) -> DatasetResult<()> {
    let grid = make_grid(samples, columns, mean, std)?;
    grid.save(path).map_err(|e| FolderDatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    })
}
