//! Tiles feature-matrix rows back into a grayscale PNG for eyeballing.

use crate::error::{PrepError, Result};
use crate::vectorize::to_pixel_value;
use image::{GrayImage, Luma};
use log::info;
use ndarray::ArrayView2;
use std::path::Path;

/// Canvas geometry: a `grid_rows x grid_cols` grid of `width x height` images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub grid_rows: usize,
    pub grid_cols: usize,
    pub width: usize,
    pub height: usize,
}

impl Grid {
    pub fn mnist(grid: usize) -> Grid {
        Grid {
            grid_rows: grid,
            grid_cols: grid,
            width: 28,
            height: 28,
        }
    }

    fn cells(&self) -> usize {
        self.grid_rows * self.grid_cols
    }
}

/// Image `n` lands in grid cell `(n / grid_cols, n % grid_cols)`.
pub fn render_grid(features: ArrayView2<'_, f64>, grid: Grid) -> Result<GrayImage> {
    let (rows, cols) = features.dim();
    if grid.cells() == 0 || grid.width == 0 || grid.height == 0 {
        return Err(PrepError::shape(format!("degenerate grid {grid:?}")));
    }
    if rows < grid.cells() {
        return Err(PrepError::shape(format!(
            "grid needs {} images, matrix has {rows}",
            grid.cells()
        )));
    }
    if cols != grid.width * grid.height {
        return Err(PrepError::shape(format!(
            "rows hold {cols} pixels, a {}x{} image needs {}",
            grid.width,
            grid.height,
            grid.width * grid.height
        )));
    }

    let canvas_w = u32::try_from(grid.width * grid.grid_cols)
        .map_err(|_| PrepError::shape("canvas too wide"))?;
    let canvas_h = u32::try_from(grid.height * grid.grid_rows)
        .map_err(|_| PrepError::shape("canvas too tall"))?;
    let mut canvas = GrayImage::new(canvas_w, canvas_h);

    for (n, row) in features.rows().into_iter().take(grid.cells()).enumerate() {
        let x0 = (n % grid.grid_cols) * grid.width;
        let y0 = (n / grid.grid_cols) * grid.height;
        for (k, &px) in row.iter().enumerate() {
            let x = x0 + k % grid.width;
            let y = y0 + k / grid.width;
            // bounded by canvas_w/canvas_h, which fit in u32
            canvas.put_pixel(x as u32, y as u32, Luma([to_pixel_value(px)]));
        }
    }
    Ok(canvas)
}

pub fn save_grid(features: ArrayView2<'_, f64>, grid: Grid, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let canvas = render_grid(features, grid)?;
    canvas.save(path)?;
    info!(
        "wrote {}x{} grid to {}",
        grid.grid_rows,
        grid.grid_cols,
        path.display()
    );
    Ok(())
}
