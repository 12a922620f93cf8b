//! In-place Fisher–Yates reordering of matrix rows between epochs.
//!
//! Shuffles work on a mutable view borrowed from the owning array, so the
//! owner sees the new order once the borrow ends. The caller supplies the
//! random source; seed a `StdRng` for reproducible epochs.

use crate::error::{PrepError, Result};
use ndarray::{ArrayViewMut2, Axis, Zip};
use rand::Rng;

/// For `i` in `0..n`, draws `j` uniformly from `0..=i` and swaps rows `i` and `j`.
pub fn shuffle_rows<R: Rng + ?Sized>(mut rows: ArrayViewMut2<'_, f64>, rng: &mut R) {
    for i in 0..rows.nrows() {
        let j = rng.gen_range(0..=i);
        swap_rows(&mut rows, i, j);
    }
}

/// Applies one permutation to two row-aligned matrices, e.g. features and
/// their one-hot targets.
pub fn shuffle_rows_paired<R: Rng + ?Sized>(
    mut features: ArrayViewMut2<'_, f64>,
    mut targets: ArrayViewMut2<'_, f64>,
    rng: &mut R,
) -> Result<()> {
    if features.nrows() != targets.nrows() {
        return Err(PrepError::DimensionMismatch {
            step: "paired shuffle",
            left: features.dim(),
            right: targets.dim(),
        });
    }
    for i in 0..features.nrows() {
        let j = rng.gen_range(0..=i);
        swap_rows(&mut features, i, j);
        swap_rows(&mut targets, i, j);
    }
    Ok(())
}

fn swap_rows(m: &mut ArrayViewMut2<'_, f64>, i: usize, j: usize) {
    if i == j {
        return;
    }
    let (mut top, mut bottom) = m.view_mut().split_at(Axis(0), i.max(j));
    Zip::from(top.row_mut(i.min(j)))
        .and(bottom.row_mut(0))
        .for_each(std::mem::swap);
}
