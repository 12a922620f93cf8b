//! Conversion of raw pixel bytes and class labels into `f64` matrices.
//!
//! Every value is squeezed into `[0.001, 0.999]` so that a sigmoid-style
//! classifier downstream never sees a saturating 0 or 1.

use crate::error::{PrepError, Result};
use crate::{FeatureMatrix, Label, OneHotMatrix, RawImage};
use ndarray::Array2;

pub const LOW: f64 = 0.001;
pub const HIGH: f64 = 0.999;
const PIXEL_RANGE: f64 = 255.0;

/// Scales one byte into `[0.001, 0.999]`.
pub fn pixel_weight(px: u8) -> f64 {
    let value = f64::from(px) / PIXEL_RANGE * HIGH + LOW;
    // 255 lands exactly on 1.0
    if value == 1.0 {
        return HIGH;
    }
    value
}

/// Inverse of [`pixel_weight`], truncating. Values outside `[0.001, 0.999]`
/// (as produced by whitening) saturate at 0 or 255.
pub fn to_pixel_value(value: f64) -> u8 {
    ((value - LOW) / HIGH * PIXEL_RANGE) as u8
}

/// One row per image, one column per pixel.
pub fn to_feature_matrix(images: &[RawImage]) -> Result<FeatureMatrix> {
    let first = images
        .first()
        .ok_or_else(|| PrepError::shape("cannot vectorize an empty image set"))?;
    let cols = first.len();
    if cols == 0 {
        return Err(PrepError::shape("images have no pixels"));
    }

    let mut backing = Vec::with_capacity(images.len() * cols);
    for (i, img) in images.iter().enumerate() {
        if img.len() != cols {
            return Err(PrepError::shape(format!(
                "image {i} has {} pixels, expected {cols}",
                img.len()
            )));
        }
        backing.extend(img.iter().map(|&px| pixel_weight(px)));
    }

    Array2::from_shape_vec((images.len(), cols), backing)
        .map_err(|e| PrepError::shape(format!("failed to build feature matrix: {e}")))
}

/// Row `i` holds `0.999` at column `labels[i]` and `0.001` elsewhere.
/// A label `>= num_classes` leaves its row without a hot entry.
pub fn to_one_hot_matrix(labels: &[Label], num_classes: usize) -> OneHotMatrix {
    let mut out = Array2::from_elem((labels.len(), num_classes), LOW);
    for (i, &label) in labels.iter().enumerate() {
        if let Some(cell) = out.get_mut((i, label as usize)) {
            *cell = HIGH;
        }
    }
    out
}
