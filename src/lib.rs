pub mod error;
pub mod idx;
pub mod numeric;
pub mod prepare;
pub mod shuffle;
pub mod vectorize;
pub mod visualize;
pub mod whitening;

use ndarray::Array2;

pub use error::{PrepError, Result};
pub use numeric::{argmax_index, mean};
pub use shuffle::{shuffle_rows, shuffle_rows_paired};
pub use vectorize::{to_feature_matrix, to_one_hot_matrix, to_pixel_value};
pub use whitening::{whiten, WhiteningConfig, ZcaWhitening};

/// Pixel intensities 0-255, row-major, one image.
pub type RawImage = Vec<u8>;
pub type Label = u8;
/// N x D, one row per image.
pub type FeatureMatrix = Array2<f64>;
/// N x C, `0.999` at the label column, `0.001` elsewhere.
pub type OneHotMatrix = Array2<f64>;
