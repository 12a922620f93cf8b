use crate::error::{PrepError, Result};
use crate::numeric::{argmax_index, mean};
use crate::shuffle::shuffle_rows_paired;
use crate::vectorize::{to_feature_matrix, to_one_hot_matrix};
use crate::whitening::{WhiteningConfig, ZcaWhitening};
use crate::{FeatureMatrix, Label, OneHotMatrix, RawImage};
use log::info;
use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Whitened features and their one-hot targets, row-aligned.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub features: FeatureMatrix,
    pub targets: OneHotMatrix,
    /// Covariance eigenvalues the whitening was built from, descending.
    pub spectrum: Array1<f64>,
}

impl PreparedDataset {
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Epoch reshuffle; features and targets move together.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        shuffle_rows_paired(self.features.view_mut(), self.targets.view_mut(), rng)
    }

    /// Class encoded in target row `i`, `None` past the end.
    pub fn class_of(&self, i: usize) -> Option<usize> {
        if i >= self.targets.nrows() {
            return None;
        }
        argmax_index(self.targets.row(i).iter())
    }
}

/// Vectorizes, one-hot encodes and whitens a labelled image set.
pub fn prepare(
    images: &[RawImage],
    labels: &[Label],
    num_classes: usize,
    whitener: &ZcaWhitening,
) -> Result<PreparedDataset> {
    if images.len() != labels.len() {
        return Err(PrepError::shape(format!(
            "{} images but {} labels",
            images.len(),
            labels.len()
        )));
    }
    prepare_features(&to_feature_matrix(images)?, labels, num_classes, whitener)
}

/// Same as [`prepare`] for images that are already vectorized.
pub fn prepare_features(
    raw: &FeatureMatrix,
    labels: &[Label],
    num_classes: usize,
    whitener: &ZcaWhitening,
) -> Result<PreparedDataset> {
    if raw.nrows() != labels.len() {
        return Err(PrepError::shape(format!(
            "{} feature rows but {} labels",
            raw.nrows(),
            labels.len()
        )));
    }
    let targets = to_one_hot_matrix(labels, num_classes);
    let (features, spectrum) = whitener.whiten_with_spectrum(raw)?;
    info!(
        "prepared {} samples, {} features, {} classes",
        features.nrows(),
        features.ncols(),
        num_classes
    );
    Ok(PreparedDataset {
        features,
        targets,
        spectrum,
    })
}

/// What a preparation run produced, written next to the rendered grids.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Summary {
    pub samples: usize,
    pub features: usize,
    pub class_counts: Vec<usize>,
    pub whitening: WhiteningConfig,
    pub output_min: f64,
    pub output_max: f64,
    pub output_mean: f64,
    pub leading_eigenvalues: Vec<f64>,
}

impl Summary {
    pub fn new(
        dataset: &PreparedDataset,
        labels: &[Label],
        num_classes: usize,
        whitening: WhiteningConfig,
        top_eigenvalues: usize,
    ) -> Summary {
        let mut class_counts = vec![0; num_classes];
        for &l in labels {
            if let Some(c) = class_counts.get_mut(l as usize) {
                *c += 1;
            }
        }
        let values = dataset.features.iter();
        let output_min = values.clone().copied().fold(f64::INFINITY, f64::min);
        let output_max = values.clone().copied().fold(f64::NEG_INFINITY, f64::max);
        Summary {
            samples: dataset.features.nrows(),
            features: dataset.features.ncols(),
            class_counts,
            whitening,
            output_min,
            output_max,
            output_mean: mean(values).unwrap_or(0.0),
            leading_eigenvalues: dataset
                .spectrum
                .iter()
                .take(top_eigenvalues)
                .copied()
                .collect(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut file, self).map_err(std::io::Error::from)?;
        writeln!(file)?;
        file.flush()?;
        Ok(())
    }
}
