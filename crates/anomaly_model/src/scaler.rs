//! Per-feature standardization.

#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};
use vitals_structs::{FEATURE_COUNT, FeatureVector};

use crate::linalg::{covariance, mean};
use crate::{FeatureTransformer, FitError, check_finite};

/// Standard deviations below this are treated as zero and replaced by one.
const MIN_SCALE: f64 = 10.0 * f64::EPSILON;

/// Removes the mean and divides by the population standard deviation of each feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: FeatureVector,
    scale: FeatureVector,
    n_samples_seen: usize,
}

impl StandardScaler {
    /// Fits the scaler on `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is empty or contains a non-finite value.
    pub fn fit(data: &[FeatureVector]) -> Result<Self, FitError> {
        check_finite(data)?;

        let center = mean(data);
        let cov = covariance(data, &center);

        let mut scale = [1.0; FEATURE_COUNT];
        for (idx, value) in scale.iter_mut().enumerate() {
            let std = cov[idx][idx].sqrt();
            if std >= MIN_SCALE {
                *value = std;
            }
        }

        Ok(Self {
            mean: center,
            scale,
            n_samples_seen: data.len(),
        })
    }

    /// Fits the scaler and returns it together with the transformed `data`.
    ///
    /// # Errors
    ///
    /// See [`StandardScaler::fit`].
    pub fn fit_transform(data: &[FeatureVector]) -> Result<(Self, Vec<FeatureVector>), FitError> {
        let scaler = Self::fit(data)?;
        let transformed = data.iter().map(|row| scaler.transform(row)).collect();
        Ok((scaler, transformed))
    }

    #[must_use]
    pub const fn mean(&self) -> &FeatureVector {
        &self.mean
    }

    #[must_use]
    pub const fn scale(&self) -> &FeatureVector {
        &self.scale
    }

    #[must_use]
    pub const fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }
}

impl FeatureTransformer for StandardScaler {
    fn transform(&self, features: &FeatureVector) -> FeatureVector {
        [
            (features[0] - self.mean[0]) / self.scale[0],
            (features[1] - self.mean[1]) / self.scale[1],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_computes_mean_and_population_std() {
        let scaler = StandardScaler::fit(&[[60.0, 14.0], [70.0, 18.0]]).unwrap();
        assert_eq!(scaler.mean(), &[65.0, 16.0]);
        assert_eq!(scaler.scale(), &[5.0, 2.0]);
        assert_eq!(scaler.n_samples_seen(), 2);
    }

    #[test]
    fn test_transformed_training_data_is_standardized() {
        let data: Vec<FeatureVector> = (0_i32..50)
            .map(|i| [55.0 + f64::from(i) * 0.4, 12.0 + f64::from(i % 7)])
            .collect();
        let (_, transformed) = StandardScaler::fit_transform(&data).unwrap();

        let n = transformed.len() as f64;
        for feature in 0..FEATURE_COUNT {
            let mean = transformed.iter().map(|row| row[feature]).sum::<f64>() / n;
            let var = transformed
                .iter()
                .map(|row| (row[feature] - mean).powi(2))
                .sum::<f64>()
                / n;
            assert!(mean.abs() < 1e-9);
            assert!((var - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_feature_keeps_unit_scale() {
        let scaler = StandardScaler::fit(&[[60.0, 15.0], [62.0, 15.0]]).unwrap();
        assert_eq!(scaler.scale()[1], 1.0);
        assert_eq!(scaler.transform(&[61.0, 15.0]), [0.0, 0.0]);
    }

    #[test]
    fn test_fit_rejects_empty_and_nan() {
        assert_eq!(StandardScaler::fit(&[]), Err(FitError::EmptyDataset));
        assert_eq!(
            StandardScaler::fit(&[[f64::INFINITY, 1.0]]),
            Err(FitError::NonFiniteFeature { row: 0 })
        );
    }
}
