//! Elliptic envelope: an outlier detector fitted on a robust covariance estimate.
//!
//! The location and shape of the inlier cloud come from a Minimum Covariance
//! Determinant estimate (C-steps from deterministic starts), corrected for
//! consistency and reweighted. The decision threshold is the distance quantile
//! implied by the contamination.

#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use serde::{Deserialize, Serialize};
use vitals_structs::{FEATURE_COUNT, FeatureVector};

use crate::linalg::{
    IDENTITY, Matrix2, covariance, determinant, inverse, mahalanobis_sq, mean, median, percentile,
    scale,
};
use crate::{FitError, OutlierClassifier, check_finite};

/// Median of the chi-square distribution with two degrees of freedom, `2 ln 2`.
const CHI2_MEDIAN: f64 = 1.386_294_361_119_890_6;

/// 0.975 quantile of the chi-square distribution with two degrees of freedom, `-2 ln 0.025`.
const CHI2_Q975: f64 = 7.377_758_908_227_871;

/// Upper bound on concentration steps per start.
const MAX_C_STEPS: usize = 30;

/// Number of data points used as seeds for additional starts.
const SEED_STARTS: usize = 8;

/// Relative determinant change below which the C-steps are considered converged.
const DET_TOLERANCE: f64 = 1e-12;

/// Default prior on the fraction of training rows that are anomalous.
pub const DEFAULT_CONTAMINATION: f64 = 0.12;

/// Fitting parameters for [`EllipticEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Fraction of training rows assumed to be outliers, in `(0, 0.5]`.
    pub contamination: f64,
    /// Fraction of rows in the robust support. `None` uses `(n + p + 1) / 2`.
    pub support_fraction: Option<f64>,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            contamination: DEFAULT_CONTAMINATION,
            support_fraction: None,
        }
    }
}

impl EnvelopeConfig {
    fn validate(&self) -> Result<(), FitError> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(FitError::InvalidContamination(self.contamination));
        }
        if let Some(fraction) = self.support_fraction
            && !(fraction > 0.0 && fraction <= 1.0)
        {
            return Err(FitError::InvalidSupportFraction(fraction));
        }
        Ok(())
    }

    fn support_size(&self, n: usize) -> usize {
        let size = match self.support_fraction {
            Some(fraction) => (fraction * n as f64).ceil() as usize,
            None => (n + FEATURE_COUNT + 1).div_ceil(2),
        };
        size.clamp(1, n)
    }
}

/// Location and covariance of a subset, with the covariance determinant.
#[derive(Debug, Clone, Copy)]
struct Estimate {
    location: FeatureVector,
    covariance: Matrix2,
    det: f64,
}

impl Estimate {
    fn of(points: &[FeatureVector]) -> Self {
        let location = mean(points);
        let covariance = covariance(points, &location);
        Self {
            location,
            covariance,
            det: determinant(&covariance),
        }
    }
}

/// Fitted elliptic envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EllipticEnvelope {
    location: FeatureVector,
    covariance: Matrix2,
    precision: Matrix2,
    offset: f64,
    contamination: f64,
    support_size: usize,
}

impl EllipticEnvelope {
    /// Fits the envelope on (already scaled) training rows.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is empty, contains a non-finite value, or the
    /// configuration is out of range.
    pub fn fit(data: &[FeatureVector], config: &EnvelopeConfig) -> Result<Self, FitError> {
        config.validate()?;
        check_finite(data)?;

        let support_size = config.support_size(data.len());
        let raw = minimum_covariance_determinant(data, support_size);
        let reweighted = correct_and_reweight(data, &raw);

        let precision = inverse(&reweighted.covariance);
        let scores: Vec<f64> = data
            .iter()
            .map(|row| -mahalanobis_sq(row, &reweighted.location, &precision))
            .collect();
        let offset = percentile(&scores, 100.0 * config.contamination);

        Ok(Self {
            location: reweighted.location,
            covariance: reweighted.covariance,
            precision,
            offset,
            contamination: config.contamination,
            support_size,
        })
    }

    /// Squared Mahalanobis distance of a row from the robust location.
    #[must_use]
    pub fn mahalanobis(&self, features: &FeatureVector) -> f64 {
        mahalanobis_sq(features, &self.location, &self.precision)
    }

    /// Negated squared distance; larger is more normal.
    #[must_use]
    pub fn score_sample(&self, features: &FeatureVector) -> f64 {
        -self.mahalanobis(features)
    }

    #[must_use]
    pub const fn location(&self) -> &FeatureVector {
        &self.location
    }

    #[must_use]
    pub const fn covariance(&self) -> &Matrix2 {
        &self.covariance
    }

    /// Score threshold separating inliers from outliers.
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    #[must_use]
    pub const fn contamination(&self) -> f64 {
        self.contamination
    }

    #[must_use]
    pub const fn support_size(&self) -> usize {
        self.support_size
    }
}

impl OutlierClassifier for EllipticEnvelope {
    fn decision_function(&self, features: &FeatureVector) -> f64 {
        self.score_sample(features) - self.offset
    }
}

/// The `h` rows closest to `center` under `precision`.
fn nearest(
    data: &[FeatureVector],
    center: &FeatureVector,
    precision: &Matrix2,
    h: usize,
) -> Vec<FeatureVector> {
    let mut ranked: Vec<(f64, &FeatureVector)> = data
        .iter()
        .map(|row| (mahalanobis_sq(row, center, precision), row))
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
    ranked.into_iter().take(h).map(|(_, row)| *row).collect()
}

/// Repeats concentration steps until the determinant stops shrinking.
fn concentrate(data: &[FeatureVector], start: Estimate, h: usize) -> Estimate {
    let mut current = start;
    for _ in 0..MAX_C_STEPS {
        let support = nearest(data, &current.location, &inverse(&current.covariance), h);
        let next = Estimate::of(&support);

        if next.det >= current.det - DET_TOLERANCE * current.det.abs() {
            if next.det < current.det {
                current = next;
            }
            break;
        }
        current = next;
    }
    current
}

/// Raw MCD estimate over the full-data start, the median start and seeded starts.
fn minimum_covariance_determinant(data: &[FeatureVector], h: usize) -> Estimate {
    let median_point = [
        median(&data.iter().map(|row| row[0]).collect::<Vec<_>>()),
        median(&data.iter().map(|row| row[1]).collect::<Vec<_>>()),
    ];

    let mut starts = vec![
        Estimate::of(data),
        Estimate::of(&nearest(data, &median_point, &IDENTITY, h)),
    ];
    let seeds = SEED_STARTS.min(data.len());
    for k in 0..seeds {
        let seed = data[k * data.len() / seeds];
        starts.push(Estimate::of(&nearest(data, &seed, &IDENTITY, h)));
    }

    starts
        .into_iter()
        .map(|start| concentrate(data, start, h))
        .min_by(|a, b| a.det.total_cmp(&b.det))
        .unwrap_or_else(|| Estimate::of(data))
}

/// Rescales the raw estimate to be consistent at the normal model, then refits on the
/// rows inside the 0.975 chi-square quantile.
fn correct_and_reweight(data: &[FeatureVector], raw: &Estimate) -> Estimate {
    let precision = inverse(&raw.covariance);
    let distances: Vec<f64> = data
        .iter()
        .map(|row| mahalanobis_sq(row, &raw.location, &precision))
        .collect();

    let correction = median(&distances) / CHI2_MEDIAN;
    let correction = if correction.is_finite() && correction > 0.0 {
        correction
    } else {
        1.0
    };

    let inliers: Vec<FeatureVector> = data
        .iter()
        .zip(&distances)
        .filter(|(_, distance)| *distance / correction < CHI2_Q975)
        .map(|(row, _)| *row)
        .collect();

    if inliers.is_empty() {
        let covariance = scale(&raw.covariance, correction);
        return Estimate {
            location: raw.location,
            covariance,
            det: determinant(&covariance),
        };
    }

    Estimate::of(&inliers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitals_structs::Prediction;

    /// A deterministic 2-D cloud: a 20x10 grid around the origin.
    fn grid() -> Vec<FeatureVector> {
        let mut rows = Vec::new();
        for i in 0_i32..20 {
            for j in 0_i32..10 {
                rows.push([(f64::from(i) - 9.5) / 5.0, (f64::from(j) - 4.5) / 3.0]);
            }
        }
        rows
    }

    #[test]
    fn test_center_is_normal_and_far_point_is_outlier() {
        let envelope = EllipticEnvelope::fit(&grid(), &EnvelopeConfig::default()).unwrap();

        assert_eq!(envelope.predict(&[0.0, 0.0]), Prediction::Normal);
        assert_eq!(envelope.predict(&[10.0, 0.0]), Prediction::Outlier);
        assert_eq!(envelope.predict(&[0.0, -10.0]), Prediction::Outlier);
    }

    #[test]
    fn test_contamination_sets_training_outlier_fraction() {
        let data = grid();
        let envelope = EllipticEnvelope::fit(&data, &EnvelopeConfig::default()).unwrap();

        let flagged = data
            .iter()
            .filter(|row| envelope.predict(row) == Prediction::Outlier)
            .count();
        let fraction = flagged as f64 / data.len() as f64;
        assert!(fraction <= DEFAULT_CONTAMINATION + 0.02, "fraction {fraction}");
        assert!(fraction >= DEFAULT_CONTAMINATION - 0.06, "fraction {fraction}");
    }

    #[test]
    fn test_robust_location_ignores_gross_outliers() {
        let mut data = grid();
        data.extend(std::iter::repeat_n([40.0, 40.0], 15));

        let envelope = EllipticEnvelope::fit(&data, &EnvelopeConfig::default()).unwrap();
        let location = envelope.location();
        assert!(location[0].abs() < 0.5, "location {location:?}");
        assert!(location[1].abs() < 0.5, "location {location:?}");
        assert_eq!(envelope.predict(&[40.0, 40.0]), Prediction::Outlier);
    }

    #[test]
    fn test_degenerate_data_still_fits() {
        let data = vec![[0.0, 0.0]; 10];
        let envelope = EllipticEnvelope::fit(&data, &EnvelopeConfig::default()).unwrap();

        assert_eq!(envelope.predict(&[0.0, 0.0]), Prediction::Normal);
        assert_eq!(envelope.predict(&[1.0, 1.0]), Prediction::Outlier);
    }

    #[test]
    fn test_single_row_fits() {
        let envelope =
            EllipticEnvelope::fit(&[[0.5, -0.5]], &EnvelopeConfig::default()).unwrap();
        assert_eq!(envelope.support_size(), 1);
        assert_eq!(envelope.predict(&[0.5, -0.5]), Prediction::Normal);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let data = grid();
        for contamination in [0.0, -0.1, 0.6, f64::NAN] {
            let config = EnvelopeConfig {
                contamination,
                support_fraction: None,
            };
            assert!(matches!(
                EllipticEnvelope::fit(&data, &config),
                Err(FitError::InvalidContamination(_))
            ));
        }

        let config = EnvelopeConfig {
            support_fraction: Some(1.5),
            ..EnvelopeConfig::default()
        };
        assert_eq!(
            EllipticEnvelope::fit(&data, &config),
            Err(FitError::InvalidSupportFraction(1.5))
        );
    }

    #[test]
    fn test_support_size() {
        let config = EnvelopeConfig::default();
        assert_eq!(config.support_size(200), 102);
        assert_eq!(config.support_size(1), 1);

        let config = EnvelopeConfig {
            support_fraction: Some(0.75),
            ..config
        };
        assert_eq!(config.support_size(10), 8);
    }
}
