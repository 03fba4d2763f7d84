//! Small fixed-size linear algebra for two-feature rows.

#![allow(clippy::cast_precision_loss)]

use vitals_structs::{FEATURE_COUNT, FeatureVector};

/// A symmetric 2x2 matrix (covariance or precision).
pub type Matrix2 = [[f64; FEATURE_COUNT]; FEATURE_COUNT];

pub const IDENTITY: Matrix2 = [[1.0, 0.0], [0.0, 1.0]];

/// Relative size of the ridge added to a singular covariance before inversion.
const RIDGE: f64 = 1e-9;

/// Column means. `points` must not be empty.
pub fn mean(points: &[FeatureVector]) -> FeatureVector {
    let n = points.len() as f64;
    let mut sum = [0.0; FEATURE_COUNT];
    for point in points {
        sum[0] += point[0];
        sum[1] += point[1];
    }
    [sum[0] / n, sum[1] / n]
}

/// Population covariance (divides by `n`) around `center`.
pub fn covariance(points: &[FeatureVector], center: &FeatureVector) -> Matrix2 {
    let n = points.len() as f64;
    let mut cov = [[0.0; FEATURE_COUNT]; FEATURE_COUNT];
    for point in points {
        let d = [point[0] - center[0], point[1] - center[1]];
        cov[0][0] += d[0] * d[0];
        cov[0][1] += d[0] * d[1];
        cov[1][1] += d[1] * d[1];
    }
    cov[0][0] /= n;
    cov[0][1] /= n;
    cov[1][1] /= n;
    cov[1][0] = cov[0][1];
    cov
}

pub fn determinant(m: &Matrix2) -> f64 {
    m[0][0].mul_add(m[1][1], -(m[0][1] * m[1][0]))
}

pub fn scale(m: &Matrix2, factor: f64) -> Matrix2 {
    [
        [m[0][0] * factor, m[0][1] * factor],
        [m[1][0] * factor, m[1][1] * factor],
    ]
}

/// Inverse of a covariance matrix.
///
/// A (near-)singular matrix gets a small ridge on its diagonal first, so degenerate
/// training data still yields a usable precision matrix.
pub fn inverse(m: &Matrix2) -> Matrix2 {
    let magnitude = (m[0][0].abs() + m[1][1].abs()).max(1.0);
    let mut m = *m;
    let mut det = determinant(&m);

    if det <= f64::EPSILON * magnitude * magnitude {
        let ridge = RIDGE * magnitude;
        m[0][0] += ridge;
        m[1][1] += ridge;
        det = determinant(&m);
    }

    [
        [m[1][1] / det, -m[0][1] / det],
        [-m[1][0] / det, m[0][0] / det],
    ]
}

/// Squared Mahalanobis distance of `x` from `center` under `precision`.
pub fn mahalanobis_sq(x: &FeatureVector, center: &FeatureVector, precision: &Matrix2) -> f64 {
    let d = [x[0] - center[0], x[1] - center[1]];
    let p0 = precision[0][0].mul_add(d[0], precision[0][1] * d[1]);
    let p1 = precision[1][0].mul_add(d[0], precision[1][1] * d[1]);
    d[0].mul_add(p0, d[1] * p1)
}

/// Percentile with linear interpolation between closest ranks. `q` is in `[0, 100]`.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let weight = rank - rank.floor();

    sorted[lo] + (sorted[hi] - sorted[lo]) * weight
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_mean_and_covariance() {
        let points = [[1.0, 2.0], [3.0, 6.0]];
        let center = mean(&points);
        assert_eq!(center, [2.0, 4.0]);

        let cov = covariance(&points, &center);
        assert!(approx(cov[0][0], 1.0));
        assert!(approx(cov[0][1], 2.0));
        assert!(approx(cov[1][1], 4.0));
        assert!(approx(cov[1][0], cov[0][1]));
    }

    #[test]
    fn test_inverse_of_regular_matrix() {
        let m = [[4.0, 1.0], [1.0, 3.0]];
        let inv = inverse(&m);
        // m * inv = I
        assert!(approx(m[0][0] * inv[0][0] + m[0][1] * inv[1][0], 1.0));
        assert!(approx(m[0][0] * inv[0][1] + m[0][1] * inv[1][1], 0.0));
        assert!(approx(m[1][0] * inv[0][0] + m[1][1] * inv[1][0], 0.0));
    }

    #[test]
    fn test_inverse_of_singular_matrix_is_finite() {
        let inv = inverse(&[[0.0, 0.0], [0.0, 0.0]]);
        assert!(inv.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_mahalanobis_with_identity_is_squared_euclidean() {
        assert!(approx(mahalanobis_sq(&[3.0, 4.0], &[0.0, 0.0], &IDENTITY), 25.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert!(approx(percentile(&values, 0.0), 1.0));
        assert!(approx(percentile(&values, 100.0), 4.0));
        assert!(approx(percentile(&values, 50.0), 2.5));
        assert!(approx(percentile(&values, 12.0), 1.36));
        assert!(approx(median(&[7.0]), 7.0));
    }
}
