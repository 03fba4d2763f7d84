#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use crate::FitError;

/// Splits `rows` in order into a training front and a validation tail.
///
/// The tail holds `ceil(validation_ratio * n)` rows. Rows are never shuffled, so
/// the validation part is always the most recent data.
///
/// # Errors
///
/// Returns [`FitError::InvalidValidationRatio`] unless the ratio is in `[0, 1)`.
pub fn chronological_split<T>(
    rows: &[T],
    validation_ratio: f64,
) -> Result<(&[T], &[T]), FitError> {
    if !(0.0..1.0).contains(&validation_ratio) {
        return Err(FitError::InvalidValidationRatio(validation_ratio));
    }

    let validation = ((validation_ratio * rows.len() as f64).ceil() as usize).min(rows.len());
    Ok(rows.split_at(rows.len() - validation))
}
