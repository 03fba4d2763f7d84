use serde::{Deserialize, Serialize};

/// Outcome of classifying one sample.
///
/// Serialized as its numeric code: `-1` outlier, `1` normal, `-10` sensor absent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(into = "i32", try_from = "i32")]
#[strum(serialize_all = "snake_case")]
pub enum Prediction {
    /// The classifier placed the sample outside the user's normal envelope.
    Outlier,
    /// The classifier placed the sample inside the user's normal envelope.
    Normal,
    /// The caller signalled that no sensor data was available. The model is not consulted.
    SensorAbsent,
}

impl Prediction {
    /// Numeric code returned to callers.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Outlier => -1,
            Self::Normal => 1,
            Self::SensorAbsent => -10,
        }
    }

    /// Maps a classifier decision value onto the two classifier outcomes.
    ///
    /// Non-negative values are inliers.
    #[must_use]
    pub fn from_decision(value: f64) -> Self {
        if value >= 0.0 {
            Self::Normal
        } else {
            Self::Outlier
        }
    }
}

impl From<Prediction> for i32 {
    fn from(prediction: Prediction) -> Self {
        prediction.code()
    }
}

impl TryFrom<i32> for Prediction {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(Self::Outlier),
            1 => Ok(Self::Normal),
            -10 => Ok(Self::SensorAbsent),
            other => Err(format!("unknown prediction code {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Prediction::Outlier.code(), -1);
        assert_eq!(Prediction::Normal.code(), 1);
        assert_eq!(Prediction::SensorAbsent.code(), -10);
    }

    #[test]
    fn test_serializes_as_code() {
        assert_eq!(serde_json::to_string(&Prediction::Outlier).unwrap(), "-1");
        assert_eq!(
            serde_json::from_str::<Prediction>("-10").unwrap(),
            Prediction::SensorAbsent
        );
        assert!(serde_json::from_str::<Prediction>("0").is_err());
    }

    #[test]
    fn test_from_decision_boundary_is_normal() {
        assert_eq!(Prediction::from_decision(0.0), Prediction::Normal);
        assert_eq!(Prediction::from_decision(-1e-9), Prediction::Outlier);
    }
}
