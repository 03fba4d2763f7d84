use serde::{Deserialize, Serialize};

/// Identifier of the monitored user. One model bundle exists per user.
pub type UserId = i64;

/// Number of features fed to the scaler and classifier: heart rate and respiration rate.
pub const FEATURE_COUNT: usize = 2;

/// A single `[hr, rr]` feature row.
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Value a sensor reports on both channels when it has no reading.
pub const SENSOR_ABSENT_VALUE: f64 = -1.0;

/// A validated vital-sign sample.
///
/// Built only by the parser from a complete record, so every field is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub user_id: UserId,
    /// Heart rate in beats per minute.
    pub hr: f64,
    /// Respiration rate in breaths per minute.
    pub rr: f64,
    pub in_room: bool,
    /// Timestamp as received, expected as `YYYY-MM-DD HH:MM:SS`.
    pub ts: String,
}

impl Sample {
    /// Returns the `[hr, rr]` feature row used by the model.
    #[must_use]
    pub const fn features(&self) -> FeatureVector {
        [self.hr, self.rr]
    }

    /// True when both channels carry the sensor-absent marker.
    ///
    /// The comparison is exact: values close to `-1` are ordinary readings.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_sensor_absent(&self) -> bool {
        self.hr == SENSOR_ABSENT_VALUE && self.rr == SENSOR_ABSENT_VALUE
    }

    /// Serializes the sample as a comma-joined record in canonical field order.
    ///
    /// `in_room` is written as `0`/`1` so the output parses back into the same sample.
    #[must_use]
    pub fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.user_id,
            self.hr,
            self.rr,
            u8::from(self.in_room),
            self.ts
        )
    }
}
