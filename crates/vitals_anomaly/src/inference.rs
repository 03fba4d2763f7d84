use anomaly_model::{FeatureTransformer, OutlierClassifier};
use vitals_structs::{Prediction, Sample};

/// Classifies one validated sample.
///
/// A sample whose heart rate and respiration rate both equal the sensor-absent
/// marker is answered with [`Prediction::SensorAbsent`] without consulting the
/// scaler or the classifier. Otherwise the features are scaled and classified.
#[must_use]
pub fn classify<C, T>(sample: &Sample, classifier: &C, scaler: &T) -> Prediction
where
    C: OutlierClassifier + ?Sized,
    T: FeatureTransformer + ?Sized,
{
    if sample.is_sensor_absent() {
        return Prediction::SensorAbsent;
    }

    let scaled = scaler.transform(&sample.features());
    classifier.predict(&scaled)
}
