use crate::adaptive::config::PreferenceParams;
use crate::adaptive::metrics::RollingMetrics;
use crate::adaptive::types::{PerModality, PreferenceWeights};

pub fn clamp_weight(weight: f64, params: &PreferenceParams) -> f64 {
    if !weight.is_finite() {
        return 1.0_f64.clamp(params.min_weight, params.max_weight);
    }
    weight.clamp(params.min_weight, params.max_weight)
}

/// Nudges each modality weight by its accuracy in the evaluation window.
///
/// Modalities with fewer than `min_samples` events keep their weight. Every output
/// weight is clamped into `[min_weight, max_weight]`.
pub fn next_preferences(
    current: &PreferenceWeights,
    per_type: &PerModality<RollingMetrics>,
    params: &PreferenceParams,
) -> PreferenceWeights {
    PerModality::from_fn(|modality| {
        let weight = *current.get(modality);
        let metrics = per_type.get(modality);
        if metrics.total < params.min_samples {
            return clamp_weight(weight, params);
        }

        let adjustment = if metrics.accuracy < params.low_accuracy {
            -params.step
        } else if metrics.accuracy > params.high_accuracy {
            params.step
        } else {
            0.0
        };
        clamp_weight(weight + adjustment, params)
    })
}
