use serde::{Deserialize, Serialize};

use crate::adaptive::config::DifficultyParams;
use crate::adaptive::metrics::RollingMetrics;
use crate::adaptive::types::DifficultyTier;

const THRESHOLD_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierChange {
    Raised,
    Lowered,
    Held,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierAssessment {
    pub tier: DifficultyTier,
    pub change: TierChange,
    pub accuracy: f64,
    pub confidence: f64,
    pub upgrade_threshold: f64,
    pub downgrade_threshold: f64,
}

impl TierAssessment {
    pub fn describe(&self, previous: DifficultyTier) -> String {
        match self.change {
            TierChange::InsufficientData => format!(
                "tier {} kept: not enough responses to adapt difficulty",
                previous.as_str()
            ),
            TierChange::Raised => format!(
                "tier raised {} -> {}: accuracy {:.2} >= {:.2} (confidence {:.2})",
                previous.as_str(),
                self.tier.as_str(),
                self.accuracy,
                self.upgrade_threshold,
                self.confidence
            ),
            TierChange::Lowered => format!(
                "tier lowered {} -> {}: accuracy {:.2} <= {:.2} (confidence {:.2})",
                previous.as_str(),
                self.tier.as_str(),
                self.accuracy,
                self.downgrade_threshold,
                self.confidence
            ),
            TierChange::Held => format!(
                "tier {} kept: accuracy {:.2} within ({:.2}, {:.2})",
                self.tier.as_str(),
                self.accuracy,
                self.downgrade_threshold,
                self.upgrade_threshold
            ),
        }
    }
}

/// Confidence in `[0, 1]` that grows linearly with the sample count.
pub fn confidence_factor(sample_count: usize, params: &DifficultyParams) -> f64 {
    if params.confidence_samples == 0 {
        return 1.0;
    }
    (sample_count as f64 / params.confidence_samples as f64).min(1.0)
}

/// Decides the next tier and records why. Moves at most one step.
pub fn assess_tier(
    current: DifficultyTier,
    metrics: &RollingMetrics,
    sample_count: usize,
    params: &DifficultyParams,
) -> TierAssessment {
    let confidence = confidence_factor(sample_count, params);
    let widen = params.confidence_margin * (1.0 - confidence);
    let upgrade_threshold = params.upgrade_accuracy + widen;
    let downgrade_threshold = params.downgrade_accuracy - widen;
    let accuracy = metrics.accuracy.clamp(0.0, 1.0);

    let mut assessment = TierAssessment {
        tier: current,
        change: TierChange::Held,
        accuracy,
        confidence,
        upgrade_threshold,
        downgrade_threshold,
    };

    if sample_count < params.min_samples {
        assessment.change = TierChange::InsufficientData;
        return assessment;
    }

    if accuracy + THRESHOLD_EPSILON >= upgrade_threshold {
        assessment.tier = current.harder();
    } else if accuracy - THRESHOLD_EPSILON <= downgrade_threshold {
        assessment.tier = current.easier();
    }

    assessment.change = match assessment.tier.cmp(&current) {
        std::cmp::Ordering::Greater => TierChange::Raised,
        std::cmp::Ordering::Less => TierChange::Lowered,
        std::cmp::Ordering::Equal => TierChange::Held,
    };
    assessment
}

pub fn next_tier(
    current: DifficultyTier,
    metrics: &RollingMetrics,
    sample_count: usize,
    params: &DifficultyParams,
) -> DifficultyTier {
    assess_tier(current, metrics, sample_count, params).tier
}
