//! Presentation tuning: response timeout, attempt budget and feedback aids derived from
//! recent performance.

use serde::{Deserialize, Serialize};

use crate::adaptive::config::TuningParams;
use crate::adaptive::metrics::{compute_metrics, MetricsScope, RollingMetrics};
use crate::adaptive::profile::{AdaptationConfig, LearnerProfile};
use crate::adaptive::types::{DifficultyTier, StimulusType};

fn tuned_timeout(median_ms: f64, factor: f64, params: &TuningParams) -> Option<u32> {
    if !median_ms.is_finite() || median_ms <= 0.0 {
        return None;
    }
    let timeout = (median_ms * factor).clamp(params.min_tuned_timeout_ms, params.max_tuned_timeout_ms);
    Some(timeout.round() as u32)
}

fn tuned_attempts(attempts_mean: f64, params: &TuningParams) -> u32 {
    let scaled = (attempts_mean * params.attempts_mean_factor).ceil();
    let min = params.min_tuned_attempts as f64;
    let max = params.max_tuned_attempts as f64;
    if scaled.is_finite() {
        scaled.clamp(min, max) as u32
    } else {
        params.min_tuned_attempts
    }
}

/// Re-derives the learner's adaptation config from the analysis window.
pub fn tune_adaptation_config(
    current: &AdaptationConfig,
    window: &RollingMetrics,
    params: &TuningParams,
) -> AdaptationConfig {
    if window.is_empty() {
        return current.clone();
    }

    let mut tuned = current.clone();
    if window.latency_samples > 0 {
        if let Some(timeout) = tuned_timeout(window.latency_median, params.timeout_median_factor, params) {
            tuned.response_timeout_ms = timeout;
        }
    }
    tuned.max_attempts = tuned_attempts(window.attempts_mean, params);
    tuned.show_visual_aid = window.accuracy < params.visual_aid_below_accuracy;
    tuned.verbose_feedback = window.accuracy < params.verbose_feedback_below_accuracy;
    tuned.clamped()
}

/// Presentation settings for a single modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalityConfig {
    pub stimulus_type: StimulusType,
    pub difficulty_tier: DifficultyTier,
    pub response_timeout_ms: u32,
    pub max_attempts: u32,
    pub show_visual_aid: bool,
    pub verbose_feedback: bool,
    pub preference_weight: f64,
    pub optimized: bool,
    pub based_on: usize,
}

pub fn effective_config(
    profile: &LearnerProfile,
    modality: StimulusType,
    params: &TuningParams,
) -> ModalityConfig {
    let base = &profile.adaptation_config;
    let mut config = ModalityConfig {
        stimulus_type: modality,
        difficulty_tier: profile.difficulty_tier,
        response_timeout_ms: base.response_timeout_ms,
        max_attempts: base.max_attempts,
        show_visual_aid: base.show_visual_aid,
        verbose_feedback: base.verbose_feedback,
        preference_weight: *profile.modality_preference.get(modality),
        optimized: false,
        based_on: 0,
    };

    let metrics = compute_metrics(&profile.history, &MetricsScope::Stimulus(modality));
    if metrics.total < params.modality_min_samples {
        return config;
    }

    if let Some(timeout) = tuned_timeout(
        metrics.latency_median,
        params.modality_timeout_median_factor,
        params,
    ) {
        config.response_timeout_ms = timeout;
    }
    config.max_attempts = tuned_attempts(metrics.attempts_mean, params);
    config.show_visual_aid = metrics.accuracy < params.visual_aid_below_accuracy;
    config.verbose_feedback = metrics.accuracy < params.verbose_feedback_below_accuracy;
    config.optimized = true;
    config.based_on = metrics.total;
    config
}
