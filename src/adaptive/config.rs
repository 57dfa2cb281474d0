use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const HISTORY_CAPACITY: usize = 100;
pub const ANALYSIS_WINDOW: usize = 5;
pub const TREND_WINDOW: usize = 10;
pub const TREND_MIN_SAMPLES: usize = 5;
pub const TREND_CHANGE_RATIO: f64 = 0.1;

pub const MIN_ADAPTATION_SAMPLES: usize = 3;
pub const CONFIDENCE_SAMPLES: usize = 5;
pub const UPGRADE_ACCURACY: f64 = 0.8;
pub const DOWNGRADE_ACCURACY: f64 = 0.4;
pub const CONFIDENCE_MARGIN: f64 = 0.1;

pub const MIN_MODALITY_SAMPLES: usize = 2;
pub const LOW_MODALITY_ACCURACY: f64 = 0.5;
pub const HIGH_MODALITY_ACCURACY: f64 = 0.8;
pub const PREFERENCE_STEP: f64 = 0.1;
pub const MIN_PREFERENCE_WEIGHT: f64 = 0.3;
pub const MAX_PREFERENCE_WEIGHT: f64 = 2.0;

pub const HISTORY_WEIGHT: f64 = 0.4;
pub const VARIETY_BONUS: f64 = 20.0;
pub const REPETITION_PENALTY: f64 = 10.0;
pub const REPETITION_THRESHOLD: u32 = 3;
pub const ITEM_AFFINITY_BONUS: f64 = 15.0;

pub const ADVANCE_MIN_ATTEMPTS: usize = 3;
pub const ADVANCE_MIN_CORRECT: usize = 3;
pub const ADVANCE_MIN_ACCURACY: f64 = 0.7;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsParams {
    pub history_capacity: usize,
    pub analysis_window: usize,
}

impl Default for MetricsParams {
    fn default() -> Self {
        Self {
            history_capacity: HISTORY_CAPACITY,
            analysis_window: ANALYSIS_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyParams {
    pub min_samples: usize,
    pub confidence_samples: usize,
    pub upgrade_accuracy: f64,
    pub downgrade_accuracy: f64,
    pub confidence_margin: f64,
}

impl Default for DifficultyParams {
    fn default() -> Self {
        Self {
            min_samples: MIN_ADAPTATION_SAMPLES,
            confidence_samples: CONFIDENCE_SAMPLES,
            upgrade_accuracy: UPGRADE_ACCURACY,
            downgrade_accuracy: DOWNGRADE_ACCURACY,
            confidence_margin: CONFIDENCE_MARGIN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceParams {
    pub min_samples: usize,
    pub low_accuracy: f64,
    pub high_accuracy: f64,
    pub step: f64,
    pub min_weight: f64,
    pub max_weight: f64,
}

impl Default for PreferenceParams {
    fn default() -> Self {
        Self {
            min_samples: MIN_MODALITY_SAMPLES,
            low_accuracy: LOW_MODALITY_ACCURACY,
            high_accuracy: HIGH_MODALITY_ACCURACY,
            step: PREFERENCE_STEP,
            min_weight: MIN_PREFERENCE_WEIGHT,
            max_weight: MAX_PREFERENCE_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionWeights {
    pub history_weight: f64,
    pub variety_bonus: f64,
    pub repetition_penalty: f64,
    pub repetition_threshold: u32,
    pub item_affinity_bonus: f64,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            history_weight: HISTORY_WEIGHT,
            variety_bonus: VARIETY_BONUS,
            repetition_penalty: REPETITION_PENALTY,
            repetition_threshold: REPETITION_THRESHOLD,
            item_affinity_bonus: ITEM_AFFINITY_BONUS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRule {
    pub min_attempts: usize,
    pub min_correct: usize,
    pub min_accuracy: f64,
}

impl Default for AdvanceRule {
    fn default() -> Self {
        Self {
            min_attempts: ADVANCE_MIN_ATTEMPTS,
            min_correct: ADVANCE_MIN_CORRECT,
            min_accuracy: ADVANCE_MIN_ACCURACY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningParams {
    pub timeout_median_factor: f64,
    pub modality_timeout_median_factor: f64,
    pub min_tuned_timeout_ms: f64,
    pub max_tuned_timeout_ms: f64,
    pub attempts_mean_factor: f64,
    pub min_tuned_attempts: u32,
    pub max_tuned_attempts: u32,
    pub visual_aid_below_accuracy: f64,
    pub verbose_feedback_below_accuracy: f64,
    pub modality_min_samples: usize,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            timeout_median_factor: 1.3,
            modality_timeout_median_factor: 1.2,
            min_tuned_timeout_ms: 3000.0,
            max_tuned_timeout_ms: 15000.0,
            attempts_mean_factor: 1.1,
            min_tuned_attempts: 2,
            max_tuned_attempts: 6,
            visual_aid_below_accuracy: 0.6,
            verbose_feedback_below_accuracy: 0.7,
            modality_min_samples: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub preference_enabled: bool,
    pub config_tuning_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            preference_enabled: true,
            config_tuning_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveConfig {
    pub metrics: MetricsParams,
    pub difficulty: DifficultyParams,
    pub preference: PreferenceParams,
    pub selection: SelectionWeights,
    pub advance: AdvanceRule,
    pub tuning: TuningParams,
    pub feature_flags: FeatureFlags,
}

impl AdaptiveConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(enabled) = env_flag("ADAPTIVE_PREFERENCE_ENABLED") {
            config.feature_flags.preference_enabled = enabled;
        }
        if let Some(enabled) = env_flag("ADAPTIVE_CONFIG_TUNING_ENABLED") {
            config.feature_flags.config_tuning_enabled = enabled;
        }

        config
    }

    /// Every min/max pair must be finite and ordered.
    pub fn validate(&self) -> Result<(), EngineError> {
        let pref = &self.preference;
        check_bounds("preference weight", pref.min_weight, pref.max_weight)?;

        let tuning = &self.tuning;
        check_bounds(
            "tuned timeout",
            tuning.min_tuned_timeout_ms,
            tuning.max_tuned_timeout_ms,
        )?;
        if tuning.min_tuned_attempts > tuning.max_tuned_attempts {
            return Err(EngineError::InvalidConfig(format!(
                "tuned attempts: min {} exceeds max {}",
                tuning.min_tuned_attempts, tuning.max_tuned_attempts
            )));
        }
        Ok(())
    }
}

fn check_bounds(name: &str, min: f64, max: f64) -> Result<(), EngineError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(EngineError::InvalidConfig(format!(
            "{name}: bounds must be finite (min {min}, max {max})"
        )));
    }
    if min > max {
        return Err(EngineError::InvalidConfig(format!(
            "{name}: min {min} exceeds max {max}"
        )));
    }
    Ok(())
}

fn env_flag(key: &str) -> Option<bool> {
    parse_flag(&std::env::var(key).ok()?)
}

pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_numeric_and_word_forms() {
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" FALSE "), Some(false));
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag(""), None);
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(AdaptiveConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_or_non_finite_bounds_fail_validation() {
        let mut config = AdaptiveConfig::default();
        config.preference.max_weight = 0.1;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));

        let mut config = AdaptiveConfig::default();
        config.tuning.max_tuned_timeout_ms = f64::NAN;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));

        let mut config = AdaptiveConfig::default();
        config.tuning.min_tuned_attempts = 7;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }
}
