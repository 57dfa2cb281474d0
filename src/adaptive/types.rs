use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulusType {
    Visual,
    Auditory,
    Tactile,
}

impl StimulusType {
    /// Canonical order, also used as the final tie-break when scoring modalities.
    pub const ALL: [StimulusType; 3] = [Self::Visual, Self::Auditory, Self::Tactile];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visual => "visual",
            Self::Auditory => "auditory",
            Self::Tactile => "tactile",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "visual" => Some(Self::Visual),
            "auditory" => Some(Self::Auditory),
            "tactile" => Some(Self::Tactile),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl DifficultyTier {
    pub const ALL: [DifficultyTier; 3] = [Self::Easy, Self::Medium, Self::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn harder(&self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            _ => Self::Hard,
        }
    }

    pub fn easier(&self) -> Self {
        match self {
            Self::Hard => Self::Medium,
            _ => Self::Easy,
        }
    }

    /// The next tier up, or `None` at the top.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Easy => Some(Self::Medium),
            Self::Medium => Some(Self::Hard),
            Self::Hard => None,
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::Easy => 1,
            Self::Medium => 2,
            Self::Hard => 3,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Correct,
    Wrong,
    NoResponse,
}

impl ResponseResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Wrong => "wrong",
            Self::NoResponse => "no_response",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "correct" => Some(Self::Correct),
            "wrong" => Some(Self::Wrong),
            "no_response" => Some(Self::NoResponse),
            _ => None,
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, Self::Correct)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Worsening,
    #[default]
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Worsening => "worsening",
            Self::Stable => "stable",
        }
    }
}

/// One value per stimulus modality.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerModality<T> {
    pub visual: T,
    pub auditory: T,
    pub tactile: T,
}

impl<T: Clone> PerModality<T> {
    pub fn splat(value: T) -> Self {
        Self {
            visual: value.clone(),
            auditory: value.clone(),
            tactile: value,
        }
    }
}

impl<T> PerModality<T> {
    pub fn from_fn(mut f: impl FnMut(StimulusType) -> T) -> Self {
        Self {
            visual: f(StimulusType::Visual),
            auditory: f(StimulusType::Auditory),
            tactile: f(StimulusType::Tactile),
        }
    }

    pub fn get(&self, modality: StimulusType) -> &T {
        match modality {
            StimulusType::Visual => &self.visual,
            StimulusType::Auditory => &self.auditory,
            StimulusType::Tactile => &self.tactile,
        }
    }

    pub fn get_mut(&mut self, modality: StimulusType) -> &mut T {
        match modality {
            StimulusType::Visual => &mut self.visual,
            StimulusType::Auditory => &mut self.auditory,
            StimulusType::Tactile => &mut self.tactile,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (StimulusType, &T)> {
        StimulusType::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}

/// Modality preference weights, bounded to `[MIN_PREFERENCE_WEIGHT, MAX_PREFERENCE_WEIGHT]`.
pub type PreferenceWeights = PerModality<f64>;

/// Per-session usage counts for each modality.
pub type ModalityUsage = PerModality<u32>;

pub fn default_preferences() -> PreferenceWeights {
    PerModality::splat(1.0)
}

/// A single learner response. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEvent {
    pub timestamp: DateTime<Utc>,
    pub stimulus_type: StimulusType,
    pub item_id: String,
    pub result: ResponseResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    pub attempts: u32,
}

impl ResponseEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        stimulus_type: StimulusType,
        item_id: impl Into<String>,
        result: ResponseResult,
        latency_ms: Option<f64>,
        attempts: u32,
    ) -> Self {
        Self {
            timestamp,
            stimulus_type,
            item_id: item_id.into(),
            result,
            latency_ms,
            attempts,
        }
    }

    /// Parses an event from JSON, reporting malformed input as `InvalidEvent`.
    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let event: Self = serde_json::from_str(raw)
            .map_err(|e| EngineError::InvalidEvent(format!("malformed event: {e}")))?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.item_id.trim().is_empty() {
            return Err(EngineError::InvalidEvent("itemId is empty".to_string()));
        }
        if let Some(latency) = self.latency_ms {
            if !latency.is_finite() || latency <= 0.0 {
                return Err(EngineError::InvalidEvent(format!(
                    "latencyMs must be positive, got {latency}"
                )));
            }
        }
        if self.attempts == 0 {
            return Err(EngineError::InvalidEvent(
                "attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_correct(&self) -> bool {
        self.result.is_correct()
    }
}
