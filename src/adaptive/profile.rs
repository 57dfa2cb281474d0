//! Learner profile: the persisted aggregate, plus its defensive validation and schema
//! migration.
//!
//! Validation works field by field on the raw JSON form so that a single corrupt field
//! only resets that field. Migration runs the registered steps in version order and is a
//! no-op for profiles that are already current.

use std::collections::VecDeque;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adaptive::config::{HISTORY_CAPACITY, MAX_PREFERENCE_WEIGHT, MIN_PREFERENCE_WEIGHT};
use crate::adaptive::types::{
    default_preferences, DifficultyTier, PerModality, PreferenceWeights, ResponseEvent,
    ResponseResult, StimulusType,
};
use crate::error::EngineError;

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

pub const MIN_RESPONSE_TIMEOUT_MS: u32 = 2000;
pub const MAX_RESPONSE_TIMEOUT_MS: u32 = 20000;
pub const MIN_MAX_ATTEMPTS: u32 = 1;
pub const MAX_MAX_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationConfig {
    pub response_timeout_ms: u32,
    pub max_attempts: u32,
    pub show_visual_aid: bool,
    pub verbose_feedback: bool,
    pub adaptive_enabled: bool,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 5000,
            max_attempts: 3,
            show_visual_aid: true,
            verbose_feedback: true,
            adaptive_enabled: true,
        }
    }
}

impl AdaptationConfig {
    pub fn clamped(mut self) -> Self {
        self.response_timeout_ms = self
            .response_timeout_ms
            .clamp(MIN_RESPONSE_TIMEOUT_MS, MAX_RESPONSE_TIMEOUT_MS);
        self.max_attempts = self.max_attempts.clamp(MIN_MAX_ATTEMPTS, MAX_MAX_ATTEMPTS);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerStats {
    pub total_responses: u64,
    pub total_correct: u64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfile {
    pub schema_version: u32,
    pub difficulty_tier: DifficultyTier,
    pub modality_preference: PreferenceWeights,
    pub adaptation_config: AdaptationConfig,
    pub history: VecDeque<ResponseEvent>,
    pub stats: LearnerStats,
}

impl Default for LearnerProfile {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            difficulty_tier: DifficultyTier::Medium,
            modality_preference: default_preferences(),
            adaptation_config: AdaptationConfig::default(),
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            stats: LearnerStats::default(),
        }
    }
}

impl LearnerProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses persisted JSON text, then validates and migrates it.
    ///
    /// Text that is not JSON at all is a `CorruptProfile` error; anything that parses is
    /// recovered field by field.
    pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| EngineError::CorruptProfile(e.to_string()))?;
        Ok(migrate(validate(&value)))
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn latest_event(&self) -> Option<&ResponseEvent> {
        self.history.back()
    }

    /// The newest `size` events, oldest first.
    pub fn recent(&self, size: usize) -> impl Iterator<Item = &ResponseEvent> {
        let skip = self.history.len().saturating_sub(size);
        self.history.iter().skip(skip)
    }

    /// Appends an event, evicting the oldest entries beyond `capacity`.
    pub fn push_event(&mut self, event: ResponseEvent, capacity: usize) {
        let capacity = capacity.clamp(1, HISTORY_CAPACITY);
        self.history.push_back(event);
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }

    /// Re-applies every field invariant to an already typed profile.
    pub fn sanitized(mut self) -> Self {
        for modality in StimulusType::ALL {
            let weight = self.modality_preference.get_mut(modality);
            *weight = sanitize_weight(*weight);
        }
        self.adaptation_config = self.adaptation_config.clamped();

        let mut history = VecDeque::with_capacity(self.history.len());
        let mut last: Option<DateTime<Utc>> = None;
        for event in self.history.drain(..) {
            if event.validate().is_err() || last.is_some_and(|ts| event.timestamp < ts) {
                continue;
            }
            last = Some(event.timestamp);
            history.push_back(event);
        }
        while history.len() > HISTORY_CAPACITY {
            history.pop_front();
        }
        self.history = history;

        self.stats.total_correct = self.stats.total_correct.min(self.stats.total_responses);
        self
    }
}

fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() {
        weight.clamp(MIN_PREFERENCE_WEIGHT, MAX_PREFERENCE_WEIGHT)
    } else {
        1.0
    }
}

/// Builds a profile from raw persisted JSON. Never fails: every invalid or missing field
/// falls back to its own default, and invalid history entries are dropped.
pub fn validate(raw: &Value) -> LearnerProfile {
    let Some(obj) = raw.as_object() else {
        tracing::warn!("profile is not a structured record, starting from defaults");
        return LearnerProfile::default();
    };

    let defaults = LearnerProfile::default();

    let schema_version = obj
        .get("schemaVersion")
        .or_else(|| obj.get("version"))
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);

    let difficulty_tier = obj
        .get("difficultyTier")
        .and_then(Value::as_str)
        .and_then(DifficultyTier::parse)
        .unwrap_or(defaults.difficulty_tier);

    let modality_preference = match obj.get("modalityPreference").and_then(Value::as_object) {
        Some(prefs) => PerModality::from_fn(|modality| {
            prefs
                .get(modality.as_str())
                .and_then(Value::as_f64)
                .filter(|w| w.is_finite())
                .map(sanitize_weight)
                .unwrap_or(1.0)
        }),
        None => defaults.modality_preference,
    };

    let adaptation_config = obj
        .get("adaptationConfig")
        .map(validate_adaptation_config)
        .unwrap_or_default();

    let history = match obj.get("history").and_then(Value::as_array) {
        Some(entries) => validate_history(entries),
        None => VecDeque::new(),
    };

    let stats = obj
        .get("stats")
        .map(validate_stats)
        .unwrap_or_default();

    LearnerProfile {
        schema_version,
        difficulty_tier,
        modality_preference,
        adaptation_config,
        history,
        stats,
    }
}

fn validate_adaptation_config(raw: &Value) -> AdaptationConfig {
    let defaults = AdaptationConfig::default();
    let Some(obj) = raw.as_object() else {
        return defaults;
    };

    let response_timeout_ms = positive_number(obj.get("responseTimeoutMs"))
        .map(|v| {
            v.round()
                .clamp(MIN_RESPONSE_TIMEOUT_MS as f64, MAX_RESPONSE_TIMEOUT_MS as f64) as u32
        })
        .unwrap_or(defaults.response_timeout_ms);
    let max_attempts = positive_number(obj.get("maxAttempts"))
        .map(|v| v.round().clamp(MIN_MAX_ATTEMPTS as f64, MAX_MAX_ATTEMPTS as f64) as u32)
        .unwrap_or(defaults.max_attempts);

    let flag = |key: &str, default: bool| obj.get(key).and_then(Value::as_bool).unwrap_or(default);

    AdaptationConfig {
        response_timeout_ms,
        max_attempts,
        show_visual_aid: flag("showVisualAid", defaults.show_visual_aid),
        verbose_feedback: flag("verboseFeedback", defaults.verbose_feedback),
        adaptive_enabled: flag("adaptiveEnabled", defaults.adaptive_enabled),
    }
}

fn validate_history(entries: &[Value]) -> VecDeque<ResponseEvent> {
    let mut history = VecDeque::with_capacity(entries.len().min(HISTORY_CAPACITY));
    let mut last: Option<DateTime<Utc>> = None;
    let mut dropped = 0usize;

    for entry in entries {
        match validate_event(entry) {
            Some(event) if last.map_or(true, |ts| event.timestamp >= ts) => {
                last = Some(event.timestamp);
                history.push_back(event);
            }
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "dropped invalid history entries");
    }

    while history.len() > HISTORY_CAPACITY {
        history.pop_front();
    }
    history
}

fn validate_event(raw: &Value) -> Option<ResponseEvent> {
    let obj = raw.as_object()?;

    let timestamp = parse_timestamp(obj.get("timestamp")?)?;
    let stimulus_type = StimulusType::parse(obj.get("stimulusType")?.as_str()?)?;
    let item_id = match obj.get("itemId")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let result = ResponseResult::parse(obj.get("result")?.as_str()?)?;
    let latency_ms = match obj.get("latencyMs") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.as_f64()?),
    };
    let attempts = obj
        .get("attempts")?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())?;

    let event = ResponseEvent {
        timestamp,
        stimulus_type,
        item_id,
        result,
        latency_ms,
        attempts,
    };
    event.validate().ok()?;
    Some(event)
}

fn validate_stats(raw: &Value) -> LearnerStats {
    let Some(obj) = raw.as_object() else {
        return LearnerStats::default();
    };

    let total_responses = obj.get("totalResponses").and_then(Value::as_u64).unwrap_or(0);
    let total_correct = obj
        .get("totalCorrect")
        .and_then(Value::as_u64)
        .unwrap_or(0)
        .min(total_responses);

    LearnerStats {
        total_responses,
        total_correct,
        last_activity_at: obj.get("lastActivityAt").and_then(parse_timestamp),
        created_at: obj.get("createdAt").and_then(parse_timestamp),
    }
}

fn positive_number(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Accepts RFC 3339 strings or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

struct MigrationStep {
    version: u32,
    name: &'static str,
    apply: fn(&mut LearnerProfile),
}

fn migration_steps() -> [MigrationStep; 2] {
    [
        MigrationStep {
            version: 1,
            name: "adaptation config",
            apply: |profile| {
                profile.adaptation_config = profile.adaptation_config.clone().clamped();
            },
        },
        MigrationStep {
            version: 2,
            name: "activity stats",
            apply: |profile| {
                if profile.stats.created_at.is_none() {
                    profile.stats.created_at = profile
                        .history
                        .front()
                        .map(|e| e.timestamp)
                        .or(profile.stats.last_activity_at);
                }
                if profile.stats.last_activity_at.is_none() {
                    profile.stats.last_activity_at = profile.history.back().map(|e| e.timestamp);
                }
                let recorded = profile.history.len() as u64;
                let recorded_correct =
                    profile.history.iter().filter(|e| e.is_correct()).count() as u64;
                profile.stats.total_responses = profile.stats.total_responses.max(recorded);
                profile.stats.total_correct = profile.stats.total_correct.max(recorded_correct);
                profile.adaptation_config.adaptive_enabled = true;
            },
        },
    ]
}

/// Brings a profile up to `CURRENT_SCHEMA_VERSION`. Idempotent.
pub fn migrate(profile: LearnerProfile) -> LearnerProfile {
    if profile.schema_version >= CURRENT_SCHEMA_VERSION {
        return profile;
    }

    let from = profile.schema_version;
    let mut profile = profile.sanitized();
    for step in migration_steps().iter().filter(|s| s.version > from) {
        (step.apply)(&mut profile);
        tracing::debug!(version = step.version, step = step.name, "applied profile migration");
    }
    profile.schema_version = CURRENT_SCHEMA_VERSION;

    tracing::info!(from, to = CURRENT_SCHEMA_VERSION, "migrated learner profile");
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_object_falls_back_to_defaults() {
        assert_eq!(validate(&json!([1, 2, 3])), LearnerProfile::default());
        assert_eq!(validate(&json!("oops")), LearnerProfile::default());
    }

    #[test]
    fn corrupt_field_only_resets_itself() {
        let raw = json!({
            "schemaVersion": 2,
            "difficultyTier": "impossible",
            "modalityPreference": { "visual": 1.4, "auditory": "loud", "tactile": 9.0 },
            "adaptationConfig": { "responseTimeoutMs": 500, "maxAttempts": 4, "showVisualAid": "yes" },
        });
        let profile = validate(&raw);
        assert_eq!(profile.difficulty_tier, DifficultyTier::Medium);
        assert_eq!(profile.modality_preference.visual, 1.4);
        assert_eq!(profile.modality_preference.auditory, 1.0);
        assert_eq!(profile.modality_preference.tactile, MAX_PREFERENCE_WEIGHT);
        assert_eq!(profile.adaptation_config.response_timeout_ms, MIN_RESPONSE_TIMEOUT_MS);
        assert_eq!(profile.adaptation_config.max_attempts, 4);
        assert!(profile.adaptation_config.show_visual_aid);
    }

    #[test]
    fn invalid_history_entries_are_dropped() {
        let raw = json!({
            "history": [
                { "timestamp": "2025-08-11T10:00:00Z", "stimulusType": "visual", "itemId": "casa", "result": "correct", "latencyMs": 1200.0, "attempts": 1 },
                { "timestamp": "2025-08-11T10:00:05Z", "stimulusType": "smell", "itemId": "casa", "result": "correct", "attempts": 1 },
                { "timestamp": "2025-08-11T10:00:06Z", "stimulusType": "visual", "itemId": "casa", "result": "wrong", "latencyMs": -3, "attempts": 1 },
                { "timestamp": "2025-08-11T10:00:07Z", "stimulusType": "auditory", "itemId": 3, "result": "no_response", "attempts": 2 },
                { "timestamp": "2025-08-11T09:00:00Z", "stimulusType": "visual", "itemId": "casa", "result": "correct", "attempts": 1 },
                { "stimulusType": "visual", "itemId": "casa", "result": "correct", "attempts": 1 },
            ]
        });
        let profile = validate(&raw);
        assert_eq!(profile.history.len(), 2);
        assert_eq!(profile.history[1].item_id, "3");
        assert_eq!(profile.history[1].latency_ms, None);
    }

    #[test]
    fn history_is_capped_to_newest_entries() {
        let entries: Vec<Value> = (0..150)
            .map(|i| {
                json!({
                    "timestamp": 1_700_000_000_000i64 + i * 1000,
                    "stimulusType": "visual",
                    "itemId": format!("item-{i}"),
                    "result": "correct",
                    "attempts": 1,
                })
            })
            .collect();
        let profile = validate(&json!({ "history": entries }));
        assert_eq!(profile.history.len(), HISTORY_CAPACITY);
        assert_eq!(profile.history.front().unwrap().item_id, "item-50");
    }

    #[test]
    fn validate_is_a_fixed_point() {
        let raw = json!({
            "schemaVersion": 1,
            "difficultyTier": "hard",
            "modalityPreference": { "visual": 0.1 },
            "history": [
                { "timestamp": "2025-08-11T10:00:00.123Z", "stimulusType": "tactile", "itemId": "bola", "result": "wrong", "latencyMs": 4321.5, "attempts": 2 }
            ],
            "stats": { "totalResponses": 3, "totalCorrect": 7, "lastActivityAt": "2025-08-11T10:00:00Z" }
        });
        let once = validate(&raw);
        let twice = validate(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
        assert_eq!(once.stats.total_correct, 3);
    }

    #[test]
    fn migrates_legacy_profile_without_config() {
        let raw = json!({ "schemaVersion": 0, "difficultyTier": "easy" });
        let profile = migrate(validate(&raw));
        assert_eq!(profile.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(profile.adaptation_config, AdaptationConfig::default());
        assert_eq!(profile.difficulty_tier, DifficultyTier::Easy);
    }

    #[test]
    fn migrate_is_idempotent() {
        let raw = json!({
            "version": 1,
            "adaptationConfig": { "adaptiveEnabled": false },
            "history": [
                { "timestamp": "2025-08-11T10:00:00Z", "stimulusType": "visual", "itemId": "casa", "result": "correct", "attempts": 1 }
            ]
        });
        let once = migrate(validate(&raw));
        let twice = migrate(once.clone());
        assert_eq!(once, twice);
        assert!(once.adaptation_config.adaptive_enabled);
        assert_eq!(once.stats.total_responses, 1);
        assert_eq!(once.stats.created_at, Some(once.history[0].timestamp));
    }

    #[test]
    fn current_profile_is_untouched_by_migrate() {
        let mut profile = LearnerProfile::default();
        profile.adaptation_config.adaptive_enabled = false;
        assert_eq!(migrate(profile.clone()), profile);
    }

    #[test]
    fn unparseable_text_is_corrupt() {
        assert!(matches!(
            LearnerProfile::from_json_str("{not json"),
            Err(EngineError::CorruptProfile(_))
        ));
    }

    #[test]
    fn push_event_evicts_oldest() {
        let mut profile = LearnerProfile::default();
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        for i in 0..105 {
            profile.push_event(
                ResponseEvent::new(
                    base + chrono::Duration::seconds(i),
                    StimulusType::Visual,
                    format!("w{i}"),
                    ResponseResult::Correct,
                    None,
                    1,
                ),
                HISTORY_CAPACITY,
            );
        }
        assert_eq!(profile.history.len(), HISTORY_CAPACITY);
        assert_eq!(profile.history.front().unwrap().item_id, "w5");
        assert_eq!(profile.recent(3).count(), 3);
        assert_eq!(profile.recent(3).next().unwrap().item_id, "w102");
    }
}
