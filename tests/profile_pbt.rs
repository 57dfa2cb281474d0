//! Property-based tests for profile validation, migration and the adapters.
//!
//! Invariants:
//! - validate is a fixed point over its own serialized output
//! - migrate is idempotent
//! - preference weights stay within [0.3, 2.0]
//! - the difficulty tier moves at most one step per ingest, never below 3 samples

mod common;

use proptest::prelude::*;
use serde_json::{json, Value};

use literacy_adaptive::adaptive::config::{
    DifficultyParams, PreferenceParams, HISTORY_CAPACITY, MAX_PREFERENCE_WEIGHT,
    MIN_PREFERENCE_WEIGHT,
};
use literacy_adaptive::adaptive::difficulty::next_tier;
use literacy_adaptive::adaptive::metrics::{compute_metrics, MetricsScope, RollingMetrics};
use literacy_adaptive::adaptive::preference::next_preferences;
use literacy_adaptive::adaptive::types::{PerModality, PreferenceWeights};
use literacy_adaptive::adaptive::{
    migrate, validate, DifficultyTier, LearnerProfile, ResponseEvent, ResponseResult,
    StimulusType, CURRENT_SCHEMA_VERSION,
};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_tier() -> impl Strategy<Value = DifficultyTier> {
    prop_oneof![
        Just(DifficultyTier::Easy),
        Just(DifficultyTier::Medium),
        Just(DifficultyTier::Hard),
    ]
}

fn arb_modality() -> impl Strategy<Value = StimulusType> {
    prop_oneof![
        Just(StimulusType::Visual),
        Just(StimulusType::Auditory),
        Just(StimulusType::Tactile),
    ]
}

fn arb_result() -> impl Strategy<Value = ResponseResult> {
    prop_oneof![
        Just(ResponseResult::Correct),
        Just(ResponseResult::Wrong),
        Just(ResponseResult::NoResponse),
    ]
}

fn arb_loose_string(valid: &'static [&'static str]) -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => proptest::sample::select(valid).prop_map(|s| json!(s)),
        1 => Just(json!("bogus")),
        1 => Just(json!(7)),
        1 => Just(Value::Null),
    ]
}

fn arb_weight_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => (-50i64..=300i64).prop_map(|v| json!(v as f64 / 100.0)),
        1 => Just(json!("heavy")),
        1 => Just(Value::Null),
    ]
}

fn arb_history_entry() -> impl Strategy<Value = Value> {
    (
        0i64..=200_000i64,                             // timestamp offset (ms)
        arb_loose_string(&["visual", "auditory", "tactile"]),
        arb_loose_string(&["correct", "wrong", "no_response"]),
        proptest::option::of(-500i64..=20_000i64),     // latency
        0u64..=4u64,                                   // attempts
        proptest::sample::select(vec!["casa", "bola", "", "gato"]),
    )
        .prop_map(|(offset, modality, result, latency, attempts, item)| {
            let mut entry = json!({
                "timestamp": common::FIXED_TIMESTAMP * 1000 + offset,
                "stimulusType": modality,
                "itemId": item,
                "result": result,
                "attempts": attempts,
            });
            if let Some(latency) = latency {
                entry["latencyMs"] = json!(latency as f64);
            }
            entry
        })
}

fn arb_raw_profile() -> impl Strategy<Value = Value> {
    (
        proptest::option::of(0u64..=3u64),
        arb_loose_string(&["easy", "medium", "hard"]),
        (arb_weight_value(), arb_weight_value(), arb_weight_value()),
        proptest::option::of((-1000i64..=40_000i64, -3i64..=20i64, any::<bool>())),
        proptest::collection::vec(arb_history_entry(), 0..130),
        (0u64..=500u64, 0u64..=500u64),
    )
        .prop_map(|(version, tier, (v, a, t), config, history, (total, correct))| {
            let mut raw = json!({
                "difficultyTier": tier,
                "modalityPreference": { "visual": v, "auditory": a, "tactile": t },
                "history": history,
                "stats": { "totalResponses": total, "totalCorrect": correct },
            });
            if let Some(version) = version {
                raw["schemaVersion"] = json!(version);
            }
            if let Some((timeout, attempts, aid)) = config {
                raw["adaptationConfig"] = json!({
                    "responseTimeoutMs": timeout,
                    "maxAttempts": attempts,
                    "showVisualAid": aid,
                });
            }
            raw
        })
}

fn arb_weights() -> impl Strategy<Value = PreferenceWeights> {
    (
        MIN_PREFERENCE_WEIGHT..=MAX_PREFERENCE_WEIGHT,
        MIN_PREFERENCE_WEIGHT..=MAX_PREFERENCE_WEIGHT,
        MIN_PREFERENCE_WEIGHT..=MAX_PREFERENCE_WEIGHT,
    )
        .prop_map(|(visual, auditory, tactile)| PerModality {
            visual,
            auditory,
            tactile,
        })
}

fn arb_metrics() -> impl Strategy<Value = RollingMetrics> {
    (0usize..=10usize, 0.0f64..=1.0f64).prop_map(|(total, accuracy)| RollingMetrics {
        total,
        accuracy,
        ..Default::default()
    })
}

fn arb_events() -> impl Strategy<Value = Vec<ResponseEvent>> {
    proptest::collection::vec(
        (
            arb_modality(),
            arb_result(),
            proptest::option::of(100.0f64..=20_000.0f64),
            1u32..=4u32,
            proptest::sample::select(vec!["casa", "bola", "gato", "carro", "elefante"]),
        ),
        0..40,
    )
    .prop_map(|rows| {
        rows
            .into_iter()
            .enumerate()
            .map(|(i, (modality, result, latency, attempts, item))| {
                ResponseEvent::new(common::at(i as i64), modality, item, result, latency, attempts)
            })
            .collect()
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn validate_is_a_fixed_point(raw in arb_raw_profile()) {
        let once = validate(&raw);
        let serialized = serde_json::to_value(&once).unwrap();
        let twice = validate(&serialized);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn validated_fields_respect_bounds(raw in arb_raw_profile()) {
        let profile = validate(&raw);
        prop_assert!(profile.history.len() <= HISTORY_CAPACITY);
        for (_, w) in profile.modality_preference.iter() {
            prop_assert!((MIN_PREFERENCE_WEIGHT..=MAX_PREFERENCE_WEIGHT).contains(w));
        }
        prop_assert!((2000..=20000).contains(&profile.adaptation_config.response_timeout_ms));
        prop_assert!((1..=10).contains(&profile.adaptation_config.max_attempts));
        prop_assert!(profile.stats.total_correct <= profile.stats.total_responses);
        for pair in profile.history.iter().collect::<Vec<_>>().windows(2) {
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn migrate_is_idempotent(raw in arb_raw_profile()) {
        let once = migrate(validate(&raw));
        prop_assert!(once.schema_version >= CURRENT_SCHEMA_VERSION);
        let twice = migrate(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn preferences_stay_in_bounds(
        weights in arb_weights(),
        visual in arb_metrics(),
        auditory in arb_metrics(),
        tactile in arb_metrics(),
    ) {
        let per_type = PerModality { visual, auditory, tactile };
        let next = next_preferences(&weights, &per_type, &PreferenceParams::default());
        for (_, w) in next.iter() {
            prop_assert!(*w >= MIN_PREFERENCE_WEIGHT && *w <= MAX_PREFERENCE_WEIGHT);
        }
    }

    #[test]
    fn tier_unchanged_below_three_samples(
        tier in arb_tier(),
        metrics in arb_metrics(),
        samples in 0usize..3usize,
    ) {
        prop_assert_eq!(next_tier(tier, &metrics, samples, &DifficultyParams::default()), tier);
    }

    #[test]
    fn tier_moves_at_most_one_step(
        tier in arb_tier(),
        metrics in arb_metrics(),
        samples in 0usize..50usize,
    ) {
        let next = next_tier(tier, &metrics, samples, &DifficultyParams::default());
        prop_assert!((next.rank() as i8 - tier.rank() as i8).abs() <= 1);
    }

    #[test]
    fn ingest_keeps_profile_invariants(events in arb_events()) {
        let engine = common::engine();
        let mut profile = LearnerProfile::default();
        for event in &events {
            let next = engine.ingest(event, &profile).unwrap();
            prop_assert!((next.difficulty_tier.rank() as i8 - profile.difficulty_tier.rank() as i8).abs() <= 1);
            for (_, w) in next.modality_preference.iter() {
                prop_assert!(*w >= MIN_PREFERENCE_WEIGHT && *w <= MAX_PREFERENCE_WEIGHT);
            }
            profile = next;
        }
        prop_assert_eq!(profile.history.len(), events.len().min(HISTORY_CAPACITY));

        let metrics = compute_metrics(&profile.history, &MetricsScope::Global);
        prop_assert!((0.0..=1.0).contains(&metrics.accuracy));
        prop_assert!(metrics.latency_std_dev >= 0.0);
    }
}
