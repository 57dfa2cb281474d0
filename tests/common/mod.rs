#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use literacy_adaptive::adaptive::{
    AdaptiveConfig, AdaptiveEngine, CatalogItem, DifficultyTier, ResponseEvent, ResponseResult,
    StaticCatalog, StimulusType,
};

pub const FIXED_TIMESTAMP: i64 = 1_700_000_000;

pub fn at(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(FIXED_TIMESTAMP, 0).unwrap() + Duration::seconds(offset_secs)
}

pub fn event(
    offset_secs: i64,
    item: &str,
    modality: StimulusType,
    result: ResponseResult,
) -> ResponseEvent {
    ResponseEvent::new(at(offset_secs), modality, item, result, Some(2500.0), 1)
}

pub fn engine() -> AdaptiveEngine {
    AdaptiveEngine::with_builtin_catalog(AdaptiveConfig::default()).unwrap()
}

pub fn item(id: &str, tier: DifficultyTier, modalities: &[StimulusType]) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        text: id.to_uppercase(),
        difficulty_tier: tier,
        syllables: Vec::new(),
        letters: id.chars().map(|c| c.to_uppercase().to_string()).collect(),
        category: "teste".to_string(),
        context: None,
        supported_modalities: modalities.to_vec(),
        usage_frequency: 1,
    }
}

pub fn catalog(items: Vec<CatalogItem>) -> StaticCatalog {
    StaticCatalog::new(items).unwrap()
}
