//! Next-stimulus selection: item, difficulty and modality, with an audit trail.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adaptive::catalog::{CatalogItem, ItemCatalogSource};
use crate::adaptive::config::AdaptiveConfig;
use crate::adaptive::metrics::{
    compute_metrics, most_effective_modality, per_modality_metrics, MetricsScope,
};
use crate::adaptive::profile::LearnerProfile;
use crate::adaptive::session::SessionContext;
use crate::adaptive::types::{DifficultyTier, StimulusType};

const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Error)]
enum SelectionError {
    #[error("catalog has no {0} items")]
    CatalogExhausted(&'static str),
    #[error("item {0} is not in the catalog")]
    UnknownItem(String),
    #[error("item {0} supports no modality")]
    NoModality(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalityScore {
    pub stimulus_type: StimulusType,
    pub score: f64,
    pub history_term: f64,
    pub variety_bonus: f64,
    pub repetition_penalty: f64,
    pub affinity_bonus: f64,
    pub recent_uses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionDecision {
    pub item_id: String,
    pub stimulus_type: StimulusType,
    pub difficulty_tier: DifficultyTier,
    pub rationale: Vec<String>,
    pub modality_scores: Vec<ModalityScore>,
    pub fallback: bool,
}

/// Picks the next item and modality for a learner. Never fails: any selection error
/// degrades to the first item of the lowest tier, presented visually.
pub fn select_next(
    profile: &LearnerProfile,
    catalog: &dyn ItemCatalogSource,
    ctx: &SessionContext,
    config: &AdaptiveConfig,
) -> SelectionDecision {
    match try_select(profile, catalog, ctx, config) {
        Ok(decision) => {
            tracing::debug!(
                item_id = %decision.item_id,
                stimulus = decision.stimulus_type.as_str(),
                tier = decision.difficulty_tier.as_str(),
                "selected next stimulus"
            );
            decision
        }
        Err(e) => {
            tracing::warn!(error = %e, "selection failed, using fallback");
            fallback(profile, catalog, &e.to_string())
        }
    }
}

fn fallback(profile: &LearnerProfile, catalog: &dyn ItemCatalogSource, reason: &str) -> SelectionDecision {
    let mut rationale = vec![format!("fallback: {reason}")];
    let (item_id, difficulty_tier) = match catalog.first_of_lowest_tier() {
        Some(item) => {
            rationale.push(format!(
                "using first {} item {}, presented visually",
                item.difficulty_tier.as_str(),
                item.id
            ));
            (item.id.clone(), item.difficulty_tier.min(profile.difficulty_tier))
        }
        None => {
            rationale.push("catalog is empty, no item to serve".to_string());
            (String::new(), DifficultyTier::Easy)
        }
    };

    SelectionDecision {
        item_id,
        stimulus_type: StimulusType::Visual,
        difficulty_tier,
        rationale,
        modality_scores: Vec::new(),
        fallback: true,
    }
}

fn try_select(
    profile: &LearnerProfile,
    catalog: &dyn ItemCatalogSource,
    ctx: &SessionContext,
    config: &AdaptiveConfig,
) -> Result<SelectionDecision, SelectionError> {
    let (item, item_reason) = choose_item(profile, catalog, ctx, config)?;

    let (stimulus_type, modality_scores, modality_reason) =
        choose_modality(profile, item, ctx, config)?;

    let (difficulty_tier, tier_reason) = choose_tier(profile, item, config);

    let mut rationale = vec![item_reason, modality_reason, tier_reason];
    let global = compute_metrics(&profile.history, &MetricsScope::Global);
    if global.consecutive_wrong > 0 {
        rationale.push(format!(
            "adjusting for {} consecutive errors",
            global.consecutive_wrong
        ));
    }
    if global.consecutive_correct > 0 {
        rationale.push(format!(
            "considering {} consecutive successes",
            global.consecutive_correct
        ));
    }

    Ok(SelectionDecision {
        item_id: item.id.clone(),
        stimulus_type,
        difficulty_tier,
        rationale,
        modality_scores,
        fallback: false,
    })
}

fn choose_item<'a>(
    profile: &LearnerProfile,
    catalog: &'a dyn ItemCatalogSource,
    ctx: &SessionContext,
    config: &AdaptiveConfig,
) -> Result<(&'a CatalogItem, String), SelectionError> {
    if let Some(override_id) = ctx.explicit_item_override.as_deref() {
        let item = catalog
            .find(override_id)
            .ok_or_else(|| SelectionError::UnknownItem(override_id.to_string()))?;
        return Ok((item, format!("item {} requested explicitly", item.id)));
    }

    if profile.history.is_empty() {
        let item = catalog
            .items_by_tier(DifficultyTier::Easy)
            .into_iter()
            .next()
            .ok_or(SelectionError::CatalogExhausted(DifficultyTier::Easy.as_str()))?;
        return Ok((item, format!("no history yet, starting with {}", item.id)));
    }

    let current_id = ctx
        .current_item
        .as_deref()
        .or_else(|| profile.latest_event().map(|e| e.item_id.as_str()))
        .unwrap_or_default();
    let current = catalog
        .find(current_id)
        .ok_or_else(|| SelectionError::UnknownItem(current_id.to_string()))?;

    let metrics = compute_metrics(&profile.history, &MetricsScope::Item(current.id.clone()));
    let rule = &config.advance;
    let mastered = metrics.total >= rule.min_attempts
        && metrics.correct_count >= rule.min_correct
        && metrics.accuracy >= rule.min_accuracy;
    let progress = format!(
        "{}/{} correct ({:.0}%)",
        metrics.correct_count,
        metrics.total,
        metrics.accuracy_percent()
    );

    if !mastered {
        return Ok((current, format!("staying on {}: {progress}", current.id)));
    }

    match next_in_order(catalog, current) {
        Some(next) => Ok((
            next,
            format!("advanced from {} to {}: {progress}", current.id, next.id),
        )),
        None => Ok((
            current,
            format!("{} mastered ({progress}) but no further items, staying", current.id),
        )),
    }
}

/// The item after `current` in its tier, else the first item of the next non-empty tier.
fn next_in_order<'a>(catalog: &'a dyn ItemCatalogSource, current: &CatalogItem) -> Option<&'a CatalogItem> {
    let same_tier = catalog.items_by_tier(current.difficulty_tier);
    let position = same_tier.iter().position(|item| item.id == current.id)?;
    if let Some(next) = same_tier.get(position + 1) {
        return Some(*next);
    }

    let mut tier = current.difficulty_tier;
    while let Some(higher) = tier.next() {
        if let Some(first) = catalog.items_by_tier(higher).into_iter().next() {
            return Some(first);
        }
        tier = higher;
    }
    None
}

/// The stored tier was already adapted when the last response was ingested, so it is
/// only capped here, never re-assessed.
fn choose_tier(profile: &LearnerProfile, item: &CatalogItem, config: &AdaptiveConfig) -> (DifficultyTier, String) {
    let stored = profile.difficulty_tier;
    let mut reason = if profile.adaptation_config.adaptive_enabled {
        let window = compute_metrics(
            profile.recent(config.metrics.analysis_window),
            &MetricsScope::Global,
        );
        if window.total == 0 {
            format!("tier {} from learner profile", stored.as_str())
        } else {
            format!(
                "tier {} from learner profile (recent accuracy {:.2} over {} responses)",
                stored.as_str(),
                window.accuracy,
                window.total
            )
        }
    } else {
        format!("tier {} kept: adaptation disabled", stored.as_str())
    };

    let effective = item.difficulty_tier.min(stored);
    if effective < stored {
        reason.push_str(&format!(
            "; capped at {} by item {}",
            effective.as_str(),
            item.id
        ));
    }
    (effective, reason)
}

fn choose_modality(
    profile: &LearnerProfile,
    item: &CatalogItem,
    ctx: &SessionContext,
    config: &AdaptiveConfig,
) -> Result<(StimulusType, Vec<ModalityScore>, String), SelectionError> {
    let weights = &config.selection;
    let per_type = per_modality_metrics(&profile.history);
    let affinity = most_effective_modality(&profile.history, &item.id).map(|(m, _)| m);

    let scores: Vec<ModalityScore> = StimulusType::ALL
        .into_iter()
        .filter(|m| item.supports(*m))
        .map(|modality| {
            let recent_uses = ctx.usage(modality);
            let history_term = *profile.modality_preference.get(modality)
                * weights.history_weight
                * per_type.get(modality).accuracy_percent();
            let variety_bonus = if recent_uses == 0 { weights.variety_bonus } else { 0.0 };
            let repetition_penalty = if recent_uses >= weights.repetition_threshold {
                weights.repetition_penalty
            } else {
                0.0
            };
            let affinity_bonus = if affinity == Some(modality) {
                weights.item_affinity_bonus
            } else {
                0.0
            };
            ModalityScore {
                stimulus_type: modality,
                score: history_term + variety_bonus - repetition_penalty + affinity_bonus,
                history_term,
                variety_bonus,
                repetition_penalty,
                affinity_bonus,
                recent_uses,
            }
        })
        .collect();

    let mut best: Option<&ModalityScore> = None;
    for candidate in &scores {
        let replace = match best {
            None => true,
            Some(current) => {
                candidate.score > current.score + SCORE_EPSILON
                    || ((candidate.score - current.score).abs() <= SCORE_EPSILON
                        && candidate.recent_uses < current.recent_uses)
            }
        };
        if replace {
            best = Some(candidate);
        }
    }
    let chosen = best
        .map(|s| s.stimulus_type)
        .ok_or_else(|| SelectionError::NoModality(item.id.clone()))?;

    let summary = scores
        .iter()
        .map(|s| format!("{} {:.1}", s.stimulus_type.as_str(), s.score))
        .collect::<Vec<_>>()
        .join(", ");
    let reason = format!("modality {} chosen ({summary})", chosen.as_str());

    Ok((chosen, scores, reason))
}
