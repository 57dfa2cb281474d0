use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adaptive::metrics::{compute_metrics, per_modality_metrics, MetricsScope, RollingMetrics};
use crate::adaptive::profile::LearnerProfile;
use crate::adaptive::types::{PerModality, ResponseEvent, StimulusType, Trend};

const WEIGHT_CHANGE_THRESHOLD: f64 = 0.05;
const RANKING_MIN_EVENTS: usize = 3;
const TREND_VOTE_MIN_EVENTS: usize = 5;
const STRUGGLE_MIN_EVENTS: usize = 3;
const STRUGGLE_BELOW_ACCURACY: f64 = 0.5;
const PROFICIENT_MIN_EVENTS: usize = 5;
const PROFICIENT_ACCURACY: f64 = 0.8;
const PRACTICE_SPREAD: usize = 3;
const COLLECTING_DATA_BELOW: usize = 10;
const IMPROVE_BELOW_ACCURACY: f64 = 0.6;
const SLOW_PACE_MS: f64 = 8000.0;
const FAST_PACE_MS: f64 = 2000.0;

/// What one ingest changed on the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationReport {
    pub timestamp: DateTime<Utc>,
    pub changes: Vec<String>,
    pub has_changes: bool,
}

impl AdaptationReport {
    pub fn between(before: &LearnerProfile, after: &LearnerProfile, timestamp: DateTime<Utc>) -> Self {
        let mut changes = Vec::new();

        if before.difficulty_tier != after.difficulty_tier {
            changes.push(format!(
                "difficulty: {} -> {}",
                before.difficulty_tier.as_str(),
                after.difficulty_tier.as_str()
            ));
        }

        for modality in StimulusType::ALL {
            let old = *before.modality_preference.get(modality);
            let new = *after.modality_preference.get(modality);
            if (new - old).abs() > WEIGHT_CHANGE_THRESHOLD {
                changes.push(format!("{}: {old:.2} -> {new:.2}", modality.as_str()));
            }
        }

        Self {
            timestamp,
            has_changes: !changes.is_empty(),
            changes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insight {
    Welcome,
    CollectingData { responses: usize, needed: usize },
    Strength { modality: StimulusType, accuracy: f64 },
    AreaToImprove { modality: StimulusType, accuracy: f64 },
    Improving,
    SlowPace { mean_latency_ms: f64 },
    FastPace { mean_latency_ms: f64 },
}

impl Insight {
    pub fn message(&self) -> String {
        match self {
            Self::Welcome => "welcome! answer a few items to get personalised guidance".to_string(),
            Self::CollectingData { responses, needed } => {
                format!("collecting data: {responses} of {needed} responses recorded")
            }
            Self::Strength { modality, accuracy } => format!(
                "strongest with {} stimuli ({:.0}% correct)",
                modality.as_str(),
                accuracy * 100.0
            ),
            Self::AreaToImprove { modality, accuracy } => format!(
                "{} stimuli need more practice ({:.0}% correct)",
                modality.as_str(),
                accuracy * 100.0
            ),
            Self::Improving => "response times are improving".to_string(),
            Self::SlowPace { mean_latency_ms } => format!(
                "taking {:.1}s per answer on average, no need to rush",
                mean_latency_ms / 1000.0
            ),
            Self::FastPace { mean_latency_ms } => format!(
                "answering in {:.1}s on average, slow down and read carefully",
                mean_latency_ms / 1000.0
            ),
        }
    }
}

/// Whole-history view of a learner, for guidance and dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerSummary {
    pub global: RollingMetrics,
    pub per_modality: PerModality<RollingMetrics>,
}

impl LearnerSummary {
    pub fn from_events<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a ResponseEvent>,
    {
        let events: Vec<&ResponseEvent> = events.into_iter().collect();
        Self {
            global: compute_metrics(events.iter().copied(), &MetricsScope::Global),
            per_modality: per_modality_metrics(events.iter().copied()),
        }
    }

    pub fn from_profile(profile: &LearnerProfile) -> Self {
        Self::from_events(&profile.history)
    }

    fn ranked(&self) -> impl Iterator<Item = (StimulusType, &RollingMetrics)> {
        self.per_modality
            .iter()
            .filter(|(_, m)| m.total >= RANKING_MIN_EVENTS)
    }

    pub fn best_modality(&self) -> Option<(StimulusType, f64)> {
        let mut best: Option<(StimulusType, f64)> = None;
        for (modality, metrics) in self.ranked() {
            if best.map_or(true, |(_, acc)| metrics.accuracy > acc) {
                best = Some((modality, metrics.accuracy));
            }
        }
        best
    }

    pub fn worst_modality(&self) -> Option<(StimulusType, f64)> {
        let mut worst: Option<(StimulusType, f64)> = None;
        for (modality, metrics) in self.ranked() {
            if worst.map_or(true, |(_, acc)| metrics.accuracy < acc) {
                worst = Some((modality, metrics.accuracy));
            }
        }
        worst
    }

    /// Majority vote of the per-modality latency trends. Ties read as stable.
    pub fn overall_trend(&self) -> Trend {
        let mut improving = 0;
        let mut worsening = 0;
        let mut stable = 0;
        for (_, metrics) in self.per_modality.iter() {
            if metrics.total < TREND_VOTE_MIN_EVENTS {
                continue;
            }
            match metrics.trend {
                Trend::Improving => improving += 1,
                Trend::Worsening => worsening += 1,
                Trend::Stable => stable += 1,
            }
        }

        if improving > worsening && improving > stable {
            Trend::Improving
        } else if worsening > improving && worsening > stable {
            Trend::Worsening
        } else {
            Trend::Stable
        }
    }

    pub fn struggles_with(&self, modality: StimulusType) -> bool {
        let metrics = self.per_modality.get(modality);
        metrics.total >= STRUGGLE_MIN_EVENTS && metrics.accuracy < STRUGGLE_BELOW_ACCURACY
    }

    pub fn proficient_in(&self, modality: StimulusType) -> bool {
        let metrics = self.per_modality.get(modality);
        metrics.total >= PROFICIENT_MIN_EVENTS && metrics.accuracy >= PROFICIENT_ACCURACY
    }

    pub fn recommended_practice_modality(&self) -> StimulusType {
        let counts = PerModality::from_fn(|m| self.per_modality.get(m).total);
        let most = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
        let mut least: Option<(StimulusType, usize)> = None;
        for (modality, count) in counts.iter() {
            if least.map_or(true, |(_, c)| *count < c) {
                least = Some((modality, *count));
            }
        }

        match least {
            Some((modality, count)) if most - count > PRACTICE_SPREAD => modality,
            _ => self
                .worst_modality()
                .map(|(modality, _)| modality)
                .unwrap_or(StimulusType::Visual),
        }
    }

    pub fn insights(&self) -> Vec<Insight> {
        if self.global.is_empty() {
            return vec![Insight::Welcome];
        }

        let mut insights = Vec::new();
        if self.global.total < COLLECTING_DATA_BELOW {
            insights.push(Insight::CollectingData {
                responses: self.global.total,
                needed: COLLECTING_DATA_BELOW,
            });
        }

        let best = self.best_modality();
        if let Some((modality, accuracy)) = best {
            insights.push(Insight::Strength { modality, accuracy });
        }
        if let Some((modality, accuracy)) = self.worst_modality() {
            let same_as_best = best.is_some_and(|(b, _)| b == modality);
            if accuracy < IMPROVE_BELOW_ACCURACY && !same_as_best {
                insights.push(Insight::AreaToImprove { modality, accuracy });
            }
        }

        if self.overall_trend() == Trend::Improving {
            insights.push(Insight::Improving);
        }

        if self.global.latency_samples > 0 {
            let mean_latency_ms = self.global.latency_mean;
            if mean_latency_ms > SLOW_PACE_MS {
                insights.push(Insight::SlowPace { mean_latency_ms });
            } else if mean_latency_ms < FAST_PACE_MS {
                insights.push(Insight::FastPace { mean_latency_ms });
            }
        }

        insights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::types::{DifficultyTier, ResponseResult};
    use chrono::{Duration, TimeZone};

    fn events(rows: &[(StimulusType, ResponseResult, f64)]) -> Vec<ResponseEvent> {
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        rows.iter()
            .enumerate()
            .map(|(i, (m, r, l))| {
                ResponseEvent::new(base + Duration::seconds(i as i64), *m, "casa", *r, Some(*l), 1)
            })
            .collect()
    }

    #[test]
    fn report_lists_tier_and_weight_changes() {
        let before = LearnerProfile::default();
        let mut after = before.clone();
        after.difficulty_tier = DifficultyTier::Easy;
        after.modality_preference.visual = 0.9;
        after.modality_preference.auditory = 1.04;

        let report = AdaptationReport::between(&before, &after, Utc::now());
        assert!(report.has_changes);
        assert_eq!(report.changes, vec!["difficulty: medium -> easy", "visual: 1.00 -> 0.90"]);

        let unchanged = AdaptationReport::between(&before, &before, Utc::now());
        assert!(!unchanged.has_changes);
    }

    #[test]
    fn empty_history_gets_welcome() {
        let history: Vec<ResponseEvent> = Vec::new();
        let summary = LearnerSummary::from_events(&history);
        assert_eq!(summary.insights(), vec![Insight::Welcome]);
        assert_eq!(summary.best_modality(), None);
        assert_eq!(summary.recommended_practice_modality(), StimulusType::Visual);
    }

    #[test]
    fn ranks_modalities_with_enough_events() {
        use ResponseResult::{Correct, Wrong};
        use StimulusType::{Auditory, Tactile, Visual};
        let history = events(&[
            (Visual, Correct, 3000.0),
            (Visual, Correct, 3000.0),
            (Visual, Correct, 3000.0),
            (Auditory, Wrong, 3000.0),
            (Auditory, Wrong, 3000.0),
            (Auditory, Correct, 3000.0),
            (Tactile, Wrong, 3000.0),
        ]);
        let summary = LearnerSummary::from_events(&history);

        assert_eq!(summary.best_modality().map(|(m, _)| m), Some(Visual));
        assert_eq!(summary.worst_modality().map(|(m, _)| m), Some(Auditory));
        assert!(summary.struggles_with(Auditory));
        assert!(!summary.struggles_with(Tactile));
        assert!(!summary.proficient_in(Visual));
        assert_eq!(summary.recommended_practice_modality(), Auditory);

        let insights = summary.insights();
        assert_eq!(insights[0], Insight::CollectingData { responses: 7, needed: 10 });
        assert!(matches!(insights[1], Insight::Strength { modality: Visual, .. }));
        assert!(matches!(insights[2], Insight::AreaToImprove { modality: Auditory, .. }));
    }

    #[test]
    fn large_practice_gap_recommends_least_practiced() {
        use ResponseResult::Correct;
        use StimulusType::{Tactile, Visual};
        let history = events(&[(Visual, Correct, 3000.0); 6]);
        let summary = LearnerSummary::from_events(&history);
        assert!(summary.proficient_in(Visual));
        assert_eq!(summary.recommended_practice_modality(), StimulusType::Auditory);
        assert!(!summary.proficient_in(Tactile));
    }

    #[test]
    fn pace_insights() {
        use ResponseResult::Correct;
        use StimulusType::Visual;
        let slow = LearnerSummary::from_events(&events(&[(Visual, Correct, 9000.0); 2]));
        assert!(slow.insights().iter().any(|i| matches!(i, Insight::SlowPace { .. })));
        let fast = LearnerSummary::from_events(&events(&[(Visual, Correct, 1500.0); 2]));
        assert!(fast.insights().iter().any(|i| matches!(i, Insight::FastPace { .. })));
    }

    #[test]
    fn majority_trend_needs_five_events() {
        use ResponseResult::Correct;
        use StimulusType::Visual;
        let history = events(&[
            (Visual, Correct, 5000.0),
            (Visual, Correct, 5000.0),
            (Visual, Correct, 3000.0),
            (Visual, Correct, 3000.0),
            (Visual, Correct, 3000.0),
        ]);
        let summary = LearnerSummary::from_events(&history);
        assert_eq!(summary.overall_trend(), Trend::Improving);
        assert!(summary.insights().contains(&Insight::Improving));

        let short = LearnerSummary::from_events(&history[..4]);
        assert_eq!(short.overall_trend(), Trend::Stable);
    }
}
