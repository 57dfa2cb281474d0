use serde::{Deserialize, Serialize};

use crate::adaptive::config::{TREND_CHANGE_RATIO, TREND_MIN_SAMPLES, TREND_WINDOW};
use crate::adaptive::types::{PerModality, ResponseEvent, ResponseResult, StimulusType, Trend};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MetricsScope {
    #[default]
    Global,
    Stimulus(StimulusType),
    Item(String),
}

impl MetricsScope {
    pub fn matches(&self, event: &ResponseEvent) -> bool {
        match self {
            Self::Global => true,
            Self::Stimulus(modality) => event.stimulus_type == *modality,
            Self::Item(item_id) => event.item_id == *item_id,
        }
    }
}

/// Rolling statistics over a window of events. Derived on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingMetrics {
    pub total: usize,
    pub correct_count: usize,
    pub wrong_count: usize,
    pub no_response_count: usize,
    pub accuracy: f64,
    pub latency_mean: f64,
    pub latency_median: f64,
    pub latency_std_dev: f64,
    pub latency_samples: usize,
    pub attempts_mean: f64,
    pub trend: Trend,
    pub consecutive_correct: usize,
    pub consecutive_wrong: usize,
}

impl RollingMetrics {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn accuracy_percent(&self) -> f64 {
        self.accuracy * 100.0
    }
}

/// Computes rolling metrics for the events matching `scope`. Events are expected oldest first.
pub fn compute_metrics<'a, I>(events: I, scope: &MetricsScope) -> RollingMetrics
where
    I: IntoIterator<Item = &'a ResponseEvent>,
{
    let scoped: Vec<&ResponseEvent> = events.into_iter().filter(|e| scope.matches(e)).collect();
    if scoped.is_empty() {
        return RollingMetrics::default();
    }

    let total = scoped.len();
    let mut correct_count = 0;
    let mut wrong_count = 0;
    let mut no_response_count = 0;
    for event in &scoped {
        match event.result {
            ResponseResult::Correct => correct_count += 1,
            ResponseResult::Wrong => wrong_count += 1,
            ResponseResult::NoResponse => no_response_count += 1,
        }
    }

    let latencies: Vec<f64> = scoped
        .iter()
        .filter_map(|e| e.latency_ms)
        .filter(|l| l.is_finite() && *l > 0.0)
        .collect();
    let attempts_mean = scoped.iter().map(|e| e.attempts as f64).sum::<f64>() / total as f64;

    let trend_start = latencies.len().saturating_sub(TREND_WINDOW);

    RollingMetrics {
        total,
        correct_count,
        wrong_count,
        no_response_count,
        accuracy: (correct_count as f64 / total as f64).clamp(0.0, 1.0),
        latency_mean: mean(&latencies),
        latency_median: median(&latencies),
        latency_std_dev: std_dev(&latencies),
        latency_samples: latencies.len(),
        attempts_mean,
        trend: latency_trend(&latencies[trend_start..]),
        consecutive_correct: trailing_run(&scoped, ResponseResult::Correct),
        consecutive_wrong: trailing_run(&scoped, ResponseResult::Wrong),
    }
}

pub fn per_modality_metrics<'a, I>(events: I) -> PerModality<RollingMetrics>
where
    I: IntoIterator<Item = &'a ResponseEvent>,
{
    let events: Vec<&ResponseEvent> = events.into_iter().collect();
    PerModality::from_fn(|modality| {
        compute_metrics(events.iter().copied(), &MetricsScope::Stimulus(modality))
    })
}

/// The modality with the highest accuracy among the events for `item_id`.
///
/// Returns `None` when the item has no events or every modality is at zero accuracy.
/// Ties keep the earlier modality in canonical order.
pub fn most_effective_modality<'a, I>(events: I, item_id: &str) -> Option<(StimulusType, f64)>
where
    I: IntoIterator<Item = &'a ResponseEvent>,
{
    let item_events: Vec<&ResponseEvent> =
        events.into_iter().filter(|e| e.item_id == item_id).collect();

    let mut best: Option<(StimulusType, f64)> = None;
    for modality in StimulusType::ALL {
        let metrics = compute_metrics(
            item_events.iter().copied(),
            &MetricsScope::Stimulus(modality),
        );
        if metrics.is_empty() || metrics.accuracy <= 0.0 {
            continue;
        }
        let better = best.map_or(true, |(_, accuracy)| metrics.accuracy > accuracy);
        if better {
            best = Some((modality, metrics.accuracy));
        }
    }
    best
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Compares the mean latency of the older half with the newer half.
/// Lower latency in the newer half reads as improvement.
fn latency_trend(samples: &[f64]) -> Trend {
    if samples.len() < TREND_MIN_SAMPLES {
        return Trend::Stable;
    }

    let half = samples.len() / 2;
    let first = mean(&samples[..half]);
    let second = mean(&samples[half..]);
    if first <= 0.0 {
        return Trend::Stable;
    }

    let threshold = first * TREND_CHANGE_RATIO;
    let diff = second - first;
    if diff <= -threshold {
        Trend::Improving
    } else if diff >= threshold {
        Trend::Worsening
    } else {
        Trend::Stable
    }
}

fn trailing_run(events: &[&ResponseEvent], result: ResponseResult) -> usize {
    events
        .iter()
        .rev()
        .take_while(|e| e.result == result)
        .count()
}
