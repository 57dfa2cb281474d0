use std::sync::Arc;

use crate::adaptive::catalog::{ItemCatalogSource, StaticCatalog};
use crate::adaptive::config::AdaptiveConfig;
use crate::adaptive::difficulty::{assess_tier, TierAssessment, TierChange};
use crate::adaptive::metrics::{compute_metrics, per_modality_metrics, MetricsScope};
use crate::adaptive::preference::next_preferences;
use crate::adaptive::profile::LearnerProfile;
use crate::adaptive::report::{AdaptationReport, LearnerSummary};
use crate::adaptive::selector::{select_next, SelectionDecision};
use crate::adaptive::session::SessionContext;
use crate::adaptive::tuning::{effective_config, tune_adaptation_config, ModalityConfig};
use crate::adaptive::types::{ResponseEvent, StimulusType};
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub profile: LearnerProfile,
    pub report: AdaptationReport,
    /// `None` when adaptation did not run for this event.
    pub assessment: Option<TierAssessment>,
}

/// The adaptive decision engine. Holds no per-learner state: every operation takes a
/// profile snapshot and returns a new one.
pub struct AdaptiveEngine {
    config: AdaptiveConfig,
    catalog: Arc<dyn ItemCatalogSource>,
}

impl AdaptiveEngine {
    pub fn new(config: AdaptiveConfig, catalog: Arc<dyn ItemCatalogSource>) -> EngineResult<Self> {
        config.validate()?;
        if catalog.all_items().is_empty() {
            return Err(EngineError::EmptyCatalog);
        }
        Ok(Self { config, catalog })
    }

    pub fn with_builtin_catalog(config: AdaptiveConfig) -> EngineResult<Self> {
        Self::new(config, Arc::new(StaticCatalog::builtin()))
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn ItemCatalogSource {
        self.catalog.as_ref()
    }

    /// Applies one response to a profile snapshot.
    pub fn ingest(&self, event: &ResponseEvent, profile: &LearnerProfile) -> EngineResult<LearnerProfile> {
        self.ingest_detailed(event, profile).map(|outcome| outcome.profile)
    }

    pub fn ingest_detailed(
        &self,
        event: &ResponseEvent,
        profile: &LearnerProfile,
    ) -> EngineResult<IngestOutcome> {
        self.check_event(event, profile)?;

        let mut next = profile.clone();
        next.push_event(event.clone(), self.config.metrics.history_capacity);
        next.stats.total_responses += 1;
        if event.is_correct() {
            next.stats.total_correct += 1;
        }
        next.stats.last_activity_at = Some(event.timestamp);
        if next.stats.created_at.is_none() {
            next.stats.created_at = Some(event.timestamp);
        }

        let assessment = if next.adaptation_config.adaptive_enabled
            && next.history.len() >= self.config.difficulty.min_samples
        {
            Some(self.adapt(&mut next))
        } else {
            None
        };

        let next = next.sanitized();
        let report = AdaptationReport::between(profile, &next, event.timestamp);
        if report.has_changes {
            tracing::debug!(changes = ?report.changes, "profile adapted");
        }

        Ok(IngestOutcome {
            profile: next,
            report,
            assessment,
        })
    }

    fn check_event(&self, event: &ResponseEvent, profile: &LearnerProfile) -> EngineResult<()> {
        event.validate()?;
        if self.catalog.find(&event.item_id).is_none() {
            return Err(EngineError::InvalidEvent(format!(
                "unknown item {}",
                event.item_id
            )));
        }
        if let Some(latest) = profile.latest_event() {
            if event.timestamp < latest.timestamp {
                return Err(EngineError::InvalidEvent(format!(
                    "event at {} precedes latest recorded response at {}",
                    event.timestamp, latest.timestamp
                )));
            }
        }
        Ok(())
    }

    fn adapt(&self, profile: &mut LearnerProfile) -> TierAssessment {
        let window_size = self.config.metrics.analysis_window;
        let window = compute_metrics(profile.recent(window_size), &MetricsScope::Global);

        let previous = profile.difficulty_tier;
        let assessment = assess_tier(
            previous,
            &window,
            profile.history.len(),
            &self.config.difficulty,
        );
        if matches!(assessment.change, TierChange::Raised | TierChange::Lowered) {
            tracing::info!(
                from = previous.as_str(),
                to = assessment.tier.as_str(),
                accuracy = assessment.accuracy,
                confidence = assessment.confidence,
                reason = %assessment.describe(previous),
                "difficulty tier changed"
            );
        }
        profile.difficulty_tier = assessment.tier;

        if self.config.feature_flags.preference_enabled {
            let per_type = per_modality_metrics(profile.recent(window_size));
            profile.modality_preference = next_preferences(
                &profile.modality_preference,
                &per_type,
                &self.config.preference,
            );
        }

        if self.config.feature_flags.config_tuning_enabled {
            profile.adaptation_config =
                tune_adaptation_config(&profile.adaptation_config, &window, &self.config.tuning);
        }

        assessment
    }

    pub fn select(&self, profile: &LearnerProfile, ctx: &SessionContext) -> SelectionDecision {
        select_next(profile, self.catalog.as_ref(), ctx, &self.config)
    }

    pub fn effective_config(&self, profile: &LearnerProfile, modality: StimulusType) -> ModalityConfig {
        effective_config(profile, modality, &self.config.tuning)
    }

    pub fn summary(&self, profile: &LearnerProfile) -> LearnerSummary {
        LearnerSummary::from_profile(profile)
    }
}
