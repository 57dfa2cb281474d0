use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::adaptive::engine::{AdaptiveEngine, IngestOutcome};
use crate::adaptive::persistence::{ProfileStore, StoreError};
use crate::adaptive::profile::LearnerProfile;
use crate::adaptive::report::LearnerSummary;
use crate::adaptive::selector::SelectionDecision;
use crate::adaptive::session::SessionContext;
use crate::adaptive::types::ResponseEvent;
use crate::error::EngineResult;

type LearnerLock = Arc<tokio::sync::Mutex<()>>;
type LockMap = Mutex<HashMap<String, LearnerLock>>;

/// A learner's entry in the lock map. The entry is dropped from the map once the last
/// lease on it goes away, including when the owning future is cancelled.
struct LockLease<'a> {
    locks: &'a LockMap,
    learner_id: String,
    lock: LearnerLock,
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // Only the map and this lease still hold it.
        if locks
            .get(&self.learner_id)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2)
        {
            locks.remove(&self.learner_id);
        }
    }
}

/// Runs the engine against a profile store with one writer per learner at a time.
/// Different learners never wait on each other.
pub struct LearnerService<S: ProfileStore> {
    engine: Arc<AdaptiveEngine>,
    store: Arc<S>,
    locks: LockMap,
}

impl<S: ProfileStore + 'static> LearnerService<S> {
    pub fn new(engine: AdaptiveEngine, store: S) -> Self {
        Self {
            engine: Arc::new(engine),
            store: Arc::new(store),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &AdaptiveEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Learners with an operation in flight or queued.
    pub fn tracked_learners(&self) -> usize {
        self.locks.lock().len()
    }

    fn lease(&self, learner_id: &str) -> LockLease<'_> {
        let mut locks = self.locks.lock();
        let lock = Arc::clone(
            locks
                .entry(learner_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        );
        LockLease {
            locks: &self.locks,
            learner_id: learner_id.to_string(),
            lock,
        }
    }

    /// Runs `work` on the blocking pool while holding the learner's lock. Store calls may
    /// touch the filesystem, so they stay off the async workers.
    async fn with_learner<T, F>(&self, learner_id: &str, work: F) -> EngineResult<T>
    where
        F: FnOnce(&S, &AdaptiveEngine) -> EngineResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let lease = self.lease(learner_id);
        // The guard moves into the task so the lock outlives a cancelled caller.
        let guard = Arc::clone(&lease.lock).lock_owned().await;

        let store = Arc::clone(&self.store);
        let engine = Arc::clone(&self.engine);
        let value = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            work(store.as_ref(), engine.as_ref())
        })
        .await
        .map_err(StoreError::from)??;
        Ok(value)
    }

    /// Load, ingest, save as one step for this learner.
    pub async fn record_response(
        &self,
        learner_id: &str,
        event: ResponseEvent,
    ) -> EngineResult<IngestOutcome> {
        let id = learner_id.to_string();
        let item_id = event.item_id.clone();
        let result = event.result;

        let outcome = self
            .with_learner(learner_id, move |store, engine| {
                let profile = store.load(&id)?.unwrap_or_default();
                let outcome = engine.ingest_detailed(&event, &profile)?;
                store.save(&id, &outcome.profile)?;
                Ok(outcome)
            })
            .await;

        match &outcome {
            Ok(outcome) => tracing::debug!(
                learner_id = %learner_id,
                item_id = %item_id,
                result = result.as_str(),
                tier = outcome.profile.difficulty_tier.as_str(),
                "recorded response"
            ),
            Err(e) => tracing::warn!(learner_id = %learner_id, error = %e, "response rejected"),
        }
        outcome
    }

    pub async fn next_stimulus(
        &self,
        learner_id: &str,
        ctx: &SessionContext,
    ) -> EngineResult<SelectionDecision> {
        let id = learner_id.to_string();
        let ctx = ctx.clone();
        self.with_learner(learner_id, move |store, engine| {
            let profile = store.load(&id)?.unwrap_or_default();
            Ok(engine.select(&profile, &ctx))
        })
        .await
    }

    pub async fn profile(&self, learner_id: &str) -> EngineResult<Option<LearnerProfile>> {
        let id = learner_id.to_string();
        self.with_learner(learner_id, move |store, _| store.load(&id))
            .await
    }

    pub async fn summary(&self, learner_id: &str) -> EngineResult<LearnerSummary> {
        let id = learner_id.to_string();
        self.with_learner(learner_id, move |store, engine| {
            let profile = store.load(&id)?.unwrap_or_default();
            Ok(engine.summary(&profile))
        })
        .await
    }

    /// Removes the learner's stored profile. Returns whether one existed.
    pub async fn reset(&self, learner_id: &str) -> EngineResult<bool> {
        let id = learner_id.to_string();
        let removed = self
            .with_learner(learner_id, move |store, _| store.remove(&id))
            .await?;

        tracing::info!(learner_id = %learner_id, removed, "learner profile reset");
        Ok(removed)
    }
}
