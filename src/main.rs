use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use literacy_adaptive::adaptive::{
    AdaptiveConfig, AdaptiveEngine, FileProfileStore, ItemCatalogSource, LearnerService,
    MemoryProfileStore, ProfileStore, ResponseEvent, SelectionDecision, SessionTracker,
    StaticCatalog,
};
use literacy_adaptive::config::Config;
use literacy_adaptive::logging;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayLine {
    learner_id: String,
    event: ResponseEvent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayOutput<'a> {
    learner_id: &'a str,
    changes: &'a [String],
    decision: &'a SelectionDecision,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config.log_level, config.log_dir.as_deref());

    let catalog: Arc<dyn ItemCatalogSource> = match &config.catalog_path {
        Some(path) => match StaticCatalog::from_path(path) {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                tracing::error!(error = %e, "failed to load item catalog");
                std::process::exit(1);
            }
        },
        None => Arc::new(StaticCatalog::builtin()),
    };

    let engine = match AdaptiveEngine::new(AdaptiveConfig::from_env(), catalog) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "engine not initialized");
            std::process::exit(1);
        }
    };

    let result = match &config.profile_dir {
        Some(dir) => match FileProfileStore::new(dir) {
            Ok(store) => {
                tracing::info!(dir = %dir.display(), "using file profile store");
                replay(LearnerService::new(engine, store)).await
            }
            Err(e) => {
                tracing::error!(error = %e, "profile directory unavailable");
                std::process::exit(1);
            }
        },
        None => replay(LearnerService::new(engine, MemoryProfileStore::new())).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "replay aborted");
        std::process::exit(1);
    }
}

async fn replay<S: ProfileStore + 'static>(service: LearnerService<S>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut sessions: HashMap<String, SessionTracker> = HashMap::new();
    let mut processed = 0usize;
    let mut skipped = 0usize;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let input: ReplayLine = match serde_json::from_str(line) {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed line");
                skipped += 1;
                continue;
            }
        };

        let outcome = match service.record_response(&input.learner_id, input.event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(learner_id = %input.learner_id, error = %e, "skipping event");
                skipped += 1;
                continue;
            }
        };

        let tracker = sessions.entry(input.learner_id.clone()).or_default();
        let ctx = tracker.context();
        let decision = match service.next_stimulus(&input.learner_id, &ctx).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(learner_id = %input.learner_id, error = %e, "selection skipped");
                skipped += 1;
                continue;
            }
        };
        tracker.record(&decision);

        let output = ReplayOutput {
            learner_id: &input.learner_id,
            changes: &outcome.report.changes,
            decision: &decision,
        };
        let mut json = serde_json::to_string(&output)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        json.push('\n');
        stdout.write_all(json.as_bytes()).await?;
        processed += 1;
    }
    stdout.flush().await?;

    tracing::info!(processed, skipped, "replay finished");
    Ok(())
}
