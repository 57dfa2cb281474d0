use serde::{Deserialize, Serialize};

use crate::adaptive::selector::SelectionDecision;
use crate::adaptive::types::{ModalityUsage, StimulusType};

/// Caller-owned session state handed to the selector. Opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    #[serde(default)]
    pub recent_modality_usage: ModalityUsage,
    #[serde(default)]
    pub current_item: Option<String>,
    #[serde(default)]
    pub explicit_item_override: Option<String>,
}

impl SessionContext {
    pub fn usage(&self, modality: StimulusType) -> u32 {
        *self.recent_modality_usage.get(modality)
    }
}

/// In-memory bookkeeping of the decisions served during one session.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    usage: ModalityUsage,
    current_item: Option<String>,
    pending_override: Option<String>,
    served: usize,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, decision: &SelectionDecision) {
        *self.usage.get_mut(decision.stimulus_type) += 1;
        self.current_item = Some(decision.item_id.clone());
        self.served += 1;
    }

    /// Forces the next selection onto `item_id`. Cleared once consumed.
    pub fn request_item(&mut self, item_id: impl Into<String>) {
        self.pending_override = Some(item_id.into());
    }

    pub fn context(&mut self) -> SessionContext {
        SessionContext {
            recent_modality_usage: self.usage,
            current_item: self.current_item.clone(),
            explicit_item_override: self.pending_override.take(),
        }
    }

    pub fn served(&self) -> usize {
        self.served
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
