pub mod catalog;
pub mod config;
pub mod difficulty;
pub mod engine;
pub mod metrics;
pub mod persistence;
pub mod preference;
pub mod profile;
pub mod report;
pub mod selector;
pub mod service;
pub mod session;
pub mod tuning;
pub mod types;

pub use catalog::{CatalogItem, ItemCatalogSource, StaticCatalog};
pub use config::AdaptiveConfig;
pub use engine::{AdaptiveEngine, IngestOutcome};
pub use persistence::{FileProfileStore, MemoryProfileStore, ProfileStore, StoreError};
pub use profile::{migrate, validate, AdaptationConfig, LearnerProfile, CURRENT_SCHEMA_VERSION};
pub use selector::{select_next, SelectionDecision};
pub use service::LearnerService;
pub use session::{SessionContext, SessionTracker};
pub use types::{DifficultyTier, ResponseEvent, ResponseResult, StimulusType};
