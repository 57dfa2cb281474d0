use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;

use crate::adaptive::profile::LearnerProfile;
use crate::error::EngineError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("profile serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid learner id: {0:?}")]
    InvalidLearnerId(String),
    #[error("profile store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Load/save learner profiles by learner id.
///
/// Stores keep the JSON text of a profile. `load` returns the text run through
/// validation and migration, so a store never hands out an out-of-range profile.
pub trait ProfileStore: Send + Sync {
    fn load(&self, learner_id: &str) -> Result<Option<LearnerProfile>, EngineError>;
    fn save(&self, learner_id: &str, profile: &LearnerProfile) -> Result<(), EngineError>;
    /// Drops the stored profile. Returns whether one existed.
    fn remove(&self, learner_id: &str) -> Result<bool, EngineError>;
}

fn parse_stored(learner_id: &str, raw: &str) -> Result<LearnerProfile, EngineError> {
    LearnerProfile::from_json_str(raw).map_err(|e| {
        tracing::warn!(learner_id = %learner_id, error = %e, "stored profile could not be parsed");
        e
    })
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, String>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw text as-is, bypassing serialization.
    pub fn insert_raw(&self, learner_id: &str, raw: impl Into<String>) {
        self.profiles.write().insert(learner_id.to_string(), raw.into());
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self, learner_id: &str) -> Result<Option<LearnerProfile>, EngineError> {
        let raw = self.profiles.read().get(learner_id).cloned();
        raw.map(|raw| parse_stored(learner_id, &raw)).transpose()
    }

    fn save(&self, learner_id: &str, profile: &LearnerProfile) -> Result<(), EngineError> {
        let raw = profile.to_json_string().map_err(StoreError::from)?;
        self.profiles.write().insert(learner_id.to_string(), raw);
        Ok(())
    }

    fn remove(&self, learner_id: &str) -> Result<bool, EngineError> {
        Ok(self.profiles.write().remove(learner_id).is_some())
    }
}

/// One `<dir>/<learner_id>.json` file per learner.
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, learner_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !learner_id.is_empty()
            && learner_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidLearnerId(learner_id.to_string()));
        }
        Ok(self.dir.join(format!("{learner_id}.json")))
    }
}

impl ProfileStore for FileProfileStore {
    fn load(&self, learner_id: &str) -> Result<Option<LearnerProfile>, EngineError> {
        let path = self.path_for(learner_id)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e).into()),
        };
        parse_stored(learner_id, &raw).map(Some)
    }

    fn save(&self, learner_id: &str, profile: &LearnerProfile) -> Result<(), EngineError> {
        let path = self.path_for(learner_id)?;
        let raw = profile.to_json_string().map_err(StoreError::from)?;

        let tmp = path.with_extension("json.tmp");
        let write = || -> Result<(), StoreError> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(raw.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &path)?;
            Ok(())
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!(learner_id = %learner_id, path = %path.display(), "saved learner profile");
        Ok(())
    }

    fn remove(&self, learner_id: &str) -> Result<bool, EngineError> {
        let path = self.path_for(learner_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e).into()),
        }
    }
}
