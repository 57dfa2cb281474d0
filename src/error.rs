use thiserror::Error;

use crate::adaptive::persistence::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("corrupt profile: {0}")]
    CorruptProfile(String),
    #[error("item catalog is empty")]
    EmptyCatalog,
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
