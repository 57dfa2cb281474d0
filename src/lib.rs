pub mod adaptive;
pub mod config;
pub mod error;
pub mod logging;

pub use adaptive::engine::AdaptiveEngine;
pub use error::{EngineError, EngineResult};
