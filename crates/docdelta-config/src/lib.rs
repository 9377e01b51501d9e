//! docdelta configuration store
//!
//! Holds the operational settings of the update engine (document roots,
//! backup and index toggles, log level) and resolves them into the concrete
//! paths every other component works against.

pub mod error;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::ConfigManager;
pub use types::{ConfigStore, EngineConfig, ResolvedPaths, LOG_LEVELS};
