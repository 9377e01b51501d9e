//! Tracing subscriber setup for hosts embedding the engine

use std::str::FromStr;

use docdelta_config::ConfigError;
use tracing::Level;

use crate::error::Result;

/// Parses a configured `log_level` into a tracing level
pub fn parse_level(level: &str) -> Result<Level> {
    Level::from_str(level.trim()).map_err(|_| {
        ConfigError::Validation(format!("unknown log_level '{}'", level)).into()
    })
}

/// Installs a fmt subscriber capped at `level`
///
/// Returns `false` when a global subscriber was already installed, which
/// leaves the existing one in place.
pub fn init(level: &str) -> Result<bool> {
    let level = parse_level(level)?;
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(%level, "logging initialized");
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_level("DEBUG").unwrap(), Level::DEBUG);
        assert!(parse_level("verbose").is_err());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let _ = init("warn").unwrap();
        assert!(!init("warn").unwrap());
    }
}
