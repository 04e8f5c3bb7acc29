//! Tracing subscriber setup.
//!
//! The configured level is a number from 1 to 100, mapped onto tracing
//! levels in bands of twenty. `RUST_LOG`, when set, takes precedence.

use anyhow::{anyhow, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn level_filter(level: u32) -> LevelFilter {
    match level {
        0..=20 => LevelFilter::ERROR,
        21..=40 => LevelFilter::WARN,
        41..=60 => LevelFilter::INFO,
        61..=80 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global fmt subscriber. Fails if one is already installed.
pub fn init(level: u32) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_filter(level).to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bands() {
        assert_eq!(level_filter(1), LevelFilter::ERROR);
        assert_eq!(level_filter(20), LevelFilter::ERROR);
        assert_eq!(level_filter(21), LevelFilter::WARN);
        assert_eq!(level_filter(40), LevelFilter::WARN);
        assert_eq!(level_filter(50), LevelFilter::INFO);
        assert_eq!(level_filter(60), LevelFilter::INFO);
        assert_eq!(level_filter(80), LevelFilter::DEBUG);
        assert_eq!(level_filter(81), LevelFilter::TRACE);
        assert_eq!(level_filter(100), LevelFilter::TRACE);
    }

    #[test]
    fn test_filter_directive_parses() {
        for level in [10, 30, 50, 70, 90] {
            let directive = level_filter(level).to_string();
            assert!(EnvFilter::try_new(&directive).is_ok(), "{}", directive);
        }
    }
}
