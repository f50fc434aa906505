//! Logging setup built on `tracing-subscriber`

use crate::config::DebugConfig;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` takes precedence over the configured level
pub fn env_filter(config: &DebugConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()))
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed or the log file cannot be opened.
pub fn init(config: &DebugConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = env_filter(config);

    if config.log_to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()?;
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_reinit_does_not_panic() {
        let config = DebugConfig {
            log_level: LogLevel::Warn,
            ..DebugConfig::default()
        };
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
