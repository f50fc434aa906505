//! Configuration system for the oxidized-gif emulator

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gif: GifConfig,
    pub debug: DebugConfig,
}

/// GIF unit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GifConfig {
    /// Run the worker-owned path on the VU1 worker thread
    pub mtvu: bool,
    /// Path handed to the worker thread when `mtvu` is enabled
    pub worker_path: WorkerPath,
    /// Arena size in bytes for each of the three paths
    pub path_buffer_size: usize,
    /// Log writes to undocumented A+D registers at debug level
    pub log_unknown_registers: bool,
}

/// Path owned by the worker thread in MTVU mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum WorkerPath {
    #[default]
    Path1,
    Path2,
    Path3,
}

impl WorkerPath {
    /// Zero-based path index
    pub fn index(self) -> usize {
        match self {
            Self::Path1 => 0,
            Self::Path2 => 1,
            Self::Path3 => 2,
        }
    }
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_path: PathBuf,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Default arena size per path (64 KiB)
pub const DEFAULT_PATH_BUFFER_SIZE: usize = 0x10000;

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            mtvu: false,
            worker_path: WorkerPath::default(),
            path_buffer_size: DEFAULT_PATH_BUFFER_SIZE,
            log_unknown_registers: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_to_file: false,
            log_path: PathBuf::from("oxidized-gif.log"),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or create it if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Load and validate configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that serde cannot constrain
    pub fn validate(&self) -> Result<(), ConfigError> {
        let size = self.gif.path_buffer_size;
        if size == 0 || size % 16 != 0 {
            return Err(ConfigError::InvalidBufferSize(size));
        }
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("oxidized-gif")
            .join("config.toml")
    }
}
