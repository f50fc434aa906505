//! Error types for the oxidized-gif emulator

use thiserror::Error;

/// Main error type for the GIF unit
#[derive(Error, Debug)]
pub enum GifError {
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Save state error: {0}")]
    SaveState(#[from] SaveStateError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transfer path errors
#[derive(Error, Debug)]
pub enum PathError {
    #[error("PATH{path} overflow: {needed} bytes needed, capacity {capacity}")]
    Overflow {
        path: usize,
        needed: usize,
        capacity: usize,
    },

    #[error("Invalid path index: {0}")]
    InvalidPath(usize),

    #[error("PATH{0} is owned by the worker thread")]
    WorkerOwned(usize),
}

/// Save state errors
#[derive(Error, Debug)]
pub enum SaveStateError {
    #[error("Save state truncated at offset {0}")]
    Truncated(usize),

    #[error("Bad section tag: expected {expected:?}, found {found:?}")]
    BadTag { expected: String, found: String },

    #[error("Unsupported save state version {0}")]
    UnsupportedVersion(u32),

    #[error("PATH{path} not quiescent: readAmount={read_amount}, pending packets={pending}")]
    PathNotQuiescent {
        path: usize,
        read_amount: usize,
        pending: usize,
    },

    #[error("PATH{path} persisted size {size} exceeds arena capacity {capacity}")]
    CapacityExceeded {
        path: usize,
        size: usize,
        capacity: usize,
    },

    #[error("Invalid {field} value {value} in save state")]
    InvalidField { field: &'static str, value: u64 },

    #[error("Path error: {0}")]
    Path(#[from] PathError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid path buffer size {0}: must be a non-zero multiple of 16")]
    InvalidBufferSize(usize),
}

/// Result type alias for GIF unit operations
pub type Result<T> = std::result::Result<T, GifError>;
