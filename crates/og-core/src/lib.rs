//! Core types for the oxidized-gif GIF unit emulator
//!
//! This crate provides the foundational types, error handling,
//! configuration, logging and worker synchronisation used by the
//! GIF unit core.

pub mod config;
pub mod error;
pub mod logging;
pub mod sync;

pub use config::Config;
pub use error::{ConfigError, GifError, PathError, Result, SaveStateError};
pub use sync::{NoWorker, Quiescence, WorkGuard, WorkerIdleGate};
