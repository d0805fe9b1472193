//! Rewind: a personal time-travel web archiver
//!
//! This crate crawls a bounded portion of a single host, stores every fetched
//! resource verbatim as one archive job, and replays any stored job offline with
//! its links rewritten to point back into the same snapshot.

pub mod archiver;
pub mod config;
pub mod crawler;
pub mod output;
pub mod replay;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Rewind operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Replay error: {0}")]
    Replay(#[from] replay::ReplayError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid job parameters: {0}")]
    InvalidJob(String),

    #[error("Invalid job status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobStatus,
        to: state::JobStatus,
    },

    #[error("Job {0} was cancelled")]
    Cancelled(i64),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Malformed URL '{input}': {reason}")]
    Malformed { input: String, reason: String },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for Rewind operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use archiver::{Archiver, JobHandle};
pub use config::Config;
pub use replay::{RenderedResource, Replayer};
pub use state::{JobStatus, ResourceKind};
pub use storage::{ResourceStore, SqliteStorage};
pub use crate::url::{host_key, normalize_url, resolve};
