//! Match-Harvester: a resumable, rate-limited match record collector
//!
//! This crate acquires match records from a remote source one identifier at a
//! time, through either an isolated browsing session or the source's structured
//! query interface, normalizes them into one canonical shape and checkpoints
//! progress so an interrupted job can be resumed.

pub mod config;
pub mod fetch;
pub mod harvester;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Match-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid job request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::JobStatus,
        to: state::JobStatus,
    },

    #[error("Export failed: {0}")]
    Export(#[from] serde_json::Error),
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

/// Malformed job requests and records missing their identity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("range end {end} is before start {start}")]
    InvalidRange { start: i64, end: i64 },

    #[error("range {start}..={end} has more than {max} identifiers")]
    RangeTooLarge { start: i64, end: i64, max: u64 },

    #[error("range start must be a positive identifier")]
    NonPositiveStart,

    #[error("identifier list contains no valid identifiers")]
    EmptyList,

    #[error("record is missing identifying field: {0}")]
    MissingIdentity(&'static str),
}

/// Errors raised while obtaining a match from the remote source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("source returned HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("timed out after {secs}s waiting for {url}")]
    Timeout { url: String, secs: u64 },

    #[error("isolated session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("page for match {id} is missing its expected structure (likely blocked)")]
    Blocked { id: u64 },
}

/// Errors raised while reading a fetched document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("match {id}: no {what} found")]
    MissingElement { id: u64, what: &'static str },

    #[error("match {id}: malformed document: {message}")]
    MalformedDocument { id: u64, message: String },
}

/// Result type alias for Match-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use harvester::{JobController, JobHandle, JobRequest};
pub use record::MatchRecord;
pub use state::{JobOptions, JobStatus};
