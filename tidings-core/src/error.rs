//! Error types for Tidings operations

use crate::identity::Tick;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The backing range store answered with a non-success status.
    #[error("Range store returned status {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Range query timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// A scan reported more results but returned no items to advance past.
    #[error("Range scan on {index} index reported partial without items")]
    StalledScan { index: String },

    #[error("Duplicate tick {tick} in partition {partition}")]
    DuplicateTick { partition: String, tick: Tick },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Status code for a store-reported failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Caller access errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Unknown scope: {scope}")]
    UnknownScope { scope: String },

    #[error("Permission denied for user {user_id} on {operation}")]
    PermissionDenied { user_id: String, operation: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Tidings errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The requested window is older than the retention policy allows.
    /// Callers must resynchronise from source data instead of catching up.
    #[error("Requested tick {since} is older than {max_age_secs}s before {now}")]
    Expired {
        since: Tick,
        now: Tick,
        max_age_secs: u64,
    },

    #[error("Record at tick {tick} exceeds the {limit} byte result ceiling")]
    RecordTooLarge { tick: Tick, limit: u64 },
}

impl FeedError {
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }
}

/// Result type alias for Tidings operations.
pub type FeedResult<T> = Result<T, FeedError>;
