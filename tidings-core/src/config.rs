//! Feed configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FeedResult};

/// Default cache budget: 20 MiB of estimated entry size.
pub const DEFAULT_MAX_CACHE_BYTES: u64 = 20 * 1024 * 1024;

/// Default response ceiling: 5 MiB of payload, below a 6 MB gateway limit.
pub const DEFAULT_MAX_RESULT_BYTES: u64 = 5 * 1024 * 1024;

/// Default catch-up window: 30 minutes.
pub const DEFAULT_MAX_AGE_SECS: u64 = 1800;

/// Default record retention applied at write time: 48 hours.
pub const DEFAULT_RECORD_TTL_SECS: u64 = 48 * 60 * 60;

/// Configuration for the notification read path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Upper bound on the estimated size of one scope's cache.
    pub max_cache_bytes: u64,
    /// Hard ceiling on payload bytes returned in one response.
    pub max_result_bytes: u64,
    /// Requests older than this must resynchronise instead of catching up.
    pub max_age_secs: u64,
    /// Time-to-live stamped on records at write time.
    pub record_ttl_secs: u64,
    /// Timeout applied to each range query.
    pub query_timeout: Duration,
    /// Maximum items requested per range query page.
    pub query_page_limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_cache_bytes: DEFAULT_MAX_CACHE_BYTES,
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            record_ttl_secs: DEFAULT_RECORD_TTL_SECS,
            query_timeout: Duration::from_secs(5),
            query_page_limit: 1000,
        }
    }
}

impl FeedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create FeedConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TIDINGS_MAX_CACHE_BYTES` (default: 20 MiB)
    /// - `TIDINGS_MAX_RESULT_BYTES` (default: 5 MiB)
    /// - `TIDINGS_MAX_AGE_SECS` (default: 1800)
    /// - `TIDINGS_RECORD_TTL_SECS` (default: 172800)
    /// - `TIDINGS_QUERY_TIMEOUT_MS` (default: 5000)
    /// - `TIDINGS_QUERY_PAGE_LIMIT` (default: 1000)
    ///
    /// Unparseable values fall back to the default; call [`validate`](Self::validate)
    /// afterwards to reject nonsensical combinations.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_cache_bytes = env_parse("TIDINGS_MAX_CACHE_BYTES").unwrap_or(defaults.max_cache_bytes);
        let max_result_bytes =
            env_parse("TIDINGS_MAX_RESULT_BYTES").unwrap_or(defaults.max_result_bytes);
        let max_age_secs = env_parse("TIDINGS_MAX_AGE_SECS").unwrap_or(defaults.max_age_secs);
        let record_ttl_secs =
            env_parse("TIDINGS_RECORD_TTL_SECS").unwrap_or(defaults.record_ttl_secs);
        let query_timeout = env_parse::<u64>("TIDINGS_QUERY_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.query_timeout);
        let query_page_limit =
            env_parse("TIDINGS_QUERY_PAGE_LIMIT").unwrap_or(defaults.query_page_limit);

        Self {
            max_cache_bytes,
            max_result_bytes,
            max_age_secs,
            record_ttl_secs,
            query_timeout,
            query_page_limit,
        }
    }

    pub fn with_max_cache_bytes(mut self, bytes: u64) -> Self {
        self.max_cache_bytes = bytes;
        self
    }

    pub fn with_max_result_bytes(mut self, bytes: u64) -> Self {
        self.max_result_bytes = bytes;
        self
    }

    pub fn with_max_age_secs(mut self, secs: u64) -> Self {
        self.max_age_secs = secs;
        self
    }

    pub fn with_record_ttl_secs(mut self, secs: u64) -> Self {
        self.record_ttl_secs = secs;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_query_page_limit(mut self, limit: usize) -> Self {
        self.query_page_limit = limit;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - every byte budget, age and TTL is positive
    /// - query timeout and page limit are positive
    pub fn validate(&self) -> FeedResult<()> {
        let positive = [
            ("max_cache_bytes", self.max_cache_bytes),
            ("max_result_bytes", self.max_result_bytes),
            ("max_age_secs", self.max_age_secs),
            ("record_ttl_secs", self.record_ttl_secs),
            ("query_page_limit", self.query_page_limit as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, value.to_string(), "must be greater than zero"));
            }
        }

        if self.query_timeout.is_zero() {
            return Err(invalid(
                "query_timeout",
                format!("{:?}", self.query_timeout),
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: String, reason: &str) -> crate::FeedError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    }
    .into()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
