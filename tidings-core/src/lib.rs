//! Tidings Core - Feed Types
//!
//! Pure data structures shared by the storage and API crates: ticks and
//! clocks, notification and subscription records, caller identity,
//! configuration and the error taxonomy.

pub mod caller;
pub mod clock;
pub mod config;
pub mod entities;
pub mod error;
pub mod identity;

pub use caller::CallerContext;
pub use clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use config::{
    FeedConfig, DEFAULT_MAX_AGE_SECS, DEFAULT_MAX_CACHE_BYTES, DEFAULT_MAX_RESULT_BYTES,
    DEFAULT_RECORD_TTL_SECS,
};
pub use entities::{Notification, NotificationPage, Subscription};
pub use error::{AccessError, ConfigError, FeedError, FeedResult, StorageError, ValidationError};
pub use identity::{
    new_record_id, secs_to_ticks, tick_from_datetime, tick_to_datetime, RecordId, Tick,
    TICKS_PER_SECOND,
};
