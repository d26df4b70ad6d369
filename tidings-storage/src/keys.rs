//! Sort-key encoding for the notification partition.
//!
//! All notifications live in one partition and are reachable through three
//! sort-key indices. Keys are fixed-width strings so that lexicographic key
//! order matches numeric tick order:
//!
//! - [`OrderIndex::Topic`]: `"{topic_id}:{tick:016X}"`
//! - [`OrderIndex::Ascending`]: `"{tick:016X}"`
//! - [`OrderIndex::Descending`]: `"{u64::MAX - tick:020}"`, so ascending key
//!   order is descending tick order
//!
//! Ticks are non-negative by construction; query bounds below zero clamp to
//! zero.

use tidings_core::{
    secs_to_ticks, FeedResult, Notification, RecordId, Tick, ValidationError,
};

/// Partition key shared by every notification record.
pub const NOTIFICATION_PARTITION: &str = "notification";

/// Secondary orderings over the notification partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderIndex {
    /// Per-topic, ascending by tick.
    Topic,
    /// All topics, ascending by tick.
    Ascending,
    /// All topics, descending by tick.
    Descending,
}

impl OrderIndex {
    pub const ALL: [OrderIndex; 3] = [Self::Topic, Self::Ascending, Self::Descending];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

fn clamp(tick: Tick) -> u64 {
    tick.max(0) as u64
}

/// Ascending-index key for a tick.
pub fn ascending_key(tick: Tick) -> String {
    format!("{:016X}", clamp(tick))
}

/// Descending-index key for a tick.
pub fn descending_key(tick: Tick) -> String {
    format!("{:020}", u64::MAX - clamp(tick))
}

/// Topic-index key for a tick.
pub fn topic_key(topic_id: &str, tick: Tick) -> String {
    format!("{}:{}", topic_id, ascending_key(tick))
}

/// A notification sealed for storage: partition, sort keys and expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRecord {
    pub partition: String,
    pub notification: Notification,
    pub topic_key: String,
    pub ascending_key: String,
    pub descending_key: String,
    /// Tick at or after which the store may drop the record.
    pub expires_at: Tick,
}

impl IndexedRecord {
    /// Seal a notification into the shared partition with the given TTL.
    pub fn seal(notification: Notification, ttl_secs: u64) -> FeedResult<Self> {
        if notification.create_tick < 0 {
            return Err(ValidationError::InvalidValue {
                field: "create_tick".to_string(),
                reason: format!("must be non-negative, got {}", notification.create_tick),
            }
            .into());
        }
        if notification.topic_id.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "topic_id".to_string(),
            }
            .into());
        }

        let tick = notification.create_tick;
        Ok(Self {
            partition: NOTIFICATION_PARTITION.to_string(),
            topic_key: topic_key(&notification.topic_id, tick),
            ascending_key: ascending_key(tick),
            descending_key: descending_key(tick),
            expires_at: tick.saturating_add(secs_to_ticks(ttl_secs)),
            notification,
        })
    }

    pub fn id(&self) -> RecordId {
        self.notification.id
    }

    pub fn tick(&self) -> Tick {
        self.notification.create_tick
    }

    /// Sort key of this record within `index`.
    pub fn sort_key(&self, index: OrderIndex) -> &str {
        match index {
            OrderIndex::Topic => &self.topic_key,
            OrderIndex::Ascending => &self.ascending_key,
            OrderIndex::Descending => &self.descending_key,
        }
    }

    pub fn is_expired(&self, now: Tick) -> bool {
        now >= self.expires_at
    }
}
