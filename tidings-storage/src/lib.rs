//! Tidings Storage - Range Store and Notification Cache
//!
//! Defines the ordered range-store contract the feed reads from, the
//! subscription store contract, in-memory implementations of both, and the
//! cache-backed range-merge reader.

pub mod cache;
pub mod keys;
pub mod range_store;
pub mod subscription_store;

pub use cache::{
    CacheStats, RangeMergeReader, ReadBatch, ReadState, ReaderConfig, ReaderStats, TickCache,
};
pub use keys::{IndexedRecord, OrderIndex, NOTIFICATION_PARTITION};
pub use range_store::{InMemoryRangeStore, RangePage, RangeQuery, RangeStatus, RangeStore};
pub use subscription_store::{InMemorySubscriptionStore, SubscriptionStore};
