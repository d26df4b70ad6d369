//! Range store contract and in-memory implementation.
//!
//! The backing store offers ordered range scans over one partition. A scan
//! returns at most `limit` items and reports [`RangeStatus::Partial`] when
//! more items remain inside the requested bounds; callers narrow the bounds
//! past the last returned key and query again. Failures are reported as
//! [`StorageError::Status`] carrying the store's status code.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tidings_core::{Clock, FeedResult, Notification, RecordId, StorageError, Tick};

use crate::keys::{
    ascending_key, descending_key, IndexedRecord, OrderIndex, NOTIFICATION_PARTITION,
};

/// Completion status of one range query page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStatus {
    /// Every item inside the bounds was returned.
    Complete,
    /// More items remain; query again past the last returned key.
    Partial,
}

/// An inclusive range scan over one index of a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub partition: String,
    pub index: OrderIndex,
    pub lower: String,
    pub upper: String,
    pub limit: usize,
}

impl RangeQuery {
    /// Notifications with `lower <= tick <= upper`, oldest first.
    pub fn ascending(lower: Tick, upper: Tick, limit: usize) -> Self {
        Self {
            partition: NOTIFICATION_PARTITION.to_string(),
            index: OrderIndex::Ascending,
            lower: ascending_key(lower),
            upper: ascending_key(upper),
            limit,
        }
    }

    /// Notifications with `lower <= tick <= upper`, newest first.
    pub fn descending(lower: Tick, upper: Tick, limit: usize) -> Self {
        Self {
            partition: NOTIFICATION_PARTITION.to_string(),
            index: OrderIndex::Descending,
            lower: descending_key(upper),
            upper: descending_key(lower),
            limit,
        }
    }
}

/// One page of a range scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePage {
    pub items: Vec<Notification>,
    pub status: RangeStatus,
}

impl RangePage {
    pub fn complete(items: Vec<Notification>) -> Self {
        Self {
            items,
            status: RangeStatus::Complete,
        }
    }

    pub fn partial(items: Vec<Notification>) -> Self {
        Self {
            items,
            status: RangeStatus::Partial,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.status == RangeStatus::Partial
    }
}

/// Ordered range-scan store holding the notification partition.
#[async_trait]
pub trait RangeStore: Send + Sync {
    /// Scan one index between inclusive bounds.
    async fn query_range(&self, query: &RangeQuery) -> FeedResult<RangePage>;

    /// Write a sealed record. Ticks are unique within a partition.
    async fn put(&self, record: IndexedRecord) -> FeedResult<()>;
}

#[async_trait]
impl<S: RangeStore + ?Sized> RangeStore for Arc<S> {
    async fn query_range(&self, query: &RangeQuery) -> FeedResult<RangePage> {
        self.as_ref().query_range(query).await
    }

    async fn put(&self, record: IndexedRecord) -> FeedResult<()> {
        self.as_ref().put(record).await
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<RecordId, IndexedRecord>,
    indexes: HashMap<(String, OrderIndex), BTreeMap<String, RecordId>>,
}

/// In-memory range store with store-layer TTL.
///
/// Expired records are invisible to queries as soon as their TTL passes and
/// are physically removed by [`purge_expired`](Self::purge_expired).
pub struct InMemoryRangeStore {
    clock: Arc<dyn Clock>,
    inner: RwLock<StoreInner>,
}

impl InMemoryRangeStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Number of stored records, expired or not.
    pub fn len(&self) -> FeedResult<usize> {
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(inner.records.len())
    }

    pub fn is_empty(&self) -> FeedResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove records whose TTL has passed. Returns the number removed.
    pub fn purge_expired(&self) -> FeedResult<usize> {
        let now = self.clock.now_tick();
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;

        let expired: Vec<IndexedRecord> = inner
            .records
            .values()
            .filter(|r| r.is_expired(now))
            .cloned()
            .collect();

        for record in &expired {
            inner.records.remove(&record.id());
            for index in OrderIndex::ALL {
                if let Some(map) = inner.indexes.get_mut(&(record.partition.clone(), index)) {
                    map.remove(record.sort_key(index));
                }
            }
        }

        Ok(expired.len())
    }
}

#[async_trait]
impl RangeStore for InMemoryRangeStore {
    async fn query_range(&self, query: &RangeQuery) -> FeedResult<RangePage> {
        let now = self.clock.now_tick();
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;

        if query.lower > query.upper {
            return Ok(RangePage::complete(Vec::new()));
        }
        let Some(index) = inner
            .indexes
            .get(&(query.partition.clone(), query.index))
        else {
            return Ok(RangePage::complete(Vec::new()));
        };

        let mut items: Vec<Notification> = index
            .range(query.lower.clone()..=query.upper.clone())
            .filter_map(|(_, id)| inner.records.get(id))
            .filter(|record| !record.is_expired(now))
            .take(query.limit.saturating_add(1))
            .map(|record| record.notification.clone())
            .collect();

        if items.len() > query.limit {
            items.truncate(query.limit);
            Ok(RangePage::partial(items))
        } else {
            Ok(RangePage::complete(items))
        }
    }

    async fn put(&self, record: IndexedRecord) -> FeedResult<()> {
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;

        let ascending = (record.partition.clone(), OrderIndex::Ascending);
        let taken = inner
            .indexes
            .get(&ascending)
            .is_some_and(|map| map.contains_key(&record.ascending_key));
        if taken {
            return Err(StorageError::DuplicateTick {
                partition: record.partition.clone(),
                tick: record.tick(),
            }
            .into());
        }

        for index in OrderIndex::ALL {
            inner
                .indexes
                .entry((record.partition.clone(), index))
                .or_default()
                .insert(record.sort_key(index).to_string(), record.id());
        }
        inner.records.insert(record.id(), record);
        Ok(())
    }
}
