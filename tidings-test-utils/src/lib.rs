//! Tidings Test Utilities
//!
//! Shared test infrastructure for the Tidings workspace:
//! - Proptest generators for notifications and tick sets
//! - Fixtures for seeded stores and subscriptions
//! - Range store wrappers that count, fail, or stall queries

pub use tidings_core::{
    CallerContext, Clock, FeedConfig, FeedError, FeedResult, FixedClock, ManualClock,
    Notification, StorageError, Subscription, Tick, TICKS_PER_SECOND,
};
pub use tidings_storage::{
    InMemoryRangeStore, InMemorySubscriptionStore, IndexedRecord, RangePage, RangeQuery,
    RangeStore, SubscriptionStore,
};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for feed data.

    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    /// Generate a topic id from a small alphabet so topics collide.
    pub fn arb_topic_id() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["orders", "invoices", "shipments", "returns"])
            .prop_map(str::to_string)
    }

    /// Generate a payload of up to `max_len` bytes.
    pub fn arb_payload(max_len: usize) -> impl Strategy<Value = String> {
        proptest::collection::vec(b'a'..=b'z', 0..=max_len)
            .prop_map(|bytes| bytes.into_iter().map(char::from).collect())
    }

    /// Generate a set of distinct, non-negative ticks below `max_tick`.
    pub fn arb_tick_set(max_tick: Tick, max_len: usize) -> impl Strategy<Value = BTreeSet<Tick>> {
        proptest::collection::btree_set(0..max_tick, 0..=max_len)
    }

    /// Generate notifications with distinct ticks, sorted ascending.
    pub fn arb_notifications(
        max_tick: Tick,
        max_len: usize,
        max_payload: usize,
    ) -> impl Strategy<Value = Vec<Notification>> {
        arb_tick_set(max_tick, max_len).prop_flat_map(move |ticks| {
            let count = ticks.len();
            (
                Just(ticks),
                proptest::collection::vec((arb_topic_id(), arb_payload(max_payload)), count),
            )
                .prop_map(|(ticks, fields)| {
                    ticks
                        .into_iter()
                        .zip(fields)
                        .map(|(tick, (topic, payload))| Notification::new(topic, tick, payload))
                        .collect()
                })
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common feed scenarios.

    use super::*;

    /// Record TTL used by seeded stores: long enough to never expire in tests.
    pub const FIXTURE_TTL_SECS: u64 = 86_400;

    /// A notification at `tick` with an `len`-byte payload.
    pub fn notification_at(topic_id: &str, tick: Tick, len: usize) -> Notification {
        Notification::new(topic_id, tick, "x".repeat(len))
    }

    /// Write notifications into a range store, sealing each with the fixture TTL.
    pub async fn seed(store: &dyn RangeStore, notifications: &[Notification]) -> FeedResult<()> {
        for notification in notifications {
            let record = IndexedRecord::seal(notification.clone(), FIXTURE_TTL_SECS)?;
            store.put(record).await?;
        }
        Ok(())
    }

    /// An in-memory range store holding `notifications`.
    pub async fn seeded_store(
        clock: Arc<dyn Clock>,
        notifications: &[Notification],
    ) -> FeedResult<Arc<InMemoryRangeStore>> {
        let store = Arc::new(InMemoryRangeStore::new(clock));
        seed(&*store, notifications).await?;
        Ok(store)
    }

    /// Caller in `scope` holding every feed permission.
    pub fn caller(user_id: &str, scope: &str) -> CallerContext {
        CallerContext::new(user_id, scope).with_permissions([
            "notifications:read",
            "notifications:publish",
            "subscriptions:read",
            "subscriptions:write",
        ])
    }

    /// Config with small, test-friendly limits.
    pub fn small_config(max_result_bytes: u64) -> FeedConfig {
        FeedConfig::default()
            .with_max_result_bytes(max_result_bytes)
            .with_max_cache_bytes(1024 * 1024)
            .with_query_page_limit(16)
    }
}

// ============================================================================
// RANGE STORE WRAPPERS
// ============================================================================

/// Records every query it forwards to the wrapped store.
pub struct CountingRangeStore<S> {
    inner: S,
    queries: Mutex<Vec<RangeQuery>>,
}

impl<S: RangeStore> CountingRangeStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn queries(&self) -> Vec<RangeQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl<S: RangeStore> RangeStore for CountingRangeStore<S> {
    async fn query_range(&self, query: &RangeQuery) -> FeedResult<RangePage> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }
        self.inner.query_range(query).await
    }

    async fn put(&self, record: IndexedRecord) -> FeedResult<()> {
        self.inner.put(record).await
    }
}

/// Fails selected queries with a store status; all other calls pass through.
pub struct FailingRangeStore<S> {
    inner: S,
    calls: AtomicUsize,
    fail_at: Mutex<Option<(usize, u16)>>,
}

impl<S: RangeStore> FailingRangeStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_at: Mutex::new(None),
        }
    }

    /// Fail the `nth` query from now on (0-based) with `status`.
    pub fn fail_nth(&self, nth: usize, status: u16) {
        let next = self.calls.load(Ordering::SeqCst);
        if let Ok(mut fail_at) = self.fail_at.lock() {
            *fail_at = Some((next + nth, status));
        }
    }

    /// Cancel any planned failure.
    pub fn heal(&self) {
        if let Ok(mut fail_at) = self.fail_at.lock() {
            *fail_at = None;
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RangeStore> RangeStore for FailingRangeStore<S> {
    async fn query_range(&self, query: &RangeQuery) -> FeedResult<RangePage> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let planned = self.fail_at.lock().ok().and_then(|f| *f);
        if let Some((at, status)) = planned {
            if at == call {
                return Err(StorageError::Status {
                    status,
                    reason: format!("injected failure on query {}", call),
                }
                .into());
            }
        }
        self.inner.query_range(query).await
    }

    async fn put(&self, record: IndexedRecord) -> FeedResult<()> {
        self.inner.put(record).await
    }
}

/// Delays every query; use with a paused tokio clock to exercise timeouts.
pub struct SlowRangeStore<S> {
    inner: S,
    delay: Duration,
}

impl<S: RangeStore> SlowRangeStore<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<S: RangeStore> RangeStore for SlowRangeStore<S> {
    async fn query_range(&self, query: &RangeQuery) -> FeedResult<RangePage> {
        tokio::time::sleep(self.delay).await;
        self.inner.query_range(query).await
    }

    async fn put(&self, record: IndexedRecord) -> FeedResult<()> {
        self.inner.put(record).await
    }
}
