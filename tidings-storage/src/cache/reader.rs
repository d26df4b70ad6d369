//! Range-merge reader: answers "everything since tick T" from the cache,
//! querying the range store only for the parts of the window not yet cached.
//!
//! # Phases
//!
//! 1. **Forward-fill** rescans from the cache's earliest tick (or, on a cold
//!    cache, from the requested tick) up to "now" through the descending
//!    index, so the cache has no gaps between its lower edge and "now".
//!    Ticks already cached are skipped on insert.
//! 2. **Backward-fill** pulls records between the requested tick and the
//!    cache's earliest tick through the ascending index.
//! 3. **Assembly** walks the cache in ascending order from the requested tick
//!    and stops before the first item that would push the payload total to
//!    the result ceiling.
//! 4. **Eviction** trims the oldest entries once the size budget is exceeded.
//!
//! Fetched pages are staged and merged only after a fill phase completes, so
//! a timed-out or dropped call never leaves a gap in the cache. A store
//! failure clears the whole cache before the error is returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tidings_core::{
    Clock, FeedConfig, FeedError, FeedResult, Notification, StorageError, Tick,
};
use tokio::sync::Mutex;

use super::tick_cache::{CacheStats, TickCache};
use crate::keys::OrderIndex;
use crate::range_store::{RangePage, RangeQuery, RangeStore};

/// Limits governing one reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Eviction threshold for the cache's estimated size.
    pub max_cache_bytes: u64,
    /// Exclusive ceiling on payload bytes in one batch.
    pub max_result_bytes: u64,
    /// Default timeout for each range query.
    pub query_timeout: Duration,
    /// Items requested per range query page.
    pub page_limit: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::from(&FeedConfig::default())
    }
}

impl From<&FeedConfig> for ReaderConfig {
    fn from(config: &FeedConfig) -> Self {
        Self {
            max_cache_bytes: config.max_cache_bytes,
            max_result_bytes: config.max_result_bytes,
            query_timeout: config.query_timeout,
            page_limit: config.query_page_limit,
        }
    }
}

/// Completion state of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Every notification from the requested tick up to "now" was returned.
    Complete,
    /// The result ceiling was reached; read again from `resume_from`.
    Partial { resume_from: Tick },
}

/// Notifications returned by one read, ascending by tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBatch {
    pub items: Vec<Notification>,
    pub state: ReadState,
    /// Topic of the notification at `resume_from` when the batch is partial.
    pub stopped_at_topic: Option<String>,
}

impl ReadBatch {
    pub fn is_complete(&self) -> bool {
        self.state == ReadState::Complete
    }

    /// Tick to pass to the next read when this batch is partial.
    pub fn resume_tick(&self) -> Option<Tick> {
        match self.state {
            ReadState::Complete => None,
            ReadState::Partial { resume_from } => Some(resume_from),
        }
    }

    /// Total payload bytes in this batch.
    pub fn payload_bytes(&self) -> u64 {
        self.items.iter().map(|n| n.payload_len() as u64).sum()
    }
}

/// Reader statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub cache: CacheStats,
    /// Range queries issued against the store.
    pub store_queries: u64,
}

/// Cache-backed reader for one scope's notification partition.
///
/// One reader owns one cache; construct one per scope and share it behind an
/// `Arc`. Concurrent reads are serialised on the cache lock.
pub struct RangeMergeReader {
    scope: String,
    store: Arc<dyn RangeStore>,
    clock: Arc<dyn Clock>,
    config: ReaderConfig,
    cache: Mutex<TickCache>,
    store_queries: AtomicU64,
}

impl RangeMergeReader {
    pub fn new(
        scope: impl Into<String>,
        store: Arc<dyn RangeStore>,
        clock: Arc<dyn Clock>,
        config: ReaderConfig,
    ) -> Self {
        Self {
            scope: scope.into(),
            store,
            clock,
            config,
            cache: Mutex::new(TickCache::new()),
            store_queries: AtomicU64::new(0),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Read notifications with `tick >= earliest_tick`, using the configured
    /// query timeout.
    pub async fn read_latest(&self, earliest_tick: Tick) -> FeedResult<ReadBatch> {
        self.read_latest_with_timeout(earliest_tick, self.config.query_timeout)
            .await
    }

    /// Read notifications with `tick >= earliest_tick`, bounding each range
    /// query by `timeout`.
    pub async fn read_latest_with_timeout(
        &self,
        earliest_tick: Tick,
        timeout: Duration,
    ) -> FeedResult<ReadBatch> {
        let mut cache = self.cache.lock().await;
        let now = self.clock.now_tick();

        let outcome = match self.fill(&mut cache, earliest_tick, now, timeout).await {
            Ok(()) => Ok(self.assemble(&cache, earliest_tick)),
            Err(err) => {
                // Staged pages were discarded, so a timeout leaves the cache
                // consistent. Anything else may mean the store is unreliable.
                if !matches!(err, FeedError::Storage(StorageError::Timeout { .. })) {
                    tracing::warn!(
                        scope = %self.scope,
                        error = %err,
                        cached = cache.len(),
                        "Range fill failed; clearing notification cache"
                    );
                    cache.clear();
                }
                Err(err)
            }
        };

        let evicted = cache.evict_oldest(self.config.max_cache_bytes);
        if evicted > 0 {
            tracing::debug!(
                scope = %self.scope,
                evicted,
                tracked_bytes = cache.tracked_bytes(),
                "Evicted oldest notifications"
            );
        }

        outcome
    }

    /// Drop every cached entry.
    pub async fn invalidate(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn stats(&self) -> ReaderStats {
        ReaderStats {
            cache: self.cache.lock().await.stats(),
            store_queries: self.store_queries.load(Ordering::Relaxed),
        }
    }

    /// Earliest and latest cached ticks, if the cache is non-empty.
    pub async fn cached_span(&self) -> Option<(Tick, Tick)> {
        let cache = self.cache.lock().await;
        cache.earliest_tick().zip(cache.latest_tick())
    }

    async fn fill(
        &self,
        cache: &mut TickCache,
        earliest_tick: Tick,
        now: Tick,
        timeout: Duration,
    ) -> FeedResult<()> {
        // Rescan from the cache's lower edge so records that landed behind
        // the latest cached tick are still picked up.
        let forward_from = cache.earliest_tick().unwrap_or(earliest_tick);
        let newer = self.fetch_descending(forward_from, now, timeout).await?;
        let added = cache.extend(newer);
        tracing::debug!(scope = %self.scope, from = forward_from, to = now, added, "Forward fill");

        if let Some(cache_earliest) = cache.earliest_tick() {
            if earliest_tick < cache_earliest {
                let older = self
                    .fetch_ascending(earliest_tick, cache_earliest - 1, timeout)
                    .await?;
                let added = cache.extend(older);
                tracing::debug!(
                    scope = %self.scope,
                    from = earliest_tick,
                    to = cache_earliest - 1,
                    added,
                    "Backward fill"
                );
            }
        }

        Ok(())
    }

    /// Fetch `[lower, upper]` newest first, following partial pages downward.
    async fn fetch_descending(
        &self,
        lower: Tick,
        mut upper: Tick,
        timeout: Duration,
    ) -> FeedResult<Vec<Notification>> {
        let mut staged = Vec::new();
        while lower <= upper {
            let query = RangeQuery::descending(lower, upper, self.config.page_limit);
            let page = self.query(&query, timeout).await?;
            let Some(next_upper) = continuation(&page, OrderIndex::Descending)? else {
                staged.extend(page.items);
                break;
            };
            staged.extend(page.items);
            upper = next_upper;
        }
        Ok(staged)
    }

    /// Fetch `[lower, upper]` oldest first, following partial pages upward.
    async fn fetch_ascending(
        &self,
        mut lower: Tick,
        upper: Tick,
        timeout: Duration,
    ) -> FeedResult<Vec<Notification>> {
        let mut staged = Vec::new();
        while lower <= upper {
            let query = RangeQuery::ascending(lower, upper, self.config.page_limit);
            let page = self.query(&query, timeout).await?;
            let Some(next_lower) = continuation(&page, OrderIndex::Ascending)? else {
                staged.extend(page.items);
                break;
            };
            staged.extend(page.items);
            lower = next_lower;
        }
        Ok(staged)
    }

    async fn query(&self, query: &RangeQuery, timeout: Duration) -> FeedResult<RangePage> {
        self.store_queries.fetch_add(1, Ordering::Relaxed);
        match tokio::time::timeout(timeout, self.store.query_range(query)).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout {
                elapsed_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }
            .into()),
        }
    }

    fn assemble(&self, cache: &TickCache, earliest_tick: Tick) -> ReadBatch {
        let mut items = Vec::new();
        let mut total: u64 = 0;
        for (tick, notification) in cache.iter_from(earliest_tick) {
            total += notification.payload_len() as u64;
            if total >= self.config.max_result_bytes {
                return ReadBatch {
                    items,
                    state: ReadState::Partial { resume_from: *tick },
                    stopped_at_topic: Some(notification.topic_id.clone()),
                };
            }
            items.push(notification.clone());
        }
        ReadBatch {
            items,
            state: ReadState::Complete,
            stopped_at_topic: None,
        }
    }
}

/// Next bound to query after `page`, or `None` when the scan is finished.
fn continuation(page: &RangePage, index: OrderIndex) -> FeedResult<Option<Tick>> {
    if !page.is_partial() {
        return Ok(None);
    }
    let Some(last) = page.items.last() else {
        return Err(StorageError::StalledScan {
            index: index.name().to_string(),
        }
        .into());
    };
    let next = match index {
        OrderIndex::Descending => last.create_tick.checked_sub(1),
        OrderIndex::Ascending | OrderIndex::Topic => last.create_tick.checked_add(1),
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::IndexedRecord;
    use crate::range_store::InMemoryRangeStore;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tidings_core::{FixedClock, ManualClock};

    const NOW: Tick = 1_000;

    /// Wraps the in-memory store, recording queries and failing on demand.
    struct RecordingStore {
        inner: InMemoryRangeStore,
        queries: StdMutex<Vec<RangeQuery>>,
        fail_on_call: StdMutex<Option<(usize, u16)>>,
        delay: Option<Duration>,
    }

    impl RecordingStore {
        fn new(clock: Arc<dyn Clock>) -> Self {
            Self {
                inner: InMemoryRangeStore::new(clock),
                queries: StdMutex::new(Vec::new()),
                fail_on_call: StdMutex::new(None),
                delay: None,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Fail the `call`-th query (0-based, counted from now) with `status`.
        fn fail_on(&self, call: usize, status: u16) {
            let seen = self.queries.lock().unwrap().len();
            *self.fail_on_call.lock().unwrap() = Some((seen + call, status));
        }

        fn query_count(&self) -> usize {
            self.queries.lock().unwrap().len()
        }

        fn indexes(&self) -> Vec<OrderIndex> {
            self.queries.lock().unwrap().iter().map(|q| q.index).collect()
        }

        async fn seed(&self, notes: &[(Tick, usize)]) {
            for (tick, len) in notes {
                let n = Notification::new("orders", *tick, "x".repeat(*len));
                self.inner
                    .put(IndexedRecord::seal(n, 3600).unwrap())
                    .await
                    .unwrap();
            }
        }
    }

    #[async_trait]
    impl RangeStore for RecordingStore {
        async fn query_range(&self, query: &RangeQuery) -> FeedResult<RangePage> {
            let call = {
                let mut queries = self.queries.lock().unwrap();
                queries.push(query.clone());
                queries.len() - 1
            };
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let failing = *self.fail_on_call.lock().unwrap();
            if let Some((fail_call, status)) = failing {
                if fail_call == call {
                    return Err(StorageError::Status {
                        status,
                        reason: "injected".to_string(),
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

    fn config(max_result_bytes: u64) -> ReaderConfig {
        ReaderConfig {
            max_cache_bytes: 1024 * 1024,
            max_result_bytes,
            query_timeout: Duration::from_secs(1),
            page_limit: 100,
        }
    }

    fn reader(store: Arc<RecordingStore>, config: ReaderConfig) -> RangeMergeReader {
        RangeMergeReader::new("acme", store, Arc::new(FixedClock(NOW)), config)
    }

    fn ticks(batch: &ReadBatch) -> Vec<Tick> {
        batch.items.iter().map(|n| n.create_tick).collect()
    }

    async fn three_note_store() -> Arc<RecordingStore> {
        let store = Arc::new(RecordingStore::new(Arc::new(FixedClock(NOW))));
        store.seed(&[(100, 10), (200, 10), (300, 10)]).await;
        store
    }

    #[tokio::test]
    async fn test_cold_read_returns_window() {
        let store = three_note_store().await;
        let reader = reader(store, config(1000));

        let batch = reader.read_latest(150).await.unwrap();
        assert_eq!(ticks(&batch), vec![200, 300]);
        assert!(batch.is_complete());
    }

    #[tokio::test]
    async fn test_result_ceiling_yields_partial_prefix() {
        let store = three_note_store().await;
        let reader = reader(store, config(15));

        let batch = reader.read_latest(100).await.unwrap();
        assert_eq!(ticks(&batch), vec![100]);
        assert_eq!(batch.state, ReadState::Partial { resume_from: 200 });

        let batch = reader.read_latest(batch.resume_tick().unwrap()).await.unwrap();
        assert_eq!(ticks(&batch), vec![200]);
        assert_eq!(batch.resume_tick(), Some(300));
    }

    #[tokio::test]
    async fn test_ceiling_is_exclusive() {
        let store = three_note_store().await;
        let reader = reader(store, config(20));

        // 10 + 10 meets the ceiling, so only the first item fits.
        let batch = reader.read_latest(100).await.unwrap();
        assert_eq!(ticks(&batch), vec![100]);
        assert!(!batch.is_complete());
    }

    #[tokio::test]
    async fn test_warm_read_only_forward_fills() {
        let store = three_note_store().await;
        let reader = reader(store.clone(), config(1000));

        reader.read_latest(100).await.unwrap();
        let before = store.query_count();

        let batch = reader.read_latest(100).await.unwrap();
        assert_eq!(ticks(&batch), vec![100, 200, 300]);
        assert_eq!(store.query_count(), before + 1);
        assert_eq!(store.indexes().last(), Some(&OrderIndex::Descending));
    }

    #[tokio::test]
    async fn test_late_record_behind_latest_is_picked_up() {
        let store = Arc::new(RecordingStore::new(Arc::new(FixedClock(NOW))));
        store.seed(&[(100, 10), (300, 10)]).await;
        let reader = reader(store.clone(), config(1000));
        reader.read_latest(100).await.unwrap();
        assert_eq!(reader.cached_span().await, Some((100, 300)));

        // Stamped before 300 but written after it was cached.
        store.seed(&[(250, 10)]).await;
        let batch = reader.read_latest(100).await.unwrap();
        assert_eq!(ticks(&batch), vec![100, 250, 300]);
        assert!(batch.is_complete());
        assert_eq!(reader.stats().await.cache.entry_count, 3);
    }

    #[tokio::test]
    async fn test_partial_batch_reports_stopping_topic() {
        let store = three_note_store().await;
        let reader = reader(store, config(15));

        let batch = reader.read_latest(100).await.unwrap();
        assert_eq!(batch.stopped_at_topic.as_deref(), Some("orders"));

        let reader_all = RangeMergeReader::new(
            "acme",
            three_note_store().await,
            Arc::new(FixedClock(NOW)),
            config(1000),
        );
        let batch = reader_all.read_latest(100).await.unwrap();
        assert_eq!(batch.stopped_at_topic, None);
    }

    #[tokio::test]
    async fn test_new_records_are_picked_up() {
        let store = three_note_store().await;
        let reader = reader(store.clone(), config(1000));
        reader.read_latest(100).await.unwrap();

        store.seed(&[(400, 10)]).await;
        let batch = reader.read_latest(250).await.unwrap();
        assert_eq!(ticks(&batch), vec![300, 400]);
    }

    #[tokio::test]
    async fn test_backward_fill_extends_cache_downward() {
        let store = three_note_store().await;
        let reader = reader(store.clone(), config(1000));

        reader.read_latest(250).await.unwrap();
        assert_eq!(reader.cached_span().await, Some((300, 300)));

        let batch = reader.read_latest(50).await.unwrap();
        assert_eq!(ticks(&batch), vec![100, 200, 300]);
        assert_eq!(store.indexes().last(), Some(&OrderIndex::Ascending));
        assert_eq!(reader.cached_span().await, Some((100, 300)));
    }

    #[tokio::test]
    async fn test_partial_store_pages_are_followed() {
        let store = Arc::new(RecordingStore::new(Arc::new(FixedClock(NOW))));
        let notes: Vec<(Tick, usize)> = (1..=25).map(|t| (t * 10, 1)).collect();
        store.seed(&notes).await;

        let mut cfg = config(1000);
        cfg.page_limit = 4;
        let reader = reader(store.clone(), cfg);

        // Warm the top of the window first so the backward fill pages too.
        reader.read_latest(200).await.unwrap();
        let batch = reader.read_latest(0).await.unwrap();

        let expected: Vec<Tick> = (1..=25).map(|t| t * 10).collect();
        assert_eq!(ticks(&batch), expected);
        assert!(batch.is_complete());
        assert!(store.indexes().contains(&OrderIndex::Ascending));
    }

    #[tokio::test]
    async fn test_forward_fill_failure_clears_cache() {
        let store = three_note_store().await;
        let reader = reader(store.clone(), config(1000));
        reader.read_latest(100).await.unwrap();
        assert!(reader.cached_span().await.is_some());

        store.fail_on(0, 503);
        let err = reader.read_latest(100).await.unwrap_err();
        assert_eq!(
            err,
            FeedError::Storage(StorageError::Status {
                status: 503,
                reason: "injected".to_string()
            })
        );
        assert_eq!(reader.cached_span().await, None);
        assert_eq!(reader.stats().await.cache.tracked_bytes, 0);
    }

    #[tokio::test]
    async fn test_backward_fill_failure_clears_cache() {
        let store = three_note_store().await;
        let reader = reader(store.clone(), config(1000));
        reader.read_latest(250).await.unwrap();

        // Call 0 is the forward fill, call 1 the backward fill.
        store.fail_on(1, 500);
        let err = reader.read_latest(50).await.unwrap_err();
        assert!(matches!(
            err,
            FeedError::Storage(StorageError::Status { status: 500, .. })
        ));
        assert_eq!(reader.cached_span().await, None);

        // The next call rebuilds the cache read-through.
        let batch = reader.read_latest(50).await.unwrap();
        assert_eq!(ticks(&batch), vec![100, 200, 300]);
    }

    #[tokio::test]
    async fn test_eviction_keeps_cache_under_budget() {
        let store = Arc::new(RecordingStore::new(Arc::new(FixedClock(NOW))));
        let notes: Vec<(Tick, usize)> = (1..=10).map(|t| (t * 10, 50)).collect();
        store.seed(&notes).await;

        let mut cfg = config(10_000);
        cfg.max_cache_bytes = 3 * 200;
        let reader = reader(store, cfg);

        let batch = reader.read_latest(0).await.unwrap();
        // The response is assembled before eviction trims the cache.
        assert_eq!(batch.items.len(), 10);

        let stats = reader.stats().await;
        assert!(stats.cache.tracked_bytes <= 600);
        assert_eq!(stats.cache.entry_count, 3);
        assert_eq!(reader.cached_span().await, Some((80, 100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_leaves_cache_untouched() {
        let clock = Arc::new(ManualClock::new(NOW));
        let store = Arc::new(RecordingStore::new(clock.clone()).with_delay(Duration::from_millis(50)));
        store.seed(&[(100, 10), (200, 10)]).await;
        let reader = RangeMergeReader::new("acme", store.clone(), clock.clone(), config(1000));

        reader.read_latest(100).await.unwrap();
        let span = reader.cached_span().await;

        store.seed(&[(300, 10)]).await;
        let err = reader
            .read_latest_with_timeout(100, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Storage(StorageError::Timeout { .. })));
        assert_eq!(reader.cached_span().await, span);
        assert_eq!(reader.stats().await.cache.flushes, 0);
    }

    #[tokio::test]
    async fn test_stalled_partial_page_is_an_error() {
        struct StalledStore;

        #[async_trait]
        impl RangeStore for StalledStore {
            async fn query_range(&self, _query: &RangeQuery) -> FeedResult<RangePage> {
                Ok(RangePage::partial(Vec::new()))
            }

            async fn put(&self, _record: IndexedRecord) -> FeedResult<()> {
                Ok(())
            }
        }

        let reader = RangeMergeReader::new(
            "acme",
            Arc::new(StalledStore),
            Arc::new(FixedClock(NOW)),
            config(1000),
        );
        let err = reader.read_latest(0).await.unwrap_err();
        assert!(matches!(err, FeedError::Storage(StorageError::StalledScan { .. })));
    }

    #[tokio::test]
    async fn test_window_in_future_queries_nothing() {
        let store = three_note_store().await;
        let reader = reader(store.clone(), config(1000));

        let batch = reader.read_latest(NOW + 1).await.unwrap();
        assert!(batch.items.is_empty());
        assert!(batch.is_complete());
        assert_eq!(store.query_count(), 0);
    }
}
