//! Subscription store contract and in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tidings_core::{FeedResult, RecordId, StorageError, Subscription, Tick};

/// Keyed access to subscription records within one scope.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Read a subscription by id.
    async fn read(&self, id: RecordId) -> FeedResult<Option<Subscription>>;

    /// Create or replace a subscription.
    async fn put(&self, subscription: Subscription) -> FeedResult<()>;

    /// Subscriptions created at or after `tick`, oldest first.
    async fn list_since(&self, tick: Tick) -> FeedResult<Vec<Subscription>>;
}

/// In-memory subscription store.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: RwLock<HashMap<RecordId, Subscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn read(&self, id: RecordId) -> FeedResult<Option<Subscription>> {
        let subscriptions = self
            .subscriptions
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(subscriptions.get(&id).cloned())
    }

    async fn put(&self, subscription: Subscription) -> FeedResult<()> {
        let mut subscriptions = self
            .subscriptions
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        subscriptions.insert(subscription.id, subscription);
        Ok(())
    }

    async fn list_since(&self, tick: Tick) -> FeedResult<Vec<Subscription>> {
        let subscriptions = self
            .subscriptions
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let mut found: Vec<Subscription> = subscriptions
            .values()
            .filter(|s| s.create_tick >= tick)
            .cloned()
            .collect();
        found.sort_by_key(|s| (s.create_tick, s.id));
        Ok(found)
    }
}
