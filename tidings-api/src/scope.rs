//! Tenant scopes and the registry that resolves callers to them.
//!
//! A [`FeedScope`] bundles everything one tenant's feed needs: its range
//! store, its subscription store, the range-merge reader (and therefore the
//! cache) reading that store, and the permission table. Scopes are built once
//! and registered explicitly; nothing is created on first use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use tidings_core::{AccessError, Clock, FeedConfig, FeedResult, StorageError, Tick};
use tidings_storage::{RangeMergeReader, RangeStore, ReaderConfig, SubscriptionStore};

use crate::permissions::PermissionTable;

/// One tenant's stores, reader and permission table.
pub struct FeedScope {
    name: String,
    store: Arc<dyn RangeStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    reader: RangeMergeReader,
    permissions: PermissionTable,
    last_published: AtomicI64,
}

impl FeedScope {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn RangeStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        clock: Arc<dyn Clock>,
        config: &FeedConfig,
    ) -> Self {
        let name = name.into();
        let reader = RangeMergeReader::new(
            name.clone(),
            store.clone(),
            clock,
            ReaderConfig::from(config),
        );
        Self {
            name,
            store,
            subscriptions,
            reader,
            permissions: PermissionTable::default(),
            last_published: AtomicI64::new(Tick::MIN),
        }
    }

    pub fn with_permissions(mut self, permissions: PermissionTable) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<dyn RangeStore> {
        &self.store
    }

    pub fn subscriptions(&self) -> &Arc<dyn SubscriptionStore> {
        &self.subscriptions
    }

    pub fn reader(&self) -> &RangeMergeReader {
        &self.reader
    }

    pub fn permissions(&self) -> &PermissionTable {
        &self.permissions
    }

    /// Next publish tick: `now`, or one past the previous publish if the
    /// clock has not moved since.
    pub(crate) fn next_publish_tick(&self, now: Tick) -> Tick {
        let previous = self
            .last_published
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or(now);
        now.max(previous.saturating_add(1))
    }
}

/// Registered scopes, keyed by name.
#[derive(Default)]
pub struct ScopeRegistry {
    scopes: RwLock<HashMap<String, Arc<FeedScope>>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scope, replacing any previous scope of the same name.
    pub fn register(&self, scope: FeedScope) -> FeedResult<Arc<FeedScope>> {
        let scope = Arc::new(scope);
        let mut scopes = self.scopes.write().map_err(|_| StorageError::LockPoisoned)?;
        if scopes
            .insert(scope.name().to_string(), scope.clone())
            .is_some()
        {
            tracing::warn!(scope = %scope.name(), "Replaced registered scope");
        } else {
            tracing::info!(scope = %scope.name(), "Registered scope");
        }
        Ok(scope)
    }

    pub fn resolve(&self, name: &str) -> FeedResult<Arc<FeedScope>> {
        let scopes = self.scopes.read().map_err(|_| StorageError::LockPoisoned)?;
        scopes.get(name).cloned().ok_or_else(|| {
            AccessError::UnknownScope {
                scope: name.to_string(),
            }
            .into()
        })
    }

    pub fn names(&self) -> FeedResult<Vec<String>> {
        let scopes = self.scopes.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut names: Vec<String> = scopes.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
