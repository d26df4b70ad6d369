//! Notification service: the subscription-facing feed operations.
//!
//! [`NotificationService::list_for_subscription`] is the read path. It gates
//! the resume tick on the retention window, resolves the caller's scope and
//! subscription, then drives that scope's range-merge reader until the reader
//! reports completion or the page budget is spent, keeping only notifications
//! on the subscription's topics.

use std::collections::BTreeSet;
use std::sync::Arc;

use tidings_core::{
    CallerContext, Clock, FeedConfig, FeedError, FeedResult, Notification,
    NotificationPage, RecordId, Subscription, Tick, ValidationError,
};
use tidings_storage::{IndexedRecord, ReadState};

use crate::age_gate::AgeGate;
use crate::permissions::FeedOperation;
use crate::scope::{FeedScope, ScopeRegistry};

/// Feed operations over every registered scope.
pub struct NotificationService {
    registry: Arc<ScopeRegistry>,
    clock: Arc<dyn Clock>,
    config: FeedConfig,
    age_gate: AgeGate,
}

impl NotificationService {
    pub fn new(registry: Arc<ScopeRegistry>, clock: Arc<dyn Clock>, config: FeedConfig) -> Self {
        let age_gate = AgeGate::new(config.max_age_secs);
        Self {
            registry,
            clock,
            config,
            age_gate,
        }
    }

    pub fn registry(&self) -> &Arc<ScopeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Notifications on the subscription's topics with `tick >= since`.
    ///
    /// An unknown subscription, one owned by someone else, or one with no
    /// topics yields an empty page rather than an error.
    pub async fn list_for_subscription(
        &self,
        caller: &CallerContext,
        subscription_id: RecordId,
        since: Tick,
    ) -> FeedResult<NotificationPage> {
        self.age_gate.check(since, self.clock.now_tick())?;

        let scope = self.scope_for(caller, FeedOperation::ListNotifications)?;
        let Some(subscription) = scope.subscriptions().read(subscription_id).await? else {
            tracing::debug!(%subscription_id, scope = %scope.name(), "Subscription not found");
            return Ok(NotificationPage::empty());
        };
        if !subscription.is_owned_by(&caller.user_id) {
            tracing::debug!(
                %subscription_id,
                user_id = %caller.user_id,
                "Subscription owned by another user"
            );
            return Ok(NotificationPage::empty());
        }
        if subscription.topic_ids.is_empty() {
            return Ok(NotificationPage::empty());
        }

        let page = self
            .collect_page(&scope, &subscription.topic_ids, since)
            .await?;
        tracing::info!(
            %subscription_id,
            scope = %scope.name(),
            since,
            returned = page.items.len(),
            more = page.more,
            "Listed notifications"
        );
        Ok(page)
    }

    /// Subscriptions in the caller's scope created at or after `since`.
    pub async fn list_subscriptions_since(
        &self,
        caller: &CallerContext,
        since: Tick,
    ) -> FeedResult<Vec<Subscription>> {
        let scope = self.scope_for(caller, FeedOperation::ListSubscriptions)?;
        scope.subscriptions().list_since(since).await
    }

    /// Create a subscription owned by the caller.
    pub async fn create_subscription<I, S>(
        &self,
        caller: &CallerContext,
        topic_ids: I,
    ) -> FeedResult<Subscription>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scope = self.scope_for(caller, FeedOperation::CreateSubscription)?;
        let subscription =
            Subscription::new(caller.user_id.clone(), topic_ids, self.clock.now_tick());
        if subscription.topic_ids.iter().any(|t| t.is_empty()) {
            return Err(ValidationError::InvalidValue {
                field: "topic_ids".to_string(),
                reason: "topic ids must not be empty".to_string(),
            }
            .into());
        }
        scope.subscriptions().put(subscription.clone()).await?;
        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %caller.user_id,
            topics = subscription.topic_ids.len(),
            "Created subscription"
        );
        Ok(subscription)
    }

    /// Publish a notification to `topic_id` in the caller's scope.
    pub async fn publish(
        &self,
        caller: &CallerContext,
        topic_id: &str,
        payload: impl Into<String>,
    ) -> FeedResult<Notification> {
        if topic_id.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "topic_id".to_string(),
            }
            .into());
        }
        let scope = self.scope_for(caller, FeedOperation::Publish)?;
        let tick = scope.next_publish_tick(self.clock.now_tick());
        let notification = Notification::new(topic_id, tick, payload);

        let record = IndexedRecord::seal(notification.clone(), self.config.record_ttl_secs)?;
        scope.store().put(record).await?;
        tracing::debug!(
            scope = %scope.name(),
            topic_id,
            tick,
            bytes = notification.payload_len(),
            "Published notification"
        );
        Ok(notification)
    }

    fn scope_for(
        &self,
        caller: &CallerContext,
        operation: FeedOperation,
    ) -> FeedResult<Arc<FeedScope>> {
        let scope = self.registry.resolve(&caller.scope)?;
        scope.permissions().check(caller, operation)?;
        Ok(scope)
    }

    async fn collect_page(
        &self,
        scope: &FeedScope,
        topics: &BTreeSet<String>,
        since: Tick,
    ) -> FeedResult<NotificationPage> {
        let limit = self.config.max_result_bytes;
        let mut page = NotificationPage::empty();
        let mut page_bytes: u64 = 0;
        let mut cursor = since;

        loop {
            let batch = scope.reader().read_latest(cursor).await?;
            let stalled = batch.items.is_empty();

            for notification in batch.items {
                if !topics.contains(&notification.topic_id) {
                    continue;
                }
                let size = notification.payload_len() as u64;
                if page_bytes + size >= limit {
                    page.more = true;
                    return Ok(page);
                }
                page_bytes += size;
                page.items.push(notification);
            }

            let ReadState::Partial { resume_from } = batch.state else {
                return Ok(page);
            };
            if !stalled {
                cursor = resume_from;
                continue;
            }

            // The record at `resume_from` alone meets the ceiling.
            let followed = batch
                .stopped_at_topic
                .as_deref()
                .map_or(true, |topic| topics.contains(topic));
            if !followed {
                tracing::debug!(
                    scope = %scope.name(),
                    tick = resume_from,
                    "Skipping oversized notification on an unfollowed topic"
                );
                cursor = resume_from.saturating_add(1);
                continue;
            }
            if page.items.is_empty() {
                return Err(FeedError::RecordTooLarge {
                    tick: resume_from,
                    limit,
                });
            }
            page.more = true;
            return Ok(page);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidings_core::{AccessError, ManualClock, TICKS_PER_SECOND};
    use tidings_storage::{InMemoryRangeStore, InMemorySubscriptionStore};

    const START: Tick = 10_000 * TICKS_PER_SECOND;

    struct Harness {
        service: NotificationService,
        clock: Arc<ManualClock>,
        caller: CallerContext,
    }

    fn harness(config: FeedConfig) -> Harness {
        let clock = Arc::new(ManualClock::new(START));
        let registry = Arc::new(ScopeRegistry::new());
        registry
            .register(FeedScope::new(
                "acme",
                Arc::new(InMemoryRangeStore::new(clock.clone())),
                Arc::new(InMemorySubscriptionStore::new()),
                clock.clone(),
                &config,
            ))
            .unwrap();
        let caller = CallerContext::new("alice", "acme").with_permissions(
            FeedOperation::ALL.map(|op| op.default_permission()),
        );
        Harness {
            service: NotificationService::new(registry, clock.clone(), config),
            clock,
            caller,
        }
    }

    #[tokio::test]
    async fn test_publish_then_list() {
        let h = harness(FeedConfig::default());
        let sub = h
            .service
            .create_subscription(&h.caller, ["orders"])
            .await
            .unwrap();

        h.service.publish(&h.caller, "orders", "o-1").await.unwrap();
        h.clock.advance(1);
        h.service.publish(&h.caller, "invoices", "i-1").await.unwrap();
        h.clock.advance(1);
        h.service.publish(&h.caller, "orders", "o-2").await.unwrap();

        let page = h
            .service
            .list_for_subscription(&h.caller, sub.id, START)
            .await
            .unwrap();
        let payloads: Vec<&str> = page.items.iter().map(|n| n.payload.as_str()).collect();
        assert_eq!(payloads, vec!["o-1", "o-2"]);
        assert!(!page.more);
    }

    #[tokio::test]
    async fn test_foreign_subscription_is_empty_page() {
        let h = harness(FeedConfig::default());
        let sub = h
            .service
            .create_subscription(&h.caller, ["orders"])
            .await
            .unwrap();
        h.service.publish(&h.caller, "orders", "secret").await.unwrap();

        let mallory = CallerContext::new("mallory", "acme").with_permissions(["notifications:read"]);
        let page = h
            .service
            .list_for_subscription(&mallory, sub.id, START)
            .await
            .unwrap();
        assert_eq!(page, NotificationPage::empty());
    }

    #[tokio::test]
    async fn test_missing_subscription_is_empty_page() {
        let h = harness(FeedConfig::default());
        let page = h
            .service
            .list_for_subscription(&h.caller, tidings_core::new_record_id(), START)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.more);
    }

    #[tokio::test]
    async fn test_expired_since_is_rejected() {
        let h = harness(FeedConfig::default().with_max_age_secs(60));
        let sub = h
            .service
            .create_subscription(&h.caller, ["orders"])
            .await
            .unwrap();

        let err = h
            .service
            .list_for_subscription(&h.caller, sub.id, START - 61 * TICKS_PER_SECOND)
            .await
            .unwrap_err();
        assert!(err.is_expired());
    }

    #[tokio::test]
    async fn test_page_budget_sets_more() {
        let h = harness(FeedConfig::default().with_max_result_bytes(25));
        let sub = h
            .service
            .create_subscription(&h.caller, ["orders"])
            .await
            .unwrap();
        for _ in 0..4 {
            h.service
                .publish(&h.caller, "orders", "x".repeat(10))
                .await
                .unwrap();
            h.clock.advance(1);
        }

        let page = h
            .service
            .list_for_subscription(&h.caller, sub.id, START)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.more);

        let next = page.next_tick().unwrap();
        let rest = h
            .service
            .list_for_subscription(&h.caller, sub.id, next)
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 2);
        assert!(!rest.more);
    }

    #[tokio::test]
    async fn test_oversized_record_is_reported() {
        let h = harness(FeedConfig::default().with_max_result_bytes(8));
        let sub = h
            .service
            .create_subscription(&h.caller, ["orders"])
            .await
            .unwrap();
        h.service
            .publish(&h.caller, "orders", "far too large")
            .await
            .unwrap();

        let err = h
            .service
            .list_for_subscription(&h.caller, sub.id, START)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FeedError::RecordTooLarge {
                tick: START,
                limit: 8
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_scope() {
        let h = harness(FeedConfig::default());
        let stranger = CallerContext::new("alice", "globex");
        let err = h
            .service
            .list_subscriptions_since(&stranger, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Access(AccessError::UnknownScope { .. })));
    }

    #[tokio::test]
    async fn test_publish_requires_permission() {
        let h = harness(FeedConfig::default());
        let reader_only = CallerContext::new("bob", "acme").with_permissions(["notifications:read"]);
        let err = h
            .service
            .publish(&reader_only, "orders", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Access(AccessError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_list_subscriptions_since() {
        let h = harness(FeedConfig::default());
        h.service.create_subscription(&h.caller, ["a"]).await.unwrap();
        h.clock.advance_secs(5);
        let later = h.service.create_subscription(&h.caller, ["b"]).await.unwrap();

        let found = h
            .service
            .list_subscriptions_since(&h.caller, START + 1)
            .await
            .unwrap();
        assert_eq!(found, vec![later]);
    }
}
