//! Notification feed records

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identity::{new_record_id, RecordId, Tick};

/// A write-once notification published to a topic.
///
/// `create_tick` is unique within the notification partition and doubles as
/// the cache key on the read path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: RecordId,
    pub topic_id: String,
    pub create_tick: Tick,
    /// Opaque payload, usually a serialized change description.
    pub payload: String,
}

impl Notification {
    /// Create a notification with a fresh id.
    pub fn new(topic_id: impl Into<String>, create_tick: Tick, payload: impl Into<String>) -> Self {
        Self {
            id: new_record_id(),
            topic_id: topic_id.into(),
            create_tick,
            payload: payload.into(),
        }
    }

    /// Payload size in bytes.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// A user's subscription to a set of topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: RecordId,
    pub owner_user_id: String,
    pub topic_ids: BTreeSet<String>,
    pub create_tick: Tick,
}

impl Subscription {
    pub fn new<I, S>(owner_user_id: impl Into<String>, topic_ids: I, create_tick: Tick) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: new_record_id(),
            owner_user_id: owner_user_id.into(),
            topic_ids: topic_ids.into_iter().map(Into::into).collect(),
            create_tick,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_user_id == user_id
    }

    pub fn covers(&self, topic_id: &str) -> bool {
        self.topic_ids.contains(topic_id)
    }
}

/// One page of notifications returned to a subscriber.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPage {
    #[serde(rename = "notifications")]
    pub items: Vec<Notification>,
    /// More notifications are available; call again from the tick after the
    /// last item in this page.
    pub more: bool,
}

impl NotificationPage {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Tick to resume from on the next call, if this page has items.
    pub fn next_tick(&self) -> Option<Tick> {
        self.items.last().map(|n| n.create_tick + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_ownership_and_topics() {
        let sub = Subscription::new("user-1", ["orders", "invoices"], 10);
        assert!(sub.is_owned_by("user-1"));
        assert!(!sub.is_owned_by("user-2"));
        assert!(sub.covers("orders"));
        assert!(!sub.covers("shipping"));
    }

    #[test]
    fn test_page_wire_format() {
        let page = NotificationPage {
            items: vec![Notification::new("orders", 100, "{}")],
            more: true,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["more"], true);
        assert_eq!(json["notifications"][0]["topicId"], "orders");
        assert_eq!(json["notifications"][0]["createTick"], 100);
    }

    #[test]
    fn test_next_tick() {
        assert_eq!(NotificationPage::empty().next_tick(), None);
        let page = NotificationPage {
            items: vec![Notification::new("a", 5, ""), Notification::new("a", 9, "")],
            more: false,
        };
        assert_eq!(page.next_tick(), Some(10));
    }
}
