//! Subscriber registry.
//!
//! Routes change notifications to every subscriber of their target. Each
//! subscriber owns an unbounded channel, so frames are handled on whichever
//! task holds the [`Subscription`]. Dropping a subscription unregisters it.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use stockroom_engine::{ChangeNotification, EntityKind};
use tokio::sync::mpsc;

/// Sender half held by the registry.
pub type NotificationSender = mpsc::UnboundedSender<ChangeNotification>;

#[derive(Debug)]
struct Subscriber {
    id: String,
    sender: NotificationSender,
}

/// Subscribers grouped by target.
///
/// Thread-safe and shared via `Arc` between the reader task and the tables.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    by_target: DashMap<EntityKind, Vec<Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            by_target: DashMap::new(),
        }
    }

    /// Create a new registry wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register interest in `target`.
    pub fn subscribe(self: &Arc<Self>, target: EntityKind) -> Subscription {
        let id = uuid::Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::unbounded_channel();

        self.by_target
            .entry(target)
            .or_default()
            .push(Subscriber {
                id: id.clone(),
                sender,
            });

        tracing::debug!(sub_id = %id, entity = %target, "Subscriber registered");

        Subscription {
            id,
            target,
            registry: Arc::downgrade(self),
            receiver,
        }
    }

    fn unsubscribe(&self, target: EntityKind, sub_id: &str) {
        if let Some(mut subs) = self.by_target.get_mut(&target) {
            subs.retain(|s| s.id != sub_id);
            if subs.is_empty() {
                drop(subs);
                self.by_target.remove(&target);
            }
            tracing::debug!(sub_id = %sub_id, entity = %target, "Subscriber removed");
        }
    }

    /// Deliver `notification` to every subscriber of its target.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, notification: &ChangeNotification) -> usize {
        let Some(mut subs) = self.by_target.get_mut(&notification.target) else {
            tracing::debug!(entity = %notification.target, "No subscribers, frame dropped");
            return 0;
        };

        // Closed receivers are pruned.
        subs.retain(|s| s.sender.send(notification.clone()).is_ok());
        let sent = subs.len();

        tracing::debug!(
            entity = %notification.target,
            action = ?notification.action,
            recipients = sent,
            "Published notification"
        );
        sent
    }

    /// Drop every subscriber. Their streams end.
    pub fn close_all(&self) {
        self.by_target.clear();
    }

    /// Total number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.by_target.iter().map(|e| e.value().len()).sum()
    }

    /// Number of targets with at least one subscriber.
    pub fn target_count(&self) -> usize {
        self.by_target.len()
    }
}

/// A stream of notifications for one target.
#[derive(Debug)]
pub struct Subscription {
    id: String,
    target: EntityKind,
    registry: Weak<SubscriberRegistry>,
    receiver: mpsc::UnboundedReceiver<ChangeNotification>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target(&self) -> EntityKind {
        self.target
    }

    /// Wait for the next notification. `None` once the channel has closed.
    pub async fn recv(&mut self) -> Option<ChangeNotification> {
        self.receiver.recv().await
    }

    /// Take a notification if one is already queued.
    pub fn try_recv(&mut self) -> Option<ChangeNotification> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.target, &self.id);
        }
    }
}
