//! Leaderboard fan-out to live-update subscribers.
//!
//! [`SubscriberRegistry`] tracks the set of currently-open WebSocket
//! subscribers and pushes snapshots to all of them. Each subscriber holds the
//! receiving half of an unbounded channel; the registry keeps the sending
//! half keyed by a generated subscriber id.
//!
//! Delivery is fire-and-forget and at-most-once: a broadcast snapshots the
//! registry membership first (so concurrent register/unregister cannot
//! corrupt the pass), attempts one send per subscriber, and prunes every
//! subscriber whose send failed. There is no retry and no replay; a dropped
//! subscriber must re-subscribe to resume receiving updates.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::types::Snapshot;

/// Identifier assigned to a subscriber for the lifetime of its connection.
pub type SubscriberId = Uuid;

/// Registry of live leaderboard subscribers.
///
/// Cloning is cheap: all clones share the same membership.
#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
    subscribers: Arc<RwLock<HashMap<SubscriberId, UnboundedSender<Snapshot>>>>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber and queues `initial` as its first message.
    ///
    /// The initial snapshot is delivered before the subscriber can observe
    /// any broadcast, so a fresh connection always sees current state exactly
    /// once before the first mutation-triggered update.
    pub async fn register(&self, initial: Snapshot) -> (SubscriberId, UnboundedReceiver<Snapshot>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive by construction, so this send cannot fail.
        let _ = tx.send(initial);
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, tx);
        debug!(subscriber_id = %id, subscriber_count = subscribers.len(), "Subscriber registered");
        (id, rx)
    }

    /// Removes a subscriber. A no-op when the id is absent, so the
    /// disconnect path and broadcast pruning can both call it safely.
    pub async fn unregister(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(&id).is_some() {
            debug!(subscriber_id = %id, subscriber_count = subscribers.len(), "Subscriber unregistered");
        }
    }

    /// Pushes a snapshot to every registered subscriber.
    ///
    /// Membership is copied up front; register/unregister calls that land
    /// during the pass affect later broadcasts only. Subscribers whose send
    /// fails (receiver dropped) are unregistered after the pass. Returns the
    /// number of successful deliveries.
    pub async fn broadcast(&self, snapshot: Snapshot) -> usize {
        let members: Vec<(SubscriberId, UnboundedSender<Snapshot>)> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, tx) in &members {
            if tx.send(snapshot.clone()).is_ok() {
                delivered += 1;
            } else {
                trace!(subscriber_id = %id, "Delivery failed, marking for removal");
                dead.push(*id);
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in &dead {
                subscribers.remove(id);
            }
            debug!(
                pruned = dead.len(),
                subscriber_count = subscribers.len(),
                "Pruned dead subscribers"
            );
        }

        trace!(delivered, "Snapshot broadcast");
        delivered
    }

    /// Current number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}
