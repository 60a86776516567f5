//! Fan-out of live fish events to tank observers.
//!
//! Every observer owns a bounded queue. Publishing is `try_send` only, so a
//! stalled observer never holds up a submission; instead it is dropped from
//! the registry and its stream ends.
//!
//! # Snapshot handshake
//!
//! A subscription is registered *before* its snapshot is read. Events carry
//! the store sequence they were produced at, and the subscription discards
//! anything at or below the snapshot watermark. Registering first means no
//! event can slip between snapshot and stream; the watermark filter means
//! nothing is delivered twice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use domains::{Fish, FishEvent, Sequenced, Snapshot};
use tokio::sync::mpsc::{self, error::TrySendError};

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

pub type SubscriptionId = u64;

type EventSender = mpsc::Sender<Sequenced<FishEvent>>;

struct Hub {
    subscribers: DashMap<SubscriptionId, EventSender>,
    next_id: AtomicU64,
    buffer: usize,
}

/// Owns the set of active subscriptions.
#[derive(Clone)]
pub struct Broadcaster {
    hub: Arc<Hub>,
}

impl Broadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            hub: Arc::new(Hub {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Registers a new observer. The returned subscription has no snapshot
    /// yet; see [`Subscription::attach_snapshot`].
    pub fn subscribe(&self) -> Subscription {
        let id = self.hub.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.hub.buffer);
        self.hub.subscribers.insert(id, tx);
        tracing::debug!(subscription = id, "observer subscribed");

        Subscription {
            id,
            watermark: 0,
            snapshot: None,
            events: rx,
            hub: Arc::downgrade(&self.hub),
            state: SubscriptionState::Connected,
        }
    }

    /// Delivers `event` to every live subscription without waiting.
    /// Returns how many observers accepted it.
    pub fn publish(&self, event: Sequenced<FishEvent>) -> usize {
        let mut delivered = 0;
        let mut dropped = Vec::new();

        for entry in self.hub.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscription = *entry.key(), "observer queue full, disconnecting");
                    dropped.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => dropped.push(*entry.key()),
            }
        }

        for id in dropped {
            self.unsubscribe(id);
        }
        delivered
    }

    /// Idempotent; unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.hub.subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!(subscription = id, "observer unsubscribed");
        }
        removed
    }

    pub fn observer_count(&self) -> usize {
        self.hub.subscribers.len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Registered, snapshot not captured yet
    Connected,
    /// Snapshot captured but not yet taken by the transport
    Snapshot,
    Live,
    /// Terminal
    Disconnected,
}

/// One observer's view: a snapshot followed by live events.
pub struct Subscription {
    id: SubscriptionId,
    watermark: u64,
    snapshot: Option<Vec<Fish>>,
    events: mpsc::Receiver<Sequenced<FishEvent>>,
    hub: Weak<Hub>,
    state: SubscriptionState,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    pub fn attach_snapshot(&mut self, snapshot: Snapshot) {
        if self.state != SubscriptionState::Connected {
            return;
        }
        self.watermark = snapshot.watermark;
        self.snapshot = Some(snapshot.items);
        self.state = SubscriptionState::Snapshot;
    }

    /// Hands the snapshot to the caller once; later calls return nothing.
    pub fn take_snapshot(&mut self) -> Vec<Fish> {
        if self.state == SubscriptionState::Snapshot {
            self.state = SubscriptionState::Live;
        }
        self.snapshot.take().unwrap_or_default()
    }

    /// Next live event newer than the snapshot, or `None` once disconnected.
    pub async fn next_event(&mut self) -> Option<FishEvent> {
        if self.state == SubscriptionState::Disconnected {
            return None;
        }
        while let Some(event) = self.events.recv().await {
            if event.seq > self.watermark {
                return Some(event.value);
            }
        }
        self.mark_disconnected();
        None
    }

    /// Safe to call repeatedly or after the broadcaster is gone.
    pub fn unsubscribe(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            if hub.subscribers.remove(&self.id).is_some() {
                tracing::debug!(subscription = self.id, "observer unsubscribed");
            }
        }
        self.mark_disconnected();
    }

    fn mark_disconnected(&mut self) {
        self.events.close();
        self.snapshot = None;
        self.state = SubscriptionState::Disconnected;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{FishId, RemovalReason};

    fn added(seq: u64, label: &str) -> Sequenced<FishEvent> {
        Sequenced {
            seq,
            value: FishEvent::ItemAdded {
                item: Fish {
                    id: FishId::generate(),
                    label: label.into(),
                    content: "x".into(),
                    confidence: 0.5,
                    created_at: Utc::now(),
                    report_count: 0,
                },
            },
        }
    }

    fn label_of(event: FishEvent) -> String {
        match event {
            FishEvent::ItemAdded { item } => item.label,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscription_walks_through_states() {
        let broadcaster = Broadcaster::default();
        let mut sub = broadcaster.subscribe();
        assert_eq!(sub.state(), SubscriptionState::Connected);

        sub.attach_snapshot(Snapshot { items: vec![], watermark: 4 });
        assert_eq!(sub.state(), SubscriptionState::Snapshot);

        assert!(sub.take_snapshot().is_empty());
        assert_eq!(sub.state(), SubscriptionState::Live);

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(sub.state(), SubscriptionState::Disconnected);
        assert_eq!(broadcaster.observer_count(), 0);
        assert!(sub.next_event().await.is_none());
    }

    #[tokio::test]
    async fn events_at_or_below_watermark_are_skipped() {
        let broadcaster = Broadcaster::default();
        let mut sub = broadcaster.subscribe();
        broadcaster.publish(added(3, "old"));
        broadcaster.publish(added(5, "seen"));
        broadcaster.publish(added(6, "new"));
        sub.attach_snapshot(Snapshot { items: vec![], watermark: 5 });
        sub.take_snapshot();

        assert_eq!(label_of(sub.next_event().await.unwrap()), "new");
    }

    #[tokio::test]
    async fn full_queue_drops_only_the_slow_observer() {
        let broadcaster = Broadcaster::new(1);
        let mut fast = broadcaster.subscribe();
        let _slow = broadcaster.subscribe();

        assert_eq!(broadcaster.publish(added(1, "a")), 2);
        assert_eq!(label_of(fast.next_event().await.unwrap()), "a");

        // slow never drains, so its single slot is still occupied
        assert_eq!(broadcaster.publish(added(2, "b")), 1);
        assert_eq!(broadcaster.observer_count(), 1);
        assert_eq!(label_of(fast.next_event().await.unwrap()), "b");
    }

    #[tokio::test]
    async fn dropped_subscription_is_unregistered() {
        let broadcaster = Broadcaster::default();
        let sub = broadcaster.subscribe();
        assert_eq!(broadcaster.observer_count(), 1);
        drop(sub);
        assert_eq!(broadcaster.observer_count(), 0);

        let removed = Sequenced {
            seq: 9,
            value: FishEvent::ItemRemoved {
                id: FishId::from("gone"),
                reason: RemovalReason::Expired,
            },
        };
        assert_eq!(broadcaster.publish(removed), 0);
    }
}
