//! In-process fan-out of registry events.
//!
//! Backed by a bounded tokio broadcast channel. When a subscriber falls
//! behind, the oldest events are dropped for that subscriber only and the
//! loss is counted on its [`EventSubscription`].

use super::events::{ContractEvent, EventKind};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

#[derive(Clone)]
pub struct RegistryEventBus {
    tx: broadcast::Sender<ContractEvent>,
}

impl RegistryEventBus {
    /// # Arguments
    /// * `capacity` - Events buffered per subscriber before the oldest drop
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to every subscriber.
    ///
    /// # Returns
    /// Number of subscribers the event was queued for
    pub fn publish(&self, event: ContractEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            rx: self.tx.subscribe(),
            kinds: None,
            dropped: 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for RegistryEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

pub struct EventSubscription {
    rx: broadcast::Receiver<ContractEvent>,
    kinds: Option<Vec<EventKind>>,
    dropped: u64,
}

impl EventSubscription {
    /// Only deliver events of the given kinds.
    pub fn only(mut self, kinds: &[EventKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    fn accepts(&self, event: &ContractEvent) -> bool {
        self.kinds
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&event.kind()))
    }

    /// Next matching event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ContractEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    self.dropped += missed;
                    warn!(missed, "event subscriber lagged; oldest events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<ContractEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(missed)) => {
                    self.dropped += missed;
                    warn!(missed, "event subscriber lagged; oldest events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Events this subscriber lost to overflow so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_chain::RegistryEvent;
    use crate::core_model::TopicId;

    fn topic_added(n: u64) -> ContractEvent {
        ContractEvent {
            block_number: n,
            block_hash: format!("0x{n:064x}"),
            transaction_hash: format!("0x{n:064x}"),
            event: RegistryEvent::ClaimTopicAdded { topic: TopicId(n) },
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = RegistryEventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.publish(topic_added(1)), 2);
        assert_eq!(a.recv().await, Some(topic_added(1)));
        assert_eq!(b.recv().await, Some(topic_added(1)));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = RegistryEventBus::new(8);
        assert_eq!(bus.publish(topic_added(1)), 0);
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest_and_counts() {
        let bus = RegistryEventBus::new(2);
        let mut sub = bus.subscribe();
        for n in 1..=5 {
            bus.publish(topic_added(n));
        }

        assert_eq!(sub.recv().await, Some(topic_added(4)));
        assert_eq!(sub.recv().await, Some(topic_added(5)));
        assert_eq!(sub.dropped(), 3);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_kind_filter() {
        let bus = RegistryEventBus::new(8);
        let mut sub = bus.subscribe().only(&[EventKind::ClaimTopicRemoved]);
        bus.publish(topic_added(1));
        bus.publish(ContractEvent {
            event: RegistryEvent::ClaimTopicRemoved { topic: TopicId(1) },
            ..topic_added(2)
        });

        let got = sub.recv().await.unwrap();
        assert_eq!(got.kind(), EventKind::ClaimTopicRemoved);
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_bus_dropped() {
        let bus = RegistryEventBus::new(2);
        let mut sub = bus.subscribe();
        drop(bus);
        assert!(sub.recv().await.is_none());
    }
}
