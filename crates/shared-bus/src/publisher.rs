//! # Node Event Bus
//!
//! One broadcast channel shared by the chain and the transaction pool.
//! Filtering is left to the receiving side, so a publish reaches every live
//! subscription and the bus only keeps per-topic counters.

use crate::events::{EventFilter, EventTopic, NodeEvent};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Publishing side of the bus, as seen by the chain and the pools.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Returns how many subscriptions the event was delivered to.
    async fn publish(&self, event: NodeEvent) -> usize;

    /// Events published so far on `topic`. [`EventTopic::All`] sums every topic.
    fn published(&self, topic: EventTopic) -> u64;
}

#[derive(Default)]
struct TopicCounters {
    chain: AtomicU64,
    pool: AtomicU64,
}

impl TopicCounters {
    fn bump(&self, topic: EventTopic) {
        match topic {
            EventTopic::Chain => self.chain.fetch_add(1, Ordering::Relaxed),
            EventTopic::TransactionPool => self.pool.fetch_add(1, Ordering::Relaxed),
            EventTopic::All => 0,
        };
    }

    fn get(&self, topic: EventTopic) -> u64 {
        let chain = self.chain.load(Ordering::Relaxed);
        let pool = self.pool.load(Ordering::Relaxed);
        match topic {
            EventTopic::Chain => chain,
            EventTopic::TransactionPool => pool,
            EventTopic::All => chain + pool,
        }
    }
}

/// In-process bus backed by `tokio::sync::broadcast`.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<NodeEvent>,
    counters: TopicCounters,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// A subscription that falls more than `capacity` events behind skips the
    /// oldest ones.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            counters: TopicCounters::default(),
            capacity: capacity.max(1),
        }
    }

    /// Only events published after this call are delivered.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, "Bus subscription opened");
        Subscription::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.sender.subscribe(), filter)
    }

    /// Live subscriptions and streams.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: NodeEvent) -> usize {
        let name = event.name();
        let topic = event.topic();
        let ids = event.transaction_count();
        self.counters.bump(topic);

        // Nobody listening is the normal case for a headless node.
        let delivered = self.sender.send(event).unwrap_or(0);
        trace!(event = name, ?topic, transactions = ids, delivered, "Node event published");
        delivered
    }

    fn published(&self, topic: EventTopic) -> u64 {
        self.counters.get(topic)
    }
}
