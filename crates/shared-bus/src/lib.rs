//! # Shared Bus - Typed Node Events
//!
//! The chain and the transaction pool publish their externally visible events
//! (`newBlock`, `deleteBlock`, `validatorsChanged`, `transactionsAdded`,
//! `transactionsRemoved`) through this bus. Consumers subscribe with a topic
//! filter and receive owned copies.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │    Chain     │                    │  Embedding   │
//! │  Tx Pool     │    publish()       │ application  │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, NodeEvent, PoolAction};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Events buffered per subscription before the oldest are skipped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
