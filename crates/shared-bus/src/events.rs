//! # Node Events
//!
//! Events emitted by the chain and the transaction pool. The string returned
//! by [`NodeEvent::name`] is the external contract consumed by the embedding
//! application and must not change.

use serde::{Deserialize, Serialize};
use shared_types::entities::{Account, Block, TransactionId, Validator};

pub const EVENT_NEW_BLOCK: &str = "newBlock";
pub const EVENT_DELETE_BLOCK: &str = "deleteBlock";
pub const EVENT_VALIDATORS_CHANGED: &str = "validatorsChanged";
pub const EVENT_ADDED_TRANSACTIONS: &str = "transactionsAdded";
pub const EVENT_REMOVED_TRANSACTIONS: &str = "transactionsRemoved";

/// The pool transition that produced an added/removed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolAction {
    AddTransactions,
    AddPendingTransactions,
    AddVerifiedTransactions,
    AddVerifiedRemovedTransactions,
    RemoveConfirmedTransactions,
    ValidateReceivedTransactions,
    VerifyValidatedTransactions,
    ProcessVerifiedTransactions,
    ExpireTransactions,
    ReverifyTransactionsFromSenders,
    EvictTransactions,
    ReorganizeTransactions,
}

impl PoolAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddTransactions => "addTransactions",
            Self::AddPendingTransactions => "addPendingTransactions",
            Self::AddVerifiedTransactions => "addVerifiedTransactions",
            Self::AddVerifiedRemovedTransactions => "addVerifiedRemovedTransactions",
            Self::RemoveConfirmedTransactions => "removeConfirmedTransactions",
            Self::ValidateReceivedTransactions => "validateReceivedTransactions",
            Self::VerifyValidatedTransactions => "verifyValidatedTransactions",
            Self::ProcessVerifiedTransactions => "processVerifiedTransactions",
            Self::ExpireTransactions => "expireTransactions",
            Self::ReverifyTransactionsFromSenders => "reverifyTransactionsFromSenders",
            Self::EvictTransactions => "evictTransactions",
            Self::ReorganizeTransactions => "reorganizeTransactions",
        }
    }
}

/// Events published on the node bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeEvent {
    // =========================================================================
    // CHAIN
    // =========================================================================
    /// A block was applied and became the tip.
    NewBlock {
        block: Block,
        /// Accounts touched by the block, after application.
        accounts: Vec<Account>,
    },

    /// The tip block was reverted.
    DeleteBlock {
        block: Block,
        /// Accounts touched by the block, after the undo.
        accounts: Vec<Account>,
    },

    /// The active validator set changed.
    ValidatorsChanged { validators: Vec<Validator> },

    // =========================================================================
    // TRANSACTION POOL
    // =========================================================================
    /// Transactions entered a pool queue.
    TransactionsAdded {
        action: PoolAction,
        /// Queue the transactions landed in.
        queue: String,
        transaction_ids: Vec<TransactionId>,
    },

    /// Transactions left the pool or a pool queue.
    TransactionsRemoved {
        action: PoolAction,
        transaction_ids: Vec<TransactionId>,
    },
}

impl NodeEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::NewBlock { .. } | Self::DeleteBlock { .. } | Self::ValidatorsChanged { .. } => {
                EventTopic::Chain
            }
            Self::TransactionsAdded { .. } | Self::TransactionsRemoved { .. } => {
                EventTopic::TransactionPool
            }
        }
    }

    /// Transactions carried by a pool event, blocks count their payload.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        match self {
            Self::NewBlock { block, .. } | Self::DeleteBlock { block, .. } => {
                block.payload.len()
            }
            Self::ValidatorsChanged { .. } => 0,
            Self::TransactionsAdded {
                transaction_ids, ..
            }
            | Self::TransactionsRemoved {
                transaction_ids, ..
            } => transaction_ids.len(),
        }
    }

    /// External event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewBlock { .. } => EVENT_NEW_BLOCK,
            Self::DeleteBlock { .. } => EVENT_DELETE_BLOCK,
            Self::ValidatorsChanged { .. } => EVENT_VALIDATORS_CHANGED,
            Self::TransactionsAdded { .. } => EVENT_ADDED_TRANSACTIONS,
            Self::TransactionsRemoved { .. } => EVENT_REMOVED_TRANSACTIONS,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Block and validator events.
    Chain,
    /// Transaction pool events.
    TransactionPool,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &NodeEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
