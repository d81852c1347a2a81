//! Domain layer: queues, pool entries, the fee-priority index.

pub mod config;
pub mod entities;
pub mod errors;
pub mod fee_index;
pub mod queue;

pub use config::{FeePriorityPoolConfig, TransactionPoolConfig};
pub use entities::{AddTransactionResult, PooledTransaction, QueueName, QueueSizes};
pub use errors::{PoolError, PoolResult};
pub use fee_index::{FeeEntry, FeePriorityIndex};
pub use queue::{Keyed, Queue};
