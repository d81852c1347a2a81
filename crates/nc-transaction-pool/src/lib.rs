//! # nc-transaction-pool
//!
//! Holds unconfirmed transactions until a block producer picks them up.
//!
//! ## Staged pool
//!
//! ```text
//! add ──► received ──validate──► validated ──verify──► verified ──process──► ready
//!                                                │                    ▲
//!                                                └──► pending ──sigs──┘
//! ```
//!
//! Every transaction lives in exactly one queue. Confirmed blocks pull
//! transactions out and send related ones back to `received`; reverted
//! blocks put their transactions back at `verified`.
//!
//! ## Fee-priority pool
//!
//! A single pool ranked by `(fee - minFee) / size`, with per-account limits,
//! nonce-based processability and replacement by fee.
//!
//! ## Events
//!
//! Both pools publish `TransactionsAdded` / `TransactionsRemoved` on the
//! shared bus, tagged with the [`PoolAction`](shared_bus::PoolAction) that
//! caused them.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{ProcessorChecks, StateStoreFactory};
pub use domain::*;
pub use ports::{SystemTimeSource, TimeSource, TransactionChecks};
pub use service::{FeePriorityPool, PoolDependencies, TransactionPool};
