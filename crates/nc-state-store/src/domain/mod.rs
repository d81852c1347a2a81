//! Domain layer for the state store.

pub mod errors;
pub mod keys;
pub mod state_store;

pub use errors::StateStoreError;
pub use state_store::{
    AccountStore, ChainStateStore, ConsensusStateStore, StateStore, StateStoreContext,
};
