//! Adapters wiring the pool ports to concrete collaborators.

pub mod processor;

pub use processor::{ProcessorChecks, StateStoreFactory};
