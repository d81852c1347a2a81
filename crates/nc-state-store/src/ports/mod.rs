//! Ports for the state store.

pub mod outbound;

pub use outbound::StateReader;
