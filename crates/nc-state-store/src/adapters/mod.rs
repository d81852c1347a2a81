//! Adapters for the state store ports.

pub mod memory;

pub use memory::InMemoryStateReader;
