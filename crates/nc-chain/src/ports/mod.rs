//! Ports layer for the chain.

pub mod outbound;

pub use outbound::{FixedTimeSource, SystemTimeSource, TimeSource};
