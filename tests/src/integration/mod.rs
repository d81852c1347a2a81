//! Cross-crate integration flows.

pub mod fixtures;

#[cfg(test)]
mod block_lifecycle;
#[cfg(test)]
mod gossip;
#[cfg(test)]
mod pool_over_chain;
