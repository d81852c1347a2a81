//! # Node Core Test Suite
//!
//! Flows that cross crate boundaries. Each crate tests its own behavior in
//! place; this crate wires them together the way a node does.
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs         # genesis chain, signed transfers, block forging
//!     ├── block_lifecycle.rs  # chain + data access + state store + transactions
//!     ├── pool_over_chain.rs  # both pools checking against the chain tip
//!     └── gossip.rs           # two in-memory P2P nodes carrying blocks and transactions
//! ```
//!
//! ```bash
//! cargo test -p nc-tests
//! RUST_LOG=debug cargo test -p nc-tests integration::gossip
//! ```

pub mod integration;
