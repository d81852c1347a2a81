//! # Shared Types Crate
//!
//! Domain entities, the wire codec and the storage port shared by the chain,
//! the transaction pool and the networking layer.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every entity that crosses a crate boundary
//!   (blocks, headers, accounts, validators, transactions) is defined here.
//! - **Bit-exact wire format**: encoding goes through the field-numbered
//!   codec in [`codec`]; field numbers and types never change.
//! - **Fixed-width identifiers**: hashes, addresses and network identifiers
//!   are byte arrays, never strings.

pub mod codec;
pub mod crypto;
pub mod entities;
pub mod errors;
pub mod storage;

pub use codec::{Codec, FieldReader, FieldWriter};
pub use entities::*;
pub use errors::*;
pub use storage::{BatchOperation, InMemoryKVStore, KeyRange, KeyValueStore, ScanResult};
