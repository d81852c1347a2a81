//! Domain layer for data access.

pub mod data_access;
pub mod errors;
pub mod header_cache;
pub mod keys;

pub use data_access::{accounts_from_diff, DataAccess, DataAccessConfig, SharedKVStore};
pub use errors::DataAccessError;
pub use header_cache::BlockHeaderCache;
