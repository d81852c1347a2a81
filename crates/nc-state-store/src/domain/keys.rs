//! Storage key layout for state entries.
//!
//! | Prefix | Value |
//! |--------|-------|
//! | `accounts:address:<address>` | `/account/base` |
//! | `chain:<key>` | opaque bytes |
//! | `consensus:<key>` | opaque bytes (e.g. `/state/validators`) |
//! | `diff:<height be32>` | `/state/diff` |

use shared_types::entities::Address;

pub const DB_KEY_ACCOUNTS_ADDRESS: &[u8] = b"accounts:address:";
pub const DB_KEY_CHAIN_STATE: &[u8] = b"chain:";
pub const DB_KEY_CONSENSUS_STATE: &[u8] = b"consensus:";
pub const DB_KEY_DIFF_STATE: &[u8] = b"diff:";

/// Consensus-state key holding the encoded validator list.
pub const CONSENSUS_STATE_VALIDATORS_KEY: &str = "validators";

/// Consensus-state key holding the finalized height.
pub const CONSENSUS_STATE_FINALIZED_HEIGHT_KEY: &str = "finalizedHeight";

/// Chain-state key holding the total burnt fee.
pub const CHAIN_STATE_BURNT_FEE: &str = "fee:burntAmount";

pub fn account_key(address: &Address) -> Vec<u8> {
    [DB_KEY_ACCOUNTS_ADDRESS, address.as_slice()].concat()
}

pub fn chain_state_key(key: &str) -> Vec<u8> {
    [DB_KEY_CHAIN_STATE, key.as_bytes()].concat()
}

pub fn consensus_state_key(key: &str) -> Vec<u8> {
    [DB_KEY_CONSENSUS_STATE, key.as_bytes()].concat()
}

pub fn diff_key(height: u32) -> Vec<u8> {
    [DB_KEY_DIFF_STATE, &height.to_be_bytes()[..]].concat()
}
