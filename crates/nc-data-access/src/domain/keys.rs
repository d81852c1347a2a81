//! Storage key layout for blocks and transactions.
//!
//! | Key | Value |
//! |-----|-------|
//! | `blocks:id:<id>` | `/block/header` |
//! | `blocks:height:<height be32>` | block id |
//! | `transactions:blockID:<id>` | concatenated transaction ids |
//! | `transactions:id:<id>` | `/transaction` |
//! | `tempBlocks:height:<height be32>` | `/block` |
//!
//! Account, chain, consensus and diff keys live in `nc_state_store::keys`.

use shared_types::entities::{BlockId, TransactionId};

pub const DB_KEY_BLOCKS_ID: &[u8] = b"blocks:id:";
pub const DB_KEY_BLOCKS_HEIGHT: &[u8] = b"blocks:height:";
pub const DB_KEY_TRANSACTIONS_BLOCK_ID: &[u8] = b"transactions:blockID:";
pub const DB_KEY_TRANSACTIONS_ID: &[u8] = b"transactions:id:";
pub const DB_KEY_TEMPBLOCKS_HEIGHT: &[u8] = b"tempBlocks:height:";

pub fn block_id_key(id: &BlockId) -> Vec<u8> {
    [DB_KEY_BLOCKS_ID, id.as_slice()].concat()
}

pub fn block_height_key(height: u32) -> Vec<u8> {
    [DB_KEY_BLOCKS_HEIGHT, &height.to_be_bytes()[..]].concat()
}

pub fn block_transactions_key(id: &BlockId) -> Vec<u8> {
    [DB_KEY_TRANSACTIONS_BLOCK_ID, id.as_slice()].concat()
}

pub fn transaction_key(id: &TransactionId) -> Vec<u8> {
    [DB_KEY_TRANSACTIONS_ID, id.as_slice()].concat()
}

pub fn temp_block_key(height: u32) -> Vec<u8> {
    [DB_KEY_TEMPBLOCKS_HEIGHT, &height.to_be_bytes()[..]].concat()
}
