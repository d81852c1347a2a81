//! # Data Access
//!
//! Encodes, persists and reads blocks, headers, transactions and state.
//! Recent headers are served from a [`BlockHeaderCache`]; everything else
//! goes to the [`KeyValueStore`].
//!
//! Writes for one block (header, height index, transactions, state changes
//! and the state diff) are always a single atomic batch.

use crate::domain::errors::DataAccessError;
use crate::domain::header_cache::BlockHeaderCache;
use crate::domain::keys;
use nc_state_store::keys as state_keys;
use nc_state_store::{StateReader, StateStore, StateStoreError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use shared_types::codec::{schema, Codec};
use shared_types::entities::{
    Account, Address, Block, BlockHeader, BlockId, StateDiff, Transaction, TransactionId,
    BLOCK_VERSION_V2, GENESIS_BLOCK_VERSION,
};
use shared_types::storage::{BatchOperation, InMemoryKVStore, KeyRange, KeyValueStore};
use std::sync::Arc;
use tracing::{debug, error};

/// Shared handle to the backing store.
pub type SharedKVStore = Arc<RwLock<dyn KeyValueStore>>;

/// Header cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAccessConfig {
    /// Refill from storage once the cache shrinks below this.
    pub min_block_header_cache: usize,
    /// Sliding window size.
    pub max_block_header_cache: usize,
}

impl Default for DataAccessConfig {
    fn default() -> Self {
        Self {
            min_block_header_cache: 309,
            max_block_header_cache: 515,
        }
    }
}

impl DataAccessConfig {
    pub fn for_testing() -> Self {
        Self {
            min_block_header_cache: 3,
            max_block_header_cache: 10,
        }
    }
}

pub struct DataAccess {
    db: SharedKVStore,
    cache: Mutex<BlockHeaderCache>,
}

impl DataAccess {
    pub fn new(db: SharedKVStore, config: DataAccessConfig) -> Self {
        Self {
            db,
            cache: Mutex::new(BlockHeaderCache::new(
                config.min_block_header_cache,
                config.max_block_header_cache,
            )),
        }
    }

    /// Data access over a fresh in-memory store.
    pub fn in_memory(config: DataAccessConfig) -> Self {
        Self::new(Arc::new(RwLock::new(InMemoryKVStore::new())), config)
    }

    // =========================================================================
    // CODEC
    // =========================================================================

    pub fn encode_block_header(header: &BlockHeader) -> Vec<u8> {
        header.encode()
    }

    pub fn decode_block_header(bytes: &[u8]) -> Result<BlockHeader, DataAccessError> {
        Ok(BlockHeader::decode(bytes)?)
    }

    pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
        tx.encode()
    }

    pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction, DataAccessError> {
        Ok(Transaction::decode(bytes)?)
    }

    pub fn encode_block(block: &Block) -> Vec<u8> {
        block.encode()
    }

    pub fn decode_block(bytes: &[u8]) -> Result<Block, DataAccessError> {
        Ok(Block::decode(bytes)?)
    }

    /// Schema identifier of the header asset for `version`.
    pub fn get_block_header_asset_schema(version: u32) -> Result<&'static str, DataAccessError> {
        match version {
            GENESIS_BLOCK_VERSION => Ok(schema::GENESIS_BLOCK_HEADER_ASSET),
            BLOCK_VERSION_V2 => Ok(schema::BLOCK_HEADER_ASSET_V2),
            other => Err(shared_types::errors::CodecError::UnknownAssetVersion(other).into()),
        }
    }

    // =========================================================================
    // HEADER CACHE
    // =========================================================================

    pub fn add_block_header(&self, header: BlockHeader) -> Result<(), DataAccessError> {
        self.cache.lock().add(header)
    }

    /// Removes the tip header from the cache, refilling from storage when it
    /// falls below the minimum size.
    pub fn remove_block_header(&self, id: &BlockId) -> Result<BlockHeader, DataAccessError> {
        let (removed, needs_refill, max) = {
            let mut cache = self.cache.lock();
            let removed = cache.remove(id)?;
            (removed, cache.needs_refill(), cache.max_cached_items())
        };
        if needs_refill {
            let to = removed.height.saturating_sub(1);
            let from = to.saturating_sub(max.saturating_sub(1) as u32);
            let headers = self.read_headers_by_height_between(from, to)?;
            debug!(from, to, count = headers.len(), "Refilling block header cache");
            self.cache.lock().refill(headers)?;
        }
        Ok(removed)
    }

    /// Reloads the header cache with the most recent headers, in ascending
    /// height order.
    pub fn reset_block_header_cache(&self) -> Result<(), DataAccessError> {
        let Some(last) = self.read_last_block_header()? else {
            self.cache.lock().refill(Vec::new())?;
            return Ok(());
        };
        let max = self.cache.lock().max_cached_items();
        let from = last.height.saturating_sub(max.saturating_sub(1) as u32);
        let headers = self.read_headers_by_height_between(from, last.height)?;
        self.cache.lock().refill(headers)
    }

    /// Cached headers, newest first.
    pub fn cached_headers(&self) -> Vec<BlockHeader> {
        self.cache.lock().items_desc()
    }

    // =========================================================================
    // HEADERS
    // =========================================================================

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DataAccessError> {
        Ok(self.db.read().get(key)?)
    }

    fn read_header(&self, id: &BlockId) -> Result<Option<BlockHeader>, DataAccessError> {
        self.get(&keys::block_id_key(id))?
            .map(|bytes| Self::decode_block_header(&bytes))
            .transpose()
    }

    fn read_block_id_at(&self, height: u32) -> Result<Option<BlockId>, DataAccessError> {
        let Some(bytes) = self.get(&keys::block_height_key(height))? else {
            return Ok(None);
        };
        let id = BlockId::try_from(bytes.as_slice()).map_err(|_| {
            DataAccessError::Inconsistent(format!("malformed block id at height {height}"))
        })?;
        Ok(Some(id))
    }

    fn read_header_at(&self, height: u32) -> Result<Option<BlockHeader>, DataAccessError> {
        let Some(id) = self.read_block_id_at(height)? else {
            return Ok(None);
        };
        match self.read_header(&id)? {
            Some(header) => Ok(Some(header)),
            None => Err(DataAccessError::Inconsistent(format!(
                "height {height} indexes missing block {}",
                hex::encode(id)
            ))),
        }
    }

    /// Headers in `[from, to]`, ascending.
    fn read_headers_by_height_between(
        &self,
        from: u32,
        to: u32,
    ) -> Result<Vec<BlockHeader>, DataAccessError> {
        let entries = self
            .db
            .read()
            .scan(&KeyRange::between(
                keys::block_height_key(from),
                keys::block_height_key(to),
            ))?;
        let mut headers = Vec::with_capacity(entries.len());
        for (_, id) in entries {
            let id = BlockId::try_from(id.as_slice()).map_err(|_| {
                DataAccessError::Inconsistent("malformed block id in height index".to_string())
            })?;
            let header = self.read_header(&id)?.ok_or_else(|| {
                DataAccessError::Inconsistent(format!("missing block {}", hex::encode(id)))
            })?;
            headers.push(header);
        }
        Ok(headers)
    }

    fn read_last_block_header(&self) -> Result<Option<BlockHeader>, DataAccessError> {
        let entries = self.db.read().scan(&KeyRange::prefix(keys::DB_KEY_BLOCKS_HEIGHT))?;
        let Some((_, id)) = entries.last() else {
            return Ok(None);
        };
        let id = BlockId::try_from(id.as_slice()).map_err(|_| {
            DataAccessError::Inconsistent("malformed block id in height index".to_string())
        })?;
        self.read_header(&id)
    }

    pub fn get_block_header_by_id(&self, id: &BlockId) -> Result<BlockHeader, DataAccessError> {
        if let Some(header) = self.cache.lock().get_by_id(id) {
            return Ok(header.clone());
        }
        self.read_header(id)?
            .ok_or_else(|| DataAccessError::not_found("block header", id))
    }

    pub fn get_block_headers_by_ids(
        &self,
        ids: &[BlockId],
    ) -> Result<Vec<BlockHeader>, DataAccessError> {
        let cached = self.cache.lock().get_by_ids(ids);
        if cached.len() == ids.len() {
            return Ok(cached);
        }
        let mut headers = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(header) = self.read_header(id)? {
                headers.push(header);
            }
        }
        Ok(headers)
    }

    pub fn get_block_header_by_height(&self, height: u32) -> Result<BlockHeader, DataAccessError> {
        if let Some(header) = self.cache.lock().get_by_height(height) {
            return Ok(header.clone());
        }
        self.read_header_at(height)?
            .ok_or_else(|| DataAccessError::not_found("block header at height", height.to_be_bytes()))
    }

    /// Headers in `[from, to]`, newest first.
    pub fn get_block_headers_by_height_between(
        &self,
        from: u32,
        to: u32,
    ) -> Result<Vec<BlockHeader>, DataAccessError> {
        if let Some(headers) = self.cache.lock().get_by_height_between(from, to) {
            return Ok(headers);
        }
        let mut headers = self.read_headers_by_height_between(from, to)?;
        headers.reverse();
        Ok(headers)
    }

    /// The highest header among `ids` that is persisted.
    pub fn get_highest_common_block_header(
        &self,
        ids: &[BlockId],
    ) -> Result<Option<BlockHeader>, DataAccessError> {
        Ok(self
            .get_block_headers_by_ids(ids)?
            .into_iter()
            .max_by_key(|header| header.height))
    }

    pub fn get_last_block_header(&self) -> Result<BlockHeader, DataAccessError> {
        if let Some(header) = self.cache.lock().last() {
            return Ok(header.clone());
        }
        self.read_last_block_header()?
            .ok_or_else(|| DataAccessError::not_found("last block header", b"tip"))
    }

    // =========================================================================
    // BLOCKS AND TRANSACTIONS
    // =========================================================================

    fn read_payload(&self, id: &BlockId) -> Result<Vec<Transaction>, DataAccessError> {
        let Some(ids) = self.get(&keys::block_transactions_key(id))? else {
            return Ok(Vec::new());
        };
        ids.chunks(32)
            .map(|chunk| {
                let tx_id = TransactionId::try_from(chunk).map_err(|_| {
                    DataAccessError::Inconsistent("malformed transaction id list".to_string())
                })?;
                self.get_transaction_by_id(&tx_id)
            })
            .collect()
    }

    pub fn get_block_by_id(&self, id: &BlockId) -> Result<Block, DataAccessError> {
        let header = self.get_block_header_by_id(id)?;
        let payload = self.read_payload(id)?;
        Ok(Block { header, payload })
    }

    pub fn get_block_by_height(&self, height: u32) -> Result<Block, DataAccessError> {
        let header = self.get_block_header_by_height(height)?;
        let payload = self.read_payload(&header.id())?;
        Ok(Block { header, payload })
    }

    /// Blocks in `[from, to]`, newest first.
    pub fn get_blocks_by_height_between(
        &self,
        from: u32,
        to: u32,
    ) -> Result<Vec<Block>, DataAccessError> {
        self.get_block_headers_by_height_between(from, to)?
            .into_iter()
            .map(|header| {
                let payload = self.read_payload(&header.id())?;
                Ok(Block { header, payload })
            })
            .collect()
    }

    pub fn get_last_block(&self) -> Result<Block, DataAccessError> {
        let header = self.get_last_block_header()?;
        let payload = self.read_payload(&header.id())?;
        Ok(Block { header, payload })
    }

    pub fn is_block_persisted(&self, id: &BlockId) -> Result<bool, DataAccessError> {
        Ok(self.db.read().exists(&keys::block_id_key(id))?)
    }

    pub fn get_transaction_by_id(&self, id: &TransactionId) -> Result<Transaction, DataAccessError> {
        let bytes = self
            .get(&keys::transaction_key(id))?
            .ok_or_else(|| DataAccessError::not_found("transaction", id))?;
        Self::decode_transaction(&bytes)
    }

    pub fn get_transactions_by_ids(
        &self,
        ids: &[TransactionId],
    ) -> Result<Vec<Transaction>, DataAccessError> {
        ids.iter().map(|id| self.get_transaction_by_id(id)).collect()
    }

    pub fn is_transaction_persisted(&self, id: &TransactionId) -> Result<bool, DataAccessError> {
        Ok(self.db.read().exists(&keys::transaction_key(id))?)
    }

    // =========================================================================
    // STATE
    // =========================================================================

    pub fn get_account_by_address(&self, address: &Address) -> Result<Account, DataAccessError> {
        let bytes = self
            .get(&state_keys::account_key(address))?
            .ok_or_else(|| DataAccessError::not_found("account", address))?;
        Ok(Account::decode(&bytes)?)
    }

    pub fn get_chain_state(&self, key: &str) -> Result<Option<Vec<u8>>, DataAccessError> {
        self.get(&state_keys::chain_state_key(key))
    }

    pub fn get_consensus_state(&self, key: &str) -> Result<Option<Vec<u8>>, DataAccessError> {
        self.get(&state_keys::consensus_state_key(key))
    }

    pub fn get_state_diff(&self, height: u32) -> Result<StateDiff, DataAccessError> {
        let bytes = self
            .get(&state_keys::diff_key(height))?
            .ok_or_else(|| DataAccessError::not_found("state diff", height.to_be_bytes()))?;
        Ok(StateDiff::decode(&bytes)?)
    }

    // =========================================================================
    // TEMP BLOCKS
    // =========================================================================

    /// Blocks kept aside during a fork switch, highest first.
    pub fn get_temp_blocks(&self) -> Result<Vec<Block>, DataAccessError> {
        let entries = self.db.read().scan(&KeyRange::prefix(keys::DB_KEY_TEMPBLOCKS_HEIGHT))?;
        entries
            .iter()
            .rev()
            .map(|(_, bytes)| Self::decode_block(bytes))
            .collect()
    }

    pub fn save_temp_block(&self, block: &Block) -> Result<(), DataAccessError> {
        self.db
            .write()
            .put(&keys::temp_block_key(block.header.height), &block.encode())?;
        Ok(())
    }

    pub fn remove_temp_block(&self, height: u32) -> Result<(), DataAccessError> {
        self.db.write().delete(&keys::temp_block_key(height))?;
        Ok(())
    }

    pub fn clear_temp_blocks(&self) -> Result<(), DataAccessError> {
        let entries = self.db.read().scan(&KeyRange::prefix(keys::DB_KEY_TEMPBLOCKS_HEIGHT))?;
        let batch = entries
            .into_iter()
            .map(|(key, _)| BatchOperation::delete(key))
            .collect();
        self.db.write().write_batch(batch)?;
        Ok(())
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Persists the block and the state changes held by `state_store`.
    pub fn save_block(
        &self,
        block: &Block,
        state_store: &StateStore,
        remove_from_temp: bool,
    ) -> Result<StateDiff, DataAccessError> {
        let header = &block.header;
        let id = header.id();
        let mut batch = vec![
            BatchOperation::put(keys::block_id_key(&id), header.encode()),
            BatchOperation::put(keys::block_height_key(header.height), id.to_vec()),
        ];
        if !block.payload.is_empty() {
            let mut ids = Vec::with_capacity(block.payload.len() * 32);
            for tx in &block.payload {
                let tx_id = tx.id();
                ids.extend_from_slice(&tx_id);
                batch.push(BatchOperation::put(keys::transaction_key(&tx_id), tx.encode()));
            }
            batch.push(BatchOperation::put(keys::block_transactions_key(&id), ids));
        }
        let (state_ops, diff) = state_store.finalize(header.height);
        batch.extend(state_ops);
        if remove_from_temp {
            batch.push(BatchOperation::delete(keys::temp_block_key(header.height)));
        }
        self.db.write().write_batch(batch)?;
        debug!(height = header.height, id = %hex::encode(id), "Block persisted");
        Ok(diff)
    }

    /// Deletes the block and reverts the state changes it made, using the
    /// diff recorded when it was saved.
    pub fn delete_block(&self, block: &Block, save_to_temp: bool) -> Result<StateDiff, DataAccessError> {
        let header = &block.header;
        let id = header.id();
        // Every saved block has a diff, empty or not. A missing one means the
        // state cannot be reverted, so the block stays.
        let diff = match self.get_state_diff(header.height) {
            Err(e) if e.is_not_found() => {
                error!(height = header.height, id = %hex::encode(id), "No state diff recorded for block");
                return Err(e);
            }
            other => other?,
        };

        let mut batch = vec![
            BatchOperation::delete(keys::block_id_key(&id)),
            BatchOperation::delete(keys::block_height_key(header.height)),
            BatchOperation::delete(keys::block_transactions_key(&id)),
        ];
        for tx in &block.payload {
            batch.push(BatchOperation::delete(keys::transaction_key(&tx.id())));
        }
        for key in &diff.created {
            batch.push(BatchOperation::delete(key.clone()));
        }
        for entry in diff.updated.iter().chain(diff.deleted.iter()) {
            batch.push(BatchOperation::put(entry.key.clone(), entry.value.clone()));
        }
        batch.push(BatchOperation::delete(state_keys::diff_key(header.height)));
        if save_to_temp {
            batch.push(BatchOperation::put(
                keys::temp_block_key(header.height),
                block.encode(),
            ));
        }
        self.db.write().write_batch(batch)?;
        debug!(height = header.height, id = %hex::encode(id), "Block deleted");
        Ok(diff)
    }
}

/// Accounts restored by reverting `diff`, decoded from their previous values.
pub fn accounts_from_diff(diff: &StateDiff) -> Result<Vec<Account>, DataAccessError> {
    diff.updated
        .iter()
        .chain(diff.deleted.iter())
        .filter(|entry| entry.key.starts_with(state_keys::DB_KEY_ACCOUNTS_ADDRESS))
        .map(|entry| Ok(Account::decode(&entry.value)?))
        .collect()
}

impl StateReader for DataAccess {
    fn account_bytes(&self, address: &Address) -> Result<Option<Vec<u8>>, StateStoreError> {
        Ok(self.get(&state_keys::account_key(address))?)
    }

    fn chain_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        Ok(self.get_chain_state(key)?)
    }

    fn consensus_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        Ok(self.get_consensus_state(key)?)
    }
}
