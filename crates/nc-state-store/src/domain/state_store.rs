//! # State Store
//!
//! A write-through cache used while a block (or a single transaction) is
//! processed. Reads fall through to the [`StateReader`] and are cached; writes
//! stay in memory until [`StateStore::finalize`] turns them into a batch of
//! storage operations plus the [`StateDiff`] needed to undo them.
//!
//! The store is single-owner: block processing holds it by `&mut` for the
//! whole block, so no interior locking is needed.

use crate::domain::errors::StateStoreError;
use crate::domain::keys;
use crate::ports::outbound::StateReader;
use shared_types::codec::Codec;
use shared_types::entities::{Account, Address, BlockHeader, DiffEntry, NetworkIdentifier, StateDiff};
use shared_types::storage::BatchOperation;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// ACCOUNTS
// =============================================================================

#[derive(Debug, Clone, Default)]
struct AccountCache {
    data: BTreeMap<Address, Account>,
    /// Encoded values as first read from storage; `None` when absent.
    initial: BTreeMap<Address, Option<Vec<u8>>>,
    updated: BTreeSet<Address>,
    deleted: BTreeSet<Address>,
}

/// Account key space.
pub struct AccountStore {
    reader: Arc<dyn StateReader>,
    cache: AccountCache,
    snapshot: Option<AccountCache>,
}

impl AccountStore {
    fn new(reader: Arc<dyn StateReader>) -> Self {
        Self {
            reader,
            cache: AccountCache::default(),
            snapshot: None,
        }
    }

    fn load(&mut self, address: &Address) -> Result<Option<Account>, StateStoreError> {
        if self.cache.deleted.contains(address) {
            return Ok(None);
        }
        if let Some(account) = self.cache.data.get(address) {
            return Ok(Some(account.clone()));
        }
        if let Some(None) = self.cache.initial.get(address) {
            return Ok(None);
        }
        let bytes = self.reader.account_bytes(address)?;
        self.cache.initial.insert(*address, bytes.clone());
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let account = Account::decode(&bytes)?;
        self.cache.data.insert(*address, account.clone());
        Ok(Some(account))
    }

    /// Returns the account or `NotFound`.
    pub fn get(&mut self, address: &Address) -> Result<Account, StateStoreError> {
        self.load(address)?
            .ok_or_else(|| StateStoreError::not_found(&keys::account_key(address)))
    }

    /// Returns the account, or a default one for an unknown address.
    pub fn get_or_default(&mut self, address: &Address) -> Result<Account, StateStoreError> {
        Ok(self.load(address)?.unwrap_or_else(|| Account::new(*address)))
    }

    /// Replaces the cached value of `address`.
    pub fn set(&mut self, address: Address, account: Account) -> Result<(), StateStoreError> {
        // Record the persisted value before the first write so the diff is exact
        if !self.cache.initial.contains_key(&address) {
            let bytes = self.reader.account_bytes(&address)?;
            self.cache.initial.insert(address, bytes);
        }
        self.cache.deleted.remove(&address);
        self.cache.data.insert(address, account);
        self.cache.updated.insert(address);
        Ok(())
    }

    /// Deletes the account.
    pub fn del(&mut self, address: &Address) -> Result<(), StateStoreError> {
        if self.load(address)?.is_none() {
            return Err(StateStoreError::not_found(&keys::account_key(address)));
        }
        self.cache.data.remove(address);
        self.cache.updated.remove(address);
        self.cache.deleted.insert(*address);
        Ok(())
    }

    /// Searches the cached accounts.
    pub fn find<P>(&self, mut predicate: P) -> Option<Account>
    where
        P: FnMut(&Account) -> bool,
    {
        self.cache
            .data
            .values()
            .find(|account| predicate(account))
            .cloned()
    }

    /// Accounts written since the store was created.
    pub fn get_updated(&self) -> Vec<Account> {
        self.cache
            .updated
            .iter()
            .filter_map(|address| self.cache.data.get(address).cloned())
            .collect()
    }

    fn finalize(&self, batch: &mut Vec<BatchOperation>, diff: &mut StateDiff) {
        for address in &self.cache.updated {
            let Some(account) = self.cache.data.get(address) else {
                continue;
            };
            let key = keys::account_key(address);
            let value = account.encode();
            match self.cache.initial.get(address) {
                Some(Some(previous)) => {
                    if previous == &value {
                        continue;
                    }
                    diff.updated.push(DiffEntry {
                        key: key.clone(),
                        value: previous.clone(),
                    });
                }
                _ => diff.created.push(key.clone()),
            }
            batch.push(BatchOperation::put(key, value));
        }
        for address in &self.cache.deleted {
            let key = keys::account_key(address);
            if let Some(Some(previous)) = self.cache.initial.get(address) {
                diff.deleted.push(DiffEntry {
                    key: key.clone(),
                    value: previous.clone(),
                });
                batch.push(BatchOperation::delete(key));
            }
        }
    }
}

// =============================================================================
// CHAIN / CONSENSUS
// =============================================================================

#[derive(Debug, Clone, Default)]
struct EntryCache {
    data: BTreeMap<String, Vec<u8>>,
    initial: BTreeMap<String, Option<Vec<u8>>>,
    updated: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy)]
enum Space {
    Chain,
    Consensus,
}

impl Space {
    fn key(self, key: &str) -> Vec<u8> {
        match self {
            Self::Chain => keys::chain_state_key(key),
            Self::Consensus => keys::consensus_state_key(key),
        }
    }
}

/// A string-keyed key space holding opaque values.
struct EntryStore {
    space: Space,
    reader: Arc<dyn StateReader>,
    cache: EntryCache,
    snapshot: Option<EntryCache>,
}

impl EntryStore {
    fn new(space: Space, reader: Arc<dyn StateReader>) -> Self {
        Self {
            space,
            reader,
            cache: EntryCache::default(),
            snapshot: None,
        }
    }

    fn read_persisted(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        match self.space {
            Space::Chain => self.reader.chain_state(key),
            Space::Consensus => self.reader.consensus_state(key),
        }
    }

    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        if let Some(value) = self.cache.data.get(key) {
            return Ok(Some(value.clone()));
        }
        if let Some(initial) = self.cache.initial.get(key) {
            return Ok(initial.clone());
        }
        let value = self.read_persisted(key)?;
        self.cache.initial.insert(key.to_string(), value.clone());
        if let Some(value) = &value {
            self.cache.data.insert(key.to_string(), value.clone());
        }
        Ok(value)
    }

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StateStoreError> {
        if !self.cache.initial.contains_key(key) {
            let persisted = self.read_persisted(key)?;
            self.cache.initial.insert(key.to_string(), persisted);
        }
        self.cache.data.insert(key.to_string(), value);
        self.cache.updated.insert(key.to_string());
        Ok(())
    }

    fn finalize(&self, batch: &mut Vec<BatchOperation>, diff: &mut StateDiff) {
        for key in &self.cache.updated {
            let Some(value) = self.cache.data.get(key) else {
                continue;
            };
            let db_key = self.space.key(key);
            match self.cache.initial.get(key) {
                Some(Some(previous)) => {
                    if previous == value {
                        continue;
                    }
                    diff.updated.push(DiffEntry {
                        key: db_key.clone(),
                        value: previous.clone(),
                    });
                }
                _ => diff.created.push(db_key.clone()),
            }
            batch.push(BatchOperation::put(db_key, value.clone()));
        }
    }

    fn snapshot(&mut self) {
        self.snapshot = Some(self.cache.clone());
    }

    fn restore(&mut self) -> bool {
        match self.snapshot.take() {
            Some(cache) => {
                self.cache = cache;
                true
            }
            None => false,
        }
    }
}

/// Chain-global key space plus the chain context of the block being processed.
pub struct ChainStateStore {
    entries: EntryStore,
    last_block_headers: Vec<BlockHeader>,
    network_identifier: NetworkIdentifier,
    last_block_reward: u64,
}

impl ChainStateStore {
    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StateStoreError> {
        self.entries.set(key, value)
    }

    /// Recent headers, newest first.
    pub fn last_block_headers(&self) -> &[BlockHeader] {
        &self.last_block_headers
    }

    pub fn last_block_header(&self) -> Option<&BlockHeader> {
        self.last_block_headers.first()
    }

    pub fn network_identifier(&self) -> &NetworkIdentifier {
        &self.network_identifier
    }

    pub fn last_block_reward(&self) -> u64 {
        self.last_block_reward
    }
}

/// Consensus key space (validators, finalized height).
pub struct ConsensusStateStore {
    entries: EntryStore,
}

impl ConsensusStateStore {
    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StateStoreError> {
        self.entries.set(key, value)
    }
}

// =============================================================================
// STATE STORE
// =============================================================================

/// Chain context handed to a new [`StateStore`].
#[derive(Debug, Clone, Default)]
pub struct StateStoreContext {
    /// Recent headers, newest first.
    pub last_block_headers: Vec<BlockHeader>,
    pub network_identifier: NetworkIdentifier,
    pub last_block_reward: u64,
}

/// Transactional view over account, chain and consensus state.
pub struct StateStore {
    pub account: AccountStore,
    pub chain: ChainStateStore,
    pub consensus: ConsensusStateStore,
}

impl StateStore {
    pub fn new(reader: Arc<dyn StateReader>, context: StateStoreContext) -> Self {
        Self {
            account: AccountStore::new(reader.clone()),
            chain: ChainStateStore {
                entries: EntryStore::new(Space::Chain, reader.clone()),
                last_block_headers: context.last_block_headers,
                network_identifier: context.network_identifier,
                last_block_reward: context.last_block_reward,
            },
            consensus: ConsensusStateStore {
                entries: EntryStore::new(Space::Consensus, reader),
            },
        }
    }

    /// Saves the current cache contents so a failed transaction can be rolled back.
    pub fn create_snapshot(&mut self) {
        self.account.snapshot = Some(self.account.cache.clone());
        self.chain.entries.snapshot();
        self.consensus.entries.snapshot();
    }

    /// Restores the contents saved by [`create_snapshot`](Self::create_snapshot).
    pub fn restore_snapshot(&mut self) -> Result<(), StateStoreError> {
        let Some(accounts) = self.account.snapshot.take() else {
            return Err(StateStoreError::NoSnapshot);
        };
        self.account.cache = accounts;
        if !self.chain.entries.restore() || !self.consensus.entries.restore() {
            return Err(StateStoreError::NoSnapshot);
        }
        Ok(())
    }

    /// Materializes every write as storage operations.
    ///
    /// The returned batch also persists the diff under `diff:<height>` so the
    /// block at `height` can be reverted later.
    pub fn finalize(&self, height: u32) -> (Vec<BatchOperation>, StateDiff) {
        let mut batch = Vec::new();
        let mut diff = StateDiff::default();
        self.account.finalize(&mut batch, &mut diff);
        self.chain.entries.finalize(&mut batch, &mut diff);
        self.consensus.entries.finalize(&mut batch, &mut diff);
        debug!(
            height,
            updated = diff.updated.len(),
            created = diff.created.len(),
            deleted = diff.deleted.len(),
            "State store finalized"
        );
        batch.push(BatchOperation::put(keys::diff_key(height), diff.encode()));
        (batch, diff)
    }
}
