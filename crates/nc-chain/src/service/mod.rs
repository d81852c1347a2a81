//! Chain service
//!
//! Owns the canonical tip and applies the block processing contract:
//! validate (stateless), verify (against the tip), save, remove.
//!
//! # Concurrency
//! `save_block` and `remove_block` must be serialized by the caller. The tip
//! is updated after persistence, so two blocks in flight would race on it.

use crate::domain::{
    bootstrap_threshold, merge_validators, validator_for_slot, BlockValidator, ChainConfig,
    ChainError, ChainResult, FieldError, RewardSchedule, Slots, MIN_INIT_ROUNDS,
};
use crate::ports::{SystemTimeSource, TimeSource};
use nc_data_access::{accounts_from_diff, DataAccess};
use nc_state_store::keys::CONSENSUS_STATE_VALIDATORS_KEY;
use nc_state_store::{StateReader, StateStore, StateStoreContext};
use parking_lot::RwLock;
use shared_bus::{EventPublisher, NodeEvent};
use shared_types::codec::Codec;
use shared_types::crypto;
use shared_types::entities::{
    Address, Block, BlockHeader, BlockId, Validator, ValidatorList,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Dependencies for [`Chain`]
pub struct ChainDependencies {
    pub data_access: Arc<DataAccess>,
    pub event_bus: Arc<dyn EventPublisher>,
    pub time_source: Arc<dyn TimeSource>,
}

impl ChainDependencies {
    pub fn new(data_access: Arc<DataAccess>, event_bus: Arc<dyn EventPublisher>) -> Self {
        Self {
            data_access,
            event_bus,
            time_source: Arc::new(SystemTimeSource),
        }
    }

    /// Replace the clock (for testing)
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }
}

pub struct Chain {
    data_access: Arc<DataAccess>,
    event_bus: Arc<dyn EventPublisher>,
    slots: Slots,
    reward: RewardSchedule,
    config: ChainConfig,
    genesis_block: Block,
    last_block: RwLock<Block>,
}

impl Chain {
    pub fn new(deps: ChainDependencies, config: ChainConfig, genesis_block: Block) -> Self {
        let slots = Slots::new(
            genesis_block.header.timestamp,
            config.block_time,
            deps.time_source,
        );
        Self {
            data_access: deps.data_access,
            event_bus: deps.event_bus,
            slots,
            reward: RewardSchedule::from_config(&config),
            last_block: RwLock::new(genesis_block.clone()),
            genesis_block,
            config,
        }
    }

    // === ACCESSORS ===

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    pub fn data_access(&self) -> &Arc<DataAccess> {
        &self.data_access
    }

    pub fn genesis_block(&self) -> &Block {
        &self.genesis_block
    }

    pub fn last_block(&self) -> Block {
        self.last_block.read().clone()
    }

    pub fn genesis_height(&self) -> u32 {
        self.genesis_block.header.height
    }

    fn init_rounds(&self) -> u32 {
        self.genesis_block
            .header
            .genesis_asset()
            .map(|asset| asset.init_rounds)
            .unwrap_or(MIN_INIT_ROUNDS)
    }

    // === LIFECYCLE ===

    /// Loads the tip and header cache from storage.
    ///
    /// The genesis block must already be persisted.
    pub fn init(&self) -> ChainResult<()> {
        if !self.genesis_block_exist()? {
            return Err(ChainError::MissingGenesis);
        }
        self.data_access.reset_block_header_cache()?;
        let last_block = self.data_access.get_last_block()?;
        info!(
            height = last_block.header.height,
            id = %hex::encode(last_block.id()),
            "Chain initialized"
        );
        *self.last_block.write() = last_block;
        Ok(())
    }

    /// Whether the configured genesis block is persisted.
    ///
    /// A different block stored at the genesis height is an error.
    pub fn genesis_block_exist(&self) -> ChainResult<bool> {
        match self
            .data_access
            .get_block_header_by_height(self.genesis_height())
        {
            Ok(stored) if stored.id() == self.genesis_block.id() => Ok(true),
            Ok(_) => {
                error!("Persisted genesis block does not match the configured genesis block");
                Err(ChainError::GenesisMismatch)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes genesis accounts and the initial validator set into `state_store`.
    pub fn apply_genesis_block(&self, block: &Block, state_store: &mut StateStore) -> ChainResult<()> {
        let asset = block.header.genesis_asset().ok_or_else(|| {
            ChainError::Validation(vec![FieldError::new(".asset", "must be a genesis asset")])
        })?;

        for account in &asset.accounts {
            state_store.account.set(account.address, account.clone())?;
        }

        let mut validators = Vec::with_capacity(asset.init_delegates.len());
        for (index, delegate) in asset.init_delegates.iter().enumerate() {
            let address = Address::try_from(delegate.as_slice()).map_err(|_| {
                ChainError::Validation(vec![FieldError::new(
                    format!(".asset.initDelegates.{index}"),
                    "must be a 20 byte address",
                )])
            })?;
            validators.push(Validator {
                address,
                min_active_height: block.header.height + 1,
                is_consensus_participant: false,
            });
        }
        debug!(
            accounts = asset.accounts.len(),
            validators = validators.len(),
            "Applying genesis block"
        );
        state_store.consensus.set(
            CONSENSUS_STATE_VALIDATORS_KEY,
            ValidatorList { validators }.encode(),
        )?;
        Ok(())
    }

    /// A state store over persisted state, seeded with recent headers.
    pub fn new_state_store(&self) -> StateStore {
        let last_block_reward = self.last_block.read().header.reward;
        let reader: Arc<dyn StateReader> = self.data_access.clone();
        StateStore::new(
            reader,
            StateStoreContext {
                last_block_headers: self.data_access.cached_headers(),
                network_identifier: self.config.network_identifier,
                last_block_reward,
            },
        )
    }

    pub fn reset_block_header_cache(&self) -> ChainResult<()> {
        Ok(self.data_access.reset_block_header_cache()?)
    }

    // === REWARD ===

    pub fn calculate_default_reward(&self, height: u32) -> u64 {
        self.reward.calculate_default_reward(height)
    }

    /// Default reward, or zero when the generator failed its seed reveal.
    pub fn calculate_expected_reward(&self, header: &BlockHeader, state_store: &StateStore) -> u64 {
        if self.is_valid_seed_reveal(header, state_store) {
            self.calculate_default_reward(header.height)
        } else {
            0
        }
    }

    pub fn is_valid_seed_reveal(&self, header: &BlockHeader, state_store: &StateStore) -> bool {
        BlockValidator::is_valid_seed_reveal(header, state_store.chain.last_block_headers())
    }

    // === VALIDATION ===

    pub fn validate_genesis_block_header(&self, block: &Block) -> ChainResult<()> {
        BlockValidator::validate_genesis_block_header(block)
    }

    pub fn validate_block_header(&self, block: &Block) -> ChainResult<()> {
        BlockValidator::validate_block_header(block, &self.config, &self.reward)
    }

    /// Checks `block` against the current tip and the validator set in
    /// `state_store`.
    pub fn verify_block_header(&self, block: &Block, state_store: &mut StateStore) -> ChainResult<()> {
        let header = &block.header;
        let last_header = self.last_block.read().header.clone();

        BlockValidator::verify_previous_block_id(header, &last_header)?;

        let block_slot = self.slots.get_slot_number(Some(header.timestamp));
        BlockValidator::validate_block_slot(
            block_slot,
            self.slots.get_slot_number(Some(last_header.timestamp)),
            self.slots.get_slot_number(None),
        )?;

        let expected = self.calculate_expected_reward(header, state_store);
        if header.reward != expected {
            return Err(ChainError::InvalidReward {
                actual: header.reward,
                expected,
            });
        }

        let validators = Self::read_validators(state_store)?.unwrap_or_default();
        let expected_generator =
            validator_for_slot(&validators, block_slot).ok_or(ChainError::NoValidators)?;
        let actual = crypto::address_from_public_key(&header.generator_public_key);
        if actual != expected_generator.address {
            return Err(ChainError::InvalidGenerator {
                expected: hex::encode(expected_generator.address),
                actual: hex::encode(actual),
            });
        }
        Ok(())
    }

    // === APPLY / REMOVE ===

    /// Persists `block` with the state in `state_store` and makes it the tip.
    pub async fn save_block(
        &self,
        block: Block,
        state_store: &StateStore,
        remove_from_temp_table: bool,
    ) -> ChainResult<()> {
        self.data_access
            .save_block(&block, state_store, remove_from_temp_table)?;
        self.data_access.add_block_header(block.header.clone())?;
        *self.last_block.write() = block.clone();

        info!(
            height = block.header.height,
            id = %hex::encode(block.id()),
            transactions = block.payload.len(),
            "Block saved"
        );
        let accounts = state_store.account.get_updated();
        self.event_bus
            .publish(NodeEvent::NewBlock { block, accounts })
            .await;
        Ok(())
    }

    /// Reverts the tip block. The previous block becomes the tip.
    pub async fn remove_block(&self, block: Block, save_temp_block: bool) -> ChainResult<()> {
        if block.header.is_genesis() {
            error!(height = block.header.height, "Attempted to delete genesis block");
            return Err(ChainError::CannotDeleteGenesis);
        }

        let previous_id = BlockId::try_from(block.header.previous_block_id.as_slice()).map_err(|_| {
            ChainError::PreviousBlockMissing {
                id: hex::encode(&block.header.previous_block_id),
            }
        })?;
        let previous = match self.data_access.get_block_by_id(&previous_id) {
            Ok(previous) => previous,
            Err(e) if e.is_not_found() => {
                error!(id = %hex::encode(previous_id), "Previous block is not persisted");
                return Err(ChainError::PreviousBlockMissing {
                    id: hex::encode(previous_id),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let diff = match self.data_access.delete_block(&block, save_temp_block) {
            Ok(diff) => diff,
            Err(e) if e.is_not_found() => {
                return Err(ChainError::StateDiffMissing {
                    height: block.header.height,
                })
            }
            Err(e) => return Err(e.into()),
        };
        self.data_access.remove_block_header(&block.id())?;
        *self.last_block.write() = previous;

        info!(
            height = block.header.height,
            id = %hex::encode(block.id()),
            "Block removed"
        );
        let accounts = accounts_from_diff(&diff)?;
        self.event_bus
            .publish(NodeEvent::DeleteBlock { block, accounts })
            .await;
        Ok(())
    }

    // === VALIDATORS ===

    /// Replaces the validator set from the block at `header` onwards.
    ///
    /// Skipped until the genesis delegates have completed their bootstrap
    /// rounds.
    pub async fn set_validators(
        &self,
        validators: Vec<(Address, bool)>,
        state_store: &mut StateStore,
        header: &BlockHeader,
    ) -> ChainResult<()> {
        let threshold = bootstrap_threshold(
            self.config.number_of_validators,
            self.init_rounds(),
            self.genesis_height(),
        );
        if threshold > header.height {
            debug!(
                height = header.height,
                threshold, "Skipping validator set update during bootstrap period"
            );
            return Ok(());
        }

        let Some(previous) = Self::read_validators(state_store)? else {
            error!(height = header.height, "Previous validator set must exist");
            return Err(ChainError::MissingValidatorSet);
        };
        let next = merge_validators(&previous, &validators, header.height);
        state_store.consensus.set(
            CONSENSUS_STATE_VALIDATORS_KEY,
            ValidatorList {
                validators: next.clone(),
            }
            .encode(),
        )?;
        debug!(height = header.height, count = next.len(), "Validator set updated");
        self.event_bus
            .publish(NodeEvent::ValidatorsChanged { validators: next })
            .await;
        Ok(())
    }

    /// Persisted validator set.
    pub fn get_validators(&self) -> ChainResult<Vec<Validator>> {
        match self
            .data_access
            .get_consensus_state(CONSENSUS_STATE_VALIDATORS_KEY)?
        {
            Some(bytes) => Ok(ValidatorList::decode(&bytes)?.validators),
            None => Ok(Vec::new()),
        }
    }

    /// Validator assigned to the slot containing `timestamp`.
    pub fn get_validator(&self, timestamp: u32) -> ChainResult<Validator> {
        let slot = self.slots.get_slot_number(Some(timestamp));
        let validators = self.get_validators()?;
        validator_for_slot(&validators, slot)
            .cloned()
            .ok_or(ChainError::NoValidators)
    }

    fn read_validators(state_store: &mut StateStore) -> ChainResult<Option<Vec<Validator>>> {
        match state_store.consensus.get(CONSENSUS_STATE_VALIDATORS_KEY)? {
            Some(bytes) => Ok(Some(ValidatorList::decode(&bytes)?.validators)),
            None => Ok(None),
        }
    }
}
