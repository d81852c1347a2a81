//! A node's chain side, bootstrapped from a fixed genesis block.

use anyhow::{anyhow, Context, Result};
use ed25519_dalek::SigningKey;
use nc_chain::{Chain, ChainConfig, ChainDependencies, FixedTimeSource};
use nc_data_access::DataAccess;
use nc_state_store::StateStore;
use nc_transaction_pool::{ProcessorChecks, StateStoreFactory};
use nc_transactions::domain::assets::TransferAsset;
use nc_transactions::{TransactionConfig, TransactionProcessor};
use shared_bus::InMemoryEventBus;
use shared_types::codec::Codec;
use shared_types::crypto;
use shared_types::entities::{
    Account, Address, Block, BlockHeader, BlockHeaderAsset, BlockHeaderAssetV2, GenesisBlockAsset,
    TokenAccount, Transaction, BLOCK_VERSION_V2, GENESIS_BLOCK_VERSION,
};
use std::sync::Arc;

pub const GENESIS_TIME: u32 = 1_000;
pub const BLOCK_TIME: u32 = 10;
pub const GENESIS_BALANCE: u64 = 1_000_000;
pub const FEE: u64 = 10_000;

/// Logs to the test writer. `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn address_of(key: &SigningKey) -> Address {
    crypto::address_from_public_key(key.verifying_key().as_bytes())
}

/// Three funded delegates, sorted by address.
pub fn delegate_keys() -> Vec<SigningKey> {
    let mut keys: Vec<SigningKey> = (0..3)
        .map(|i| crypto::signing_key_from_passphrase(&format!("delegate-{i}")))
        .collect();
    keys.sort_by_key(address_of);
    keys
}

pub fn genesis_block(keys: &[SigningKey]) -> Block {
    let addresses: Vec<Address> = keys.iter().map(address_of).collect();
    Block {
        header: BlockHeader {
            version: GENESIS_BLOCK_VERSION,
            timestamp: GENESIS_TIME,
            height: 0,
            transaction_root: crypto::hash(&[]).to_vec(),
            asset: BlockHeaderAsset::Genesis(GenesisBlockAsset {
                accounts: addresses
                    .iter()
                    .map(|address| Account {
                        token: TokenAccount {
                            balance: GENESIS_BALANCE,
                        },
                        ..Account::new(*address)
                    })
                    .collect(),
                init_delegates: addresses.iter().map(|a| a.to_vec()).collect(),
                init_rounds: 3,
            }),
            ..BlockHeader::default()
        },
        payload: vec![],
    }
}

pub fn slot_time(slot: u32) -> u32 {
    GENESIS_TIME + slot * BLOCK_TIME
}

/// Chain, bus and transaction rules of one node.
pub struct ChainNode {
    pub chain: Arc<Chain>,
    pub bus: Arc<InMemoryEventBus>,
    pub clock: Arc<FixedTimeSource>,
    pub processor: TransactionProcessor,
    pub delegates: Vec<SigningKey>,
}

impl ChainNode {
    /// Persists genesis and loads the tip. The clock sits 100 slots in.
    pub async fn bootstrap() -> Result<Self> {
        init_tracing();
        let delegates = delegate_keys();
        let config = ChainConfig::for_testing();
        let data_access = Arc::new(DataAccess::in_memory(config.data_access.clone()));
        let bus = Arc::new(InMemoryEventBus::new());
        let clock = Arc::new(FixedTimeSource::new(u64::from(slot_time(100))));
        let deps = ChainDependencies::new(data_access, bus.clone()).with_time_source(clock.clone());
        let chain = Arc::new(Chain::new(deps, config, genesis_block(&delegates)));

        let genesis = chain.genesis_block().clone();
        chain.validate_genesis_block_header(&genesis)?;
        let mut store = chain.new_state_store();
        chain.apply_genesis_block(&genesis, &mut store)?;
        chain.save_block(genesis, &store, false).await?;
        chain.init()?;

        Ok(Self {
            chain,
            bus,
            clock,
            processor: TransactionProcessor::new(TransactionConfig::for_testing()),
            delegates,
        })
    }

    /// Pool checks that always run against the current tip.
    pub fn pool_checks(&self) -> Arc<ProcessorChecks> {
        let chain = self.chain.clone();
        let state: StateStoreFactory = Arc::new(move || chain.new_state_store());
        Arc::new(ProcessorChecks::new(
            TransactionProcessor::new(TransactionConfig::for_testing()),
            state,
        ))
    }

    pub fn transfer(&self, sender: &SigningKey, nonce: u64, amount: u64, recipient: Address) -> Transaction {
        let asset = TransferAsset {
            amount,
            recipient_address: recipient,
            data: String::new(),
        };
        let mut tx = Transaction {
            module_id: 2,
            asset_id: 0,
            nonce,
            fee: FEE,
            sender_public_key: sender.verifying_key().to_bytes().to_vec(),
            asset: asset.encode(),
            signatures: Vec::new(),
        };
        tx.signatures = vec![crypto::sign_data(
            &self.chain.config().network_identifier,
            &tx.signing_bytes(),
            sender,
        )];
        tx
    }

    /// Signed block on top of the tip, generated by the slot's validator.
    pub fn forge(&self, slot: u32, payload: Vec<Transaction>) -> Result<Block> {
        let timestamp = slot_time(slot);
        let validator = self.chain.get_validator(timestamp)?;
        let key = self
            .delegates
            .iter()
            .find(|k| address_of(k) == validator.address)
            .context("slot validator is not one of our delegates")?;
        let last = self.chain.last_block();
        let ids: Vec<_> = payload.iter().map(Transaction::id).collect();

        let mut header = BlockHeader {
            version: BLOCK_VERSION_V2,
            timestamp,
            height: last.header.height + 1,
            previous_block_id: last.id().to_vec(),
            transaction_root: crypto::merkle_root(&ids).to_vec(),
            generator_public_key: key.verifying_key().as_bytes().to_vec(),
            reward: 0,
            asset: BlockHeaderAsset::V2(BlockHeaderAssetV2 {
                max_height_previously_forged: 0,
                max_height_prevoted: 0,
                seed_reveal: vec![1u8; 16],
            }),
            signature: vec![],
        };
        header.reward = self
            .chain
            .calculate_expected_reward(&header, &self.chain.new_state_store());
        header.signature = crypto::sign_data(
            &self.chain.config().network_identifier,
            &header.signing_bytes(),
            key,
        );
        Ok(Block { header, payload })
    }

    /// Validate, verify, apply the payload, save.
    pub async fn process(&self, block: Block) -> Result<()> {
        self.chain.validate_block_header(&block)?;
        let mut store: StateStore = self.chain.new_state_store();
        self.chain.verify_block_header(&block, &mut store)?;
        for tx in &block.payload {
            self.processor
                .apply(tx, &mut store)
                .map_err(|errors| anyhow!("transaction {} failed: {errors:?}", hex::encode(tx.id())))?;
        }
        self.chain.save_block(block, &store, false).await?;
        Ok(())
    }

    /// Persisted balance; zero for an unknown account.
    pub fn balance(&self, address: &Address) -> Result<u64> {
        match self.chain.data_access().get_account_by_address(address) {
            Ok(account) => Ok(account.token.balance),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}
