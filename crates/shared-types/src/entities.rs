//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Chain**: `Block`, `BlockHeader`, `BlockHeaderAsset`, `Transaction`
//! - **Consensus**: `Validator`, `ValidatorList`
//! - **State**: `Account` (base schema plus module extensions), `StateDiff`
//!
//! Every entity here implements [`Codec`] with a fixed schema; see
//! [`crate::codec::schema`] for the identifiers.

use crate::codec::{schema, Codec, FieldReader, FieldWriter};
use crate::crypto;
use crate::errors::CodecError;
use serde::{Deserialize, Serialize};

// =============================================================================
// PRIMITIVES
// =============================================================================

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Block identifier (hash of the encoded header).
pub type BlockId = Hash;

/// Transaction identifier (hash of the encoded transaction).
pub type TransactionId = Hash;

/// A 20-byte account address (truncated hash of the public key).
pub type Address = [u8; 20];

/// A 32-byte network identifier mixed into every signature.
pub type NetworkIdentifier = Hash;

/// Length of an Ed25519 public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of an Ed25519 signature.
pub const SIGNATURE_LENGTH: usize = 64;

/// Length of a seed reveal.
pub const SEED_REVEAL_LENGTH: usize = 16;

/// Header version of the genesis block.
pub const GENESIS_BLOCK_VERSION: u32 = 0;

/// Header version of standard blocks.
pub const BLOCK_VERSION_V2: u32 = 2;

/// Orders addresses by `(length, bytes)`.
///
/// Addresses are fixed-width, but persisted genesis data may come from older
/// encoders, so ordering is always expressed in the general form.
pub fn compare_addresses(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// Asset of a standard (version 2) block header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockHeaderAssetV2 {
    /// Highest block previously forged by this generator.
    pub max_height_previously_forged: u32,
    /// Highest prevoted block at the time of forging.
    pub max_height_prevoted: u32,
    /// Seed reveal committing to the generator's previous reveal.
    pub seed_reveal: Vec<u8>,
}

impl Codec for BlockHeaderAssetV2 {
    const SCHEMA: &'static str = schema::BLOCK_HEADER_ASSET_V2;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_u32(1, self.max_height_previously_forged);
        w.write_u32(2, self.max_height_prevoted);
        w.write_bytes(3, &self.seed_reveal);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            max_height_previously_forged: r.read_u32(1, "maxHeightPreviouslyForged")?,
            max_height_prevoted: r.read_u32(2, "maxHeightPrevoted")?,
            seed_reveal: r.read_bytes(3, "seedReveal")?,
        })
    }
}

/// Asset of the genesis block header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenesisBlockAsset {
    /// Initial accounts, ordered by address.
    pub accounts: Vec<Account>,
    /// Initial delegate addresses, unique and lexicographically ordered.
    pub init_delegates: Vec<Vec<u8>>,
    /// Number of rounds the initial delegates forge before voting applies.
    pub init_rounds: u32,
}

impl Codec for GenesisBlockAsset {
    const SCHEMA: &'static str = schema::GENESIS_BLOCK_HEADER_ASSET;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_repeated_objects(1, &self.accounts);
        w.write_repeated_bytes(2, &self.init_delegates);
        w.write_u32(3, self.init_rounds);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            accounts: r.read_repeated_objects(1, "accounts")?,
            init_delegates: r.read_repeated_bytes(2, "initDelegates")?,
            init_rounds: r.read_u32(3, "initRounds")?,
        })
    }
}

/// Version-dependent header asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockHeaderAsset {
    /// Version 0.
    Genesis(GenesisBlockAsset),
    /// Version 2.
    V2(BlockHeaderAssetV2),
}

impl BlockHeaderAsset {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Genesis(asset) => asset.encode(),
            Self::V2(asset) => asset.encode(),
        }
    }

    /// Decodes an asset with the schema registered for `version`.
    pub fn from_bytes(version: u32, bytes: &[u8]) -> Result<Self, CodecError> {
        match version {
            GENESIS_BLOCK_VERSION => Ok(Self::Genesis(GenesisBlockAsset::decode(bytes)?)),
            BLOCK_VERSION_V2 => Ok(Self::V2(BlockHeaderAssetV2::decode(bytes)?)),
            other => Err(CodecError::UnknownAssetVersion(other)),
        }
    }
}

impl Default for BlockHeaderAsset {
    fn default() -> Self {
        Self::V2(BlockHeaderAssetV2::default())
    }
}

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    /// Seconds since the Unix epoch.
    pub timestamp: u32,
    pub height: u32,
    /// Empty for the genesis block.
    pub previous_block_id: Vec<u8>,
    /// Merkle root of the payload transaction IDs.
    pub transaction_root: Vec<u8>,
    /// Empty for the genesis block.
    pub generator_public_key: Vec<u8>,
    pub reward: u64,
    pub asset: BlockHeaderAsset,
    /// Empty for the genesis block.
    pub signature: Vec<u8>,
}

impl BlockHeader {
    /// Header bytes covered by the generator signature.
    pub fn signing_bytes(&self) -> Vec<u8> {
        SigningHeader(self).encode()
    }

    /// Block ID: hash of the full encoded header.
    pub fn id(&self) -> BlockId {
        crypto::hash(&self.encode())
    }

    pub fn is_genesis(&self) -> bool {
        self.version == GENESIS_BLOCK_VERSION
    }

    pub fn asset_v2(&self) -> Option<&BlockHeaderAssetV2> {
        match &self.asset {
            BlockHeaderAsset::V2(asset) => Some(asset),
            BlockHeaderAsset::Genesis(_) => None,
        }
    }

    pub fn genesis_asset(&self) -> Option<&GenesisBlockAsset> {
        match &self.asset {
            BlockHeaderAsset::Genesis(asset) => Some(asset),
            BlockHeaderAsset::V2(_) => None,
        }
    }

    fn write_unsigned(&self, w: &mut FieldWriter) {
        w.write_u32(1, self.version);
        w.write_u32(2, self.timestamp);
        w.write_u32(3, self.height);
        w.write_bytes(4, &self.previous_block_id);
        w.write_bytes(5, &self.transaction_root);
        w.write_bytes(6, &self.generator_public_key);
        w.write_u64(7, self.reward);
        w.write_bytes(8, &self.asset.to_bytes());
    }
}

impl Codec for BlockHeader {
    const SCHEMA: &'static str = schema::BLOCK_HEADER;

    fn write_fields(&self, w: &mut FieldWriter) {
        self.write_unsigned(w);
        w.write_bytes(9, &self.signature);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        let version = r.read_u32(1, "version")?;
        let timestamp = r.read_u32(2, "timestamp")?;
        let height = r.read_u32(3, "height")?;
        let previous_block_id = r.read_bytes(4, "previousBlockID")?;
        let transaction_root = r.read_bytes(5, "transactionRoot")?;
        let generator_public_key = r.read_bytes(6, "generatorPublicKey")?;
        let reward = r.read_u64(7, "reward")?;
        let asset_bytes = r.read_bytes(8, "asset")?;
        let signature = r.read_bytes(9, "signature")?;
        Ok(Self {
            version,
            timestamp,
            height,
            previous_block_id,
            transaction_root,
            generator_public_key,
            reward,
            asset: BlockHeaderAsset::from_bytes(version, &asset_bytes)?,
            signature,
        })
    }
}

/// `/block/header/signing` view: the header without its signature.
struct SigningHeader<'a>(&'a BlockHeader);

impl SigningHeader<'_> {
    fn encode(&self) -> Vec<u8> {
        let mut w = FieldWriter::new();
        self.0.write_unsigned(&mut w);
        w.into_bytes()
    }
}

/// A block: header plus transaction payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub payload: Vec<Transaction>,
}

impl Block {
    pub fn id(&self) -> BlockId {
        self.header.id()
    }

    /// Sum of the encoded sizes of the payload transactions.
    pub fn payload_length(&self) -> usize {
        self.payload.iter().map(|tx| tx.encode().len()).sum()
    }

    pub fn transaction_ids(&self) -> Vec<TransactionId> {
        self.payload.iter().map(Transaction::id).collect()
    }
}

impl Codec for Block {
    const SCHEMA: &'static str = schema::BLOCK;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_object(1, &self.header);
        w.write_repeated_objects(2, &self.payload);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: r.read_object(1, "header")?,
            payload: r.read_repeated_objects(2, "payload")?,
        })
    }
}

/// Base transaction envelope. The asset is opaque here; typed assets are
/// decoded by the transaction registry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub module_id: u32,
    pub asset_id: u32,
    pub nonce: u64,
    pub fee: u64,
    pub sender_public_key: Vec<u8>,
    pub asset: Vec<u8>,
    pub signatures: Vec<Vec<u8>>,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        crypto::hash(&self.encode())
    }

    /// Transaction bytes without signatures.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut w = FieldWriter::new();
        self.write_unsigned(&mut w);
        w.into_bytes()
    }

    pub fn sender_address(&self) -> Address {
        crypto::address_from_public_key(&self.sender_public_key)
    }

    fn write_unsigned(&self, w: &mut FieldWriter) {
        w.write_u32(1, self.module_id);
        w.write_u32(2, self.asset_id);
        w.write_u64(3, self.nonce);
        w.write_u64(4, self.fee);
        w.write_bytes(5, &self.sender_public_key);
        w.write_bytes(6, &self.asset);
    }
}

impl Codec for Transaction {
    const SCHEMA: &'static str = schema::TRANSACTION;

    fn write_fields(&self, w: &mut FieldWriter) {
        self.write_unsigned(w);
        w.write_repeated_bytes(7, &self.signatures);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            module_id: r.read_u32(1, "moduleID")?,
            asset_id: r.read_u32(2, "assetID")?,
            nonce: r.read_u64(3, "nonce")?,
            fee: r.read_u64(4, "fee")?,
            sender_public_key: r.read_bytes(5, "senderPublicKey")?,
            asset: r.read_bytes(6, "asset")?,
            signatures: r.read_repeated_bytes(7, "signatures")?,
        })
    }
}

// =============================================================================
// CLUSTER B: CONSENSUS
// =============================================================================

/// An account eligible to forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    /// First height at which this validator may forge.
    pub min_active_height: u32,
    pub is_consensus_participant: bool,
}

impl Codec for Validator {
    const SCHEMA: &'static str = schema::STATE_VALIDATOR;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_bytes(1, &self.address);
        w.write_u32(2, self.min_active_height);
        w.write_bool(3, self.is_consensus_participant);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            address: r.read_fixed(1, "address")?,
            min_active_height: r.read_u32(2, "minActiveHeight")?,
            is_consensus_participant: r.read_bool(3, "isConsensusParticipant")?,
        })
    }
}

/// The `/state/validators` consensus-state value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidatorList {
    pub validators: Vec<Validator>,
}

impl Codec for ValidatorList {
    const SCHEMA: &'static str = schema::STATE_VALIDATORS;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_repeated_objects(1, &self.validators);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            validators: r.read_repeated_objects(1, "validators")?,
        })
    }
}

// =============================================================================
// CLUSTER C: STATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenAccount {
    pub balance: u64,
}

impl Codec for TokenAccount {
    const SCHEMA: &'static str = schema::ACCOUNT_TOKEN;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_u64(1, self.balance);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            balance: r.read_u64(1, "balance")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SequenceAccount {
    pub nonce: u64,
}

impl Codec for SequenceAccount {
    const SCHEMA: &'static str = schema::ACCOUNT_SEQUENCE;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_u64(1, self.nonce);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            nonce: r.read_u64(1, "nonce")?,
        })
    }
}

/// Multisignature key registration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeysAccount {
    pub number_of_signatures: u32,
    pub mandatory_keys: Vec<Vec<u8>>,
    pub optional_keys: Vec<Vec<u8>>,
}

impl KeysAccount {
    pub fn is_multisignature(&self) -> bool {
        self.number_of_signatures > 0
    }
}

impl Codec for KeysAccount {
    const SCHEMA: &'static str = schema::ACCOUNT_KEYS;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_u32(1, self.number_of_signatures);
        w.write_repeated_bytes(2, &self.mandatory_keys);
        w.write_repeated_bytes(3, &self.optional_keys);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            number_of_signatures: r.read_u32(1, "numberOfSignatures")?,
            mandatory_keys: r.read_repeated_bytes(2, "mandatoryKeys")?,
            optional_keys: r.read_repeated_bytes(3, "optionalKeys")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DelegateInfo {
    /// Empty when the account is not a registered delegate.
    pub username: String,
    pub total_votes_received: u64,
    pub last_forged_height: u32,
    pub is_banned: bool,
}

impl Codec for DelegateInfo {
    const SCHEMA: &'static str = schema::ACCOUNT_DPOS_DELEGATE;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_string(1, &self.username);
        w.write_u64(2, self.total_votes_received);
        w.write_u32(3, self.last_forged_height);
        w.write_bool(4, self.is_banned);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            username: r.read_string(1, "username")?,
            total_votes_received: r.read_u64(2, "totalVotesReceived")?,
            last_forged_height: r.read_u32(3, "lastForgedHeight")?,
            is_banned: r.read_bool(4, "isBanned")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentVote {
    pub delegate_address: Address,
    pub amount: u64,
}

impl Codec for SentVote {
    const SCHEMA: &'static str = schema::ACCOUNT_DPOS_VOTE;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_bytes(1, &self.delegate_address);
        w.write_u64(2, self.amount);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            delegate_address: r.read_fixed(1, "delegateAddress")?,
            amount: r.read_u64(2, "amount")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unlocking {
    pub delegate_address: Address,
    pub amount: u64,
    pub unvote_height: u32,
}

impl Codec for Unlocking {
    const SCHEMA: &'static str = schema::ACCOUNT_DPOS_UNLOCKING;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_bytes(1, &self.delegate_address);
        w.write_u64(2, self.amount);
        w.write_u32(3, self.unvote_height);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            delegate_address: r.read_fixed(1, "delegateAddress")?,
            amount: r.read_u64(2, "amount")?,
            unvote_height: r.read_u32(3, "unvoteHeight")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DposAccount {
    pub delegate: DelegateInfo,
    pub sent_votes: Vec<SentVote>,
    pub unlocking: Vec<Unlocking>,
}

impl Codec for DposAccount {
    const SCHEMA: &'static str = schema::ACCOUNT_DPOS;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_object(1, &self.delegate);
        w.write_repeated_objects(2, &self.sent_votes);
        w.write_repeated_objects(3, &self.unlocking);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            delegate: r.read_object(1, "delegate")?,
            sent_votes: r.read_repeated_objects(2, "sentVotes")?,
            unlocking: r.read_repeated_objects(3, "unlocking")?,
        })
    }
}

/// An account: the `/account/base` address plus module extensions.
///
/// Accounts are values. Mutation is copy-and-set through the state store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub token: TokenAccount,
    pub sequence: SequenceAccount,
    pub keys: KeysAccount,
    pub dpos: DposAccount,
}

impl Account {
    /// An account with default module values.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

impl Codec for Account {
    const SCHEMA: &'static str = schema::ACCOUNT;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_bytes(1, &self.address);
        w.write_object(2, &self.token);
        w.write_object(3, &self.sequence);
        w.write_object(4, &self.keys);
        w.write_object(5, &self.dpos);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            address: r.read_fixed(1, "address")?,
            token: r.read_object(2, "token")?,
            sequence: r.read_object(3, "sequence")?,
            keys: r.read_object(4, "keys")?,
            dpos: r.read_object(5, "dpos")?,
        })
    }
}

/// A key with the value it held before the block was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Codec for DiffEntry {
    const SCHEMA: &'static str = schema::STATE_DIFF_ENTRY;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_bytes(1, &self.key);
        w.write_bytes(2, &self.value);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            key: r.read_bytes(1, "key")?,
            value: r.read_bytes(2, "value")?,
        })
    }
}

/// State changes produced by applying one block, used to undo it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateDiff {
    /// Keys that existed before, with their previous values.
    pub updated: Vec<DiffEntry>,
    /// Keys that did not exist before.
    pub created: Vec<Vec<u8>>,
    /// Keys removed, with their previous values.
    pub deleted: Vec<DiffEntry>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.created.is_empty() && self.deleted.is_empty()
    }
}

impl Codec for StateDiff {
    const SCHEMA: &'static str = schema::STATE_DIFF;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_repeated_objects(1, &self.updated);
        w.write_repeated_bytes(2, &self.created);
        w.write_repeated_objects(3, &self.deleted);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            updated: r.read_repeated_objects(1, "updated")?,
            created: r.read_repeated_bytes(2, "created")?,
            deleted: r.read_repeated_objects(3, "deleted")?,
        })
    }
}
