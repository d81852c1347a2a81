//! Stateless block header validation.
//!
//! Structural problems are collected as [`FieldError`]s so a caller sees every
//! offending field at once. Signature, reward and payload checks return the
//! first failure.

use crate::domain::config::ChainConfig;
use crate::domain::errors::{ChainError, ChainResult, FieldError};
use crate::domain::reward::RewardSchedule;
use shared_types::crypto;
use shared_types::entities::{
    compare_addresses, Block, BlockHeader, BlockHeaderAsset, GENESIS_BLOCK_VERSION,
    BLOCK_VERSION_V2, PUBLIC_KEY_LENGTH, SEED_REVEAL_LENGTH, SIGNATURE_LENGTH,
};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Minimum rounds the genesis validator set stays in charge.
pub const MIN_INIT_ROUNDS: u32 = 3;

const HASH_LENGTH: usize = 32;

/// Stateless validation logic for blocks.
pub struct BlockValidator;

impl BlockValidator {
    /// Structural checks for a genesis block.
    pub fn validate_genesis_block_header(block: &Block) -> ChainResult<()> {
        let header = &block.header;
        let mut errors = Vec::new();

        if header.version != GENESIS_BLOCK_VERSION {
            errors.push(FieldError::new(
                ".version",
                format!("must be {GENESIS_BLOCK_VERSION}"),
            ));
        }
        if !header.previous_block_id.is_empty() {
            errors.push(FieldError::new(".previousBlockID", "must be empty"));
        }
        if !header.generator_public_key.is_empty() {
            errors.push(FieldError::new(".generatorPublicKey", "must be empty"));
        }
        if header.reward != 0 {
            errors.push(FieldError::new(".reward", "must be 0"));
        }
        if !header.signature.is_empty() {
            errors.push(FieldError::new(".signature", "must be empty"));
        }
        if header.transaction_root != crypto::hash(&[]) {
            errors.push(FieldError::new(
                ".transactionRoot",
                "must be the hash of empty bytes",
            ));
        }
        if !block.payload.is_empty() {
            errors.push(FieldError::new(".payload", "must be empty"));
        }

        match &header.asset {
            BlockHeaderAsset::Genesis(asset) => {
                if asset.init_rounds < MIN_INIT_ROUNDS {
                    errors.push(FieldError::new(
                        ".asset.initRounds",
                        format!("must be at least {MIN_INIT_ROUNDS}"),
                    ));
                }
                if !is_strictly_ascending(&asset.init_delegates, |a, b| a.cmp(b)) {
                    errors.push(FieldError::new(
                        ".asset.initDelegates",
                        "must be unique and lexicographically ordered",
                    ));
                }
                let addresses: Vec<&[u8]> =
                    asset.accounts.iter().map(|a| &a.address[..]).collect();
                if !is_strictly_ascending(&addresses, |a, b| compare_addresses(a, b)) {
                    errors.push(FieldError::new(
                        ".asset.accounts",
                        "must be unique and ordered by address",
                    ));
                }
            }
            BlockHeaderAsset::V2(_) => {
                errors.push(FieldError::new(".asset", "must be a genesis asset"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ChainError::Validation(errors))
        }
    }

    /// Structural checks for a non-genesis header and its signature, reward
    /// bound and payload.
    pub fn validate_block_header(
        block: &Block,
        config: &ChainConfig,
        reward: &RewardSchedule,
    ) -> ChainResult<()> {
        let header = &block.header;
        Self::validate_header_schema(header)?;

        if !crypto::verify_data(
            &config.network_identifier,
            &header.signing_bytes(),
            &header.signature,
            &header.generator_public_key,
        ) {
            return Err(ChainError::Validation(vec![FieldError::new(
                ".signature",
                "invalid block signature",
            )]));
        }

        let expected = reward.calculate_default_reward(header.height);
        if header.reward > expected {
            return Err(ChainError::InvalidReward {
                actual: header.reward,
                expected,
            });
        }

        Self::validate_payload(block, config)
    }

    fn validate_header_schema(header: &BlockHeader) -> ChainResult<()> {
        let mut errors = Vec::new();

        if header.version != BLOCK_VERSION_V2 {
            errors.push(FieldError::new(
                ".version",
                format!("must be {BLOCK_VERSION_V2}"),
            ));
        }
        if header.previous_block_id.len() != HASH_LENGTH {
            errors.push(FieldError::new(
                ".previousBlockID",
                format!("must be {HASH_LENGTH} bytes"),
            ));
        }
        if header.transaction_root.len() != HASH_LENGTH {
            errors.push(FieldError::new(
                ".transactionRoot",
                format!("must be {HASH_LENGTH} bytes"),
            ));
        }
        if header.generator_public_key.len() != PUBLIC_KEY_LENGTH {
            errors.push(FieldError::new(
                ".generatorPublicKey",
                format!("must be {PUBLIC_KEY_LENGTH} bytes"),
            ));
        }
        if header.signature.len() != SIGNATURE_LENGTH {
            errors.push(FieldError::new(
                ".signature",
                format!("must be {SIGNATURE_LENGTH} bytes"),
            ));
        }
        match header.asset_v2() {
            Some(asset) if asset.seed_reveal.len() != SEED_REVEAL_LENGTH => {
                errors.push(FieldError::new(
                    ".asset.seedReveal",
                    format!("must be {SEED_REVEAL_LENGTH} bytes"),
                ));
            }
            Some(_) => {}
            None => errors.push(FieldError::new(".asset", "must be a v2 asset")),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ChainError::Validation(errors))
        }
    }

    fn validate_payload(block: &Block, config: &ChainConfig) -> ChainResult<()> {
        let mut seen = HashSet::with_capacity(block.payload.len());
        let ids = block.transaction_ids();
        for id in &ids {
            if !seen.insert(*id) {
                return Err(ChainError::Validation(vec![FieldError::new(
                    ".payload",
                    format!("duplicate transaction {}", hex::encode(id)),
                )]));
            }
        }

        let length = block.payload_length();
        if length > config.max_payload_length {
            return Err(ChainError::Validation(vec![FieldError::new(
                ".payload",
                format!(
                    "payload length {length} exceeds maximum {}",
                    config.max_payload_length
                ),
            )]));
        }

        if block.header.transaction_root != crypto::merkle_root(&ids) {
            return Err(ChainError::Validation(vec![FieldError::new(
                ".transactionRoot",
                "does not match the payload",
            )]));
        }
        Ok(())
    }

    /// The block's parent must be the current tip.
    pub fn verify_previous_block_id(header: &BlockHeader, last_block: &BlockHeader) -> ChainResult<()> {
        let expected = last_block.id();
        if header.previous_block_id != expected {
            return Err(ChainError::InvalidPreviousBlock {
                expected: hex::encode(expected),
                actual: hex::encode(&header.previous_block_id),
            });
        }
        Ok(())
    }

    /// Slot must advance past the last block and not lie in the future.
    pub fn validate_block_slot(
        block_slot: u32,
        last_block_slot: u32,
        current_slot: u32,
    ) -> ChainResult<()> {
        if block_slot > current_slot || block_slot <= last_block_slot {
            return Err(ChainError::InvalidSlot {
                slot: block_slot,
                last_slot: last_block_slot,
                current_slot,
            });
        }
        Ok(())
    }

    /// Seed reveal check against the generator's previous block.
    ///
    /// `previous_headers` is newest first. A generator with no earlier block
    /// in the window has nothing to reveal against.
    pub fn is_valid_seed_reveal(header: &BlockHeader, previous_headers: &[BlockHeader]) -> bool {
        let Some(asset) = header.asset_v2() else {
            return false;
        };
        let previous = previous_headers.iter().find(|candidate| {
            candidate.height < header.height
                && candidate.generator_public_key == header.generator_public_key
        });
        match previous.and_then(BlockHeader::asset_v2) {
            Some(previous_asset) => {
                crypto::seed_reveal_commitment(&asset.seed_reveal) == previous_asset.seed_reveal
            }
            None => true,
        }
    }
}

fn is_strictly_ascending<T, F>(items: &[T], mut compare: F) -> bool
where
    F: FnMut(&T, &T) -> Ordering,
{
    items
        .windows(2)
        .all(|pair| compare(&pair[0], &pair[1]) == Ordering::Less)
}
