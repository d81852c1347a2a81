//! Chain configuration.

use nc_data_access::DataAccessConfig;
use serde::{Deserialize, Serialize};
use shared_types::entities::NetworkIdentifier;

/// Protocol constants for the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Mixed into every block and transaction signature.
    pub network_identifier: NetworkIdentifier,
    /// Slot length in seconds.
    pub block_time: u32,
    /// Upper bound on the summed encoded size of a block payload.
    pub max_payload_length: usize,
    /// Height before which blocks carry no reward.
    pub reward_offset: u32,
    /// Number of blocks between reward milestones.
    pub reward_distance: u32,
    /// Reward per milestone; the last entry applies forever.
    pub reward_milestones: Vec<u64>,
    /// Size of the active validator set.
    pub number_of_validators: u32,
    /// Header cache bounds for the data access layer.
    pub data_access: DataAccessConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            network_identifier: [0u8; 32],
            block_time: 10,
            max_payload_length: 15 * 1024,
            reward_offset: 2_160,
            reward_distance: 3_000_000,
            reward_milestones: vec![
                500_000_000,
                400_000_000,
                300_000_000,
                200_000_000,
                100_000_000,
            ],
            number_of_validators: 103,
            data_access: DataAccessConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Small validator set and short reward steps for tests.
    pub fn for_testing() -> Self {
        Self {
            network_identifier: [0xAB; 32],
            block_time: 10,
            max_payload_length: 15 * 1024,
            reward_offset: 2,
            reward_distance: 3,
            reward_milestones: vec![100, 200, 300],
            number_of_validators: 3,
            data_access: DataAccessConfig::for_testing(),
        }
    }
}
