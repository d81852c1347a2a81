//! Fee and expiry parameters.

use serde::{Deserialize, Serialize};
use shared_types::entities::NetworkIdentifier;

/// Seconds an unconfirmed transaction may stay in the pool.
pub const UNCONFIRMED_TRANSACTION_TIMEOUT: u64 = 10_800;

/// Extra fee charged for a specific transaction type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseFee {
    pub module_id: u32,
    pub asset_id: u32,
    pub base_fee: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    pub network_identifier: NetworkIdentifier,
    /// Fee charged per encoded byte.
    pub min_fee_per_byte: u64,
    pub base_fees: Vec<BaseFee>,
    /// Balance an account must keep after paying fees and transfers.
    pub min_remaining_balance: u64,
    pub expiry_timeout_secs: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            network_identifier: [0u8; 32],
            min_fee_per_byte: 1_000,
            base_fees: vec![BaseFee {
                module_id: 5,
                asset_id: 0,
                base_fee: 1_000_000_000,
            }],
            min_remaining_balance: 5_000_000,
            expiry_timeout_secs: UNCONFIRMED_TRANSACTION_TIMEOUT,
        }
    }
}

impl TransactionConfig {
    pub fn for_testing() -> Self {
        Self {
            network_identifier: [0xAB; 32],
            min_fee_per_byte: 10,
            base_fees: vec![BaseFee {
                module_id: 5,
                asset_id: 0,
                base_fee: 1_000,
            }],
            min_remaining_balance: 100,
            ..Self::default()
        }
    }

    pub fn base_fee(&self, module_id: u32, asset_id: u32) -> u64 {
        self.base_fees
            .iter()
            .find(|fee| fee.module_id == module_id && fee.asset_id == asset_id)
            .map(|fee| fee.base_fee)
            .unwrap_or(0)
    }
}
