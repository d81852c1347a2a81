//! Validator set bookkeeping.

use shared_types::entities::{Address, Validator};
use std::collections::HashMap;

/// Height from which validator set updates take effect.
///
/// Until the genesis delegates have forged `init_rounds` full rounds the set
/// stays frozen.
pub fn bootstrap_threshold(number_of_validators: u32, init_rounds: u32, genesis_height: u32) -> u32 {
    number_of_validators
        .saturating_mul(init_rounds)
        .saturating_add(genesis_height)
}

/// Builds the next validator set.
///
/// Validators already in `previous` keep their `min_active_height`; newcomers
/// become active at `height + 1`.
pub fn merge_validators(
    previous: &[Validator],
    next: &[(Address, bool)],
    height: u32,
) -> Vec<Validator> {
    let known: HashMap<&Address, u32> = previous
        .iter()
        .map(|v| (&v.address, v.min_active_height))
        .collect();

    next.iter()
        .map(|(address, is_consensus_participant)| Validator {
            address: *address,
            min_active_height: known
                .get(address)
                .copied()
                .unwrap_or_else(|| height.saturating_add(1)),
            is_consensus_participant: *is_consensus_participant,
        })
        .collect()
}

/// Round-robin generator for `slot`.
pub fn validator_for_slot(validators: &[Validator], slot: u32) -> Option<&Validator> {
    if validators.is_empty() {
        return None;
    }
    validators.get(slot as usize % validators.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(byte: u8, min_active_height: u32) -> Validator {
        Validator {
            address: [byte; 20],
            min_active_height,
            is_consensus_participant: true,
        }
    }

    #[test]
    fn test_merge_preserves_min_active_height() {
        let previous = vec![validator(1, 5), validator(2, 9)];
        let next = vec![([2u8; 20], true), ([3u8; 20], false)];

        let merged = merge_validators(&previous, &next, 100);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].min_active_height, 9);
        assert_eq!(merged[1].min_active_height, 101);
        assert!(!merged[1].is_consensus_participant);
    }

    #[test]
    fn test_round_robin() {
        let validators = vec![validator(1, 0), validator(2, 0), validator(3, 0)];
        assert_eq!(validator_for_slot(&validators, 0).unwrap().address, [1u8; 20]);
        assert_eq!(validator_for_slot(&validators, 4).unwrap().address, [2u8; 20]);
        assert!(validator_for_slot(&[], 4).is_none());
    }

    #[test]
    fn test_bootstrap_threshold() {
        assert_eq!(bootstrap_threshold(103, 3, 0), 309);
        assert_eq!(bootstrap_threshold(3, 3, 10), 19);
    }
}
