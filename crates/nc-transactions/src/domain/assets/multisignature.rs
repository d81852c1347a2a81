//! Multisignature group registration.

use super::{same_kind_from_sender, ApplyContext, AssetHandler};
use crate::domain::errors::{TransactionError, TransactionResult};
use shared_types::codec::{Codec, FieldReader, FieldWriter};
use shared_types::entities::{KeysAccount, Transaction, TransactionId, PUBLIC_KEY_LENGTH};
use shared_types::errors::CodecError;

pub const REGISTER_MULTISIGNATURE_ASSET_SCHEMA: &str = "/keys/register";

pub const MAX_KEYS_COUNT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterMultisignatureAsset {
    pub number_of_signatures: u32,
    pub mandatory_keys: Vec<Vec<u8>>,
    pub optional_keys: Vec<Vec<u8>>,
}

impl RegisterMultisignatureAsset {
    /// Keys in signature order: mandatory first, then optional.
    pub fn all_keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.mandatory_keys.iter().chain(self.optional_keys.iter())
    }

    pub fn keys_count(&self) -> usize {
        self.mandatory_keys.len() + self.optional_keys.len()
    }
}

impl Codec for RegisterMultisignatureAsset {
    const SCHEMA: &'static str = REGISTER_MULTISIGNATURE_ASSET_SCHEMA;

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

fn strictly_sorted(keys: &[Vec<u8>]) -> bool {
    keys.windows(2).all(|pair| pair[0] < pair[1])
}

impl AssetHandler for RegisterMultisignatureAsset {
    const MODULE_ID: u32 = 4;
    const ASSET_ID: u32 = 0;
    const NAME: &'static str = "registerMultisignatureGroup";
    const CONTAINS_UNIQUE_DATA: bool = true;

    fn validate_asset(&self, id: &TransactionId) -> Vec<TransactionError> {
        let mut errors = Vec::new();
        let count = self.keys_count();

        if self.all_keys().any(|key| key.len() != PUBLIC_KEY_LENGTH) {
            errors.push(TransactionError::new(
                id,
                ".asset",
                format!("Keys must be {PUBLIC_KEY_LENGTH} bytes"),
            ));
        }
        if !strictly_sorted(&self.mandatory_keys) {
            errors.push(TransactionError::new(
                id,
                ".asset.mandatoryKeys",
                "Mandatory keys should be sorted lexicographically without duplicates",
            ));
        }
        if !strictly_sorted(&self.optional_keys) {
            errors.push(TransactionError::new(
                id,
                ".asset.optionalKeys",
                "Optional keys should be sorted lexicographically without duplicates",
            ));
        }
        if self
            .mandatory_keys
            .iter()
            .any(|key| self.optional_keys.contains(key))
        {
            errors.push(TransactionError::new(
                id,
                ".asset",
                "Invalid combination of Mandatory and Optional keys. Repeated keys across Mandatory and Optional.",
            ));
        }
        if count == 0 || count > MAX_KEYS_COUNT {
            errors.push(
                TransactionError::new(id, ".asset", "Invalid number of keys")
                    .with_values(count, MAX_KEYS_COUNT),
            );
        }
        let required = self.number_of_signatures as usize;
        if required == 0 || required < self.mandatory_keys.len() || required > count {
            errors.push(
                TransactionError::new(
                    id,
                    ".asset.numberOfSignatures",
                    "The numberOfSignatures must be between the number of mandatory keys and the total number of keys",
                )
                .with_values(required, count),
            );
        }
        errors
    }

    fn apply_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()> {
        let mut sender = ctx.get_sender()?;
        if sender.keys.is_multisignature() {
            return Err(ctx.error(
                ".signatures",
                "Register multisignature only allowed once per account.",
            ));
        }
        sender.keys = KeysAccount {
            number_of_signatures: self.number_of_signatures,
            mandatory_keys: self.mandatory_keys.clone(),
            optional_keys: self.optional_keys.clone(),
        };
        ctx.set_account(sender)
    }

    fn undo_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()> {
        let mut sender = ctx.get_sender()?;
        sender.keys = KeysAccount::default();
        ctx.set_account(sender)
    }

    fn verify_against_other_transactions(
        &self,
        transaction: &Transaction,
        others: &[Transaction],
    ) -> Vec<TransactionError> {
        same_kind_from_sender(transaction, others)
            .map(|_| {
                TransactionError::new(
                    &transaction.id(),
                    ".senderPublicKey",
                    "Register multisignature only allowed once per account.",
                )
            })
            .take(1)
            .collect()
    }
}
