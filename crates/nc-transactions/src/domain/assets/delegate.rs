//! Delegate registration.

use super::{same_kind_from_sender, ApplyContext, AssetHandler, AssetKind, TransactionAsset};
use crate::domain::errors::{TransactionError, TransactionResult};
use shared_types::codec::{Codec, FieldReader, FieldWriter};
use shared_types::entities::{Transaction, TransactionId};
use shared_types::errors::CodecError;

pub const REGISTER_DELEGATE_ASSET_SCHEMA: &str = "/dpos/delegate/register";

pub const MAX_USERNAME_LENGTH: usize = 20;

const USERNAME_KEY_PREFIX: &str = "dpos:username:";

/// Chain-state key recording which address owns `username`.
pub fn username_key(username: &str) -> String {
    format!("{USERNAME_KEY_PREFIX}{username}")
}

fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= MAX_USERNAME_LENGTH
        && username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "!@$&_.".contains(c))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterDelegateAsset {
    pub username: String,
}

impl Codec for RegisterDelegateAsset {
    const SCHEMA: &'static str = REGISTER_DELEGATE_ASSET_SCHEMA;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_string(1, &self.username);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            username: r.read_string(1, "username")?,
        })
    }
}

impl AssetHandler for RegisterDelegateAsset {
    const MODULE_ID: u32 = 5;
    const ASSET_ID: u32 = 0;
    const NAME: &'static str = "registerDelegate";
    const CONTAINS_UNIQUE_DATA: bool = true;

    fn validate_asset(&self, id: &TransactionId) -> Vec<TransactionError> {
        if is_valid_username(&self.username) {
            return Vec::new();
        }
        vec![TransactionError::new(
            id,
            ".asset.username",
            "The username is in unsupported format",
        )
        .with_values(&self.username, "[a-z0-9!@$&_.]{1,20}")]
    }

    fn apply_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()> {
        let mut sender = ctx.get_sender()?;
        if !sender.dpos.delegate.username.is_empty() {
            return Err(ctx.error(".senderPublicKey", "Account is already a delegate"));
        }

        let key = username_key(&self.username);
        let owner = ctx
            .store
            .chain
            .get(&key)
            .map_err(|e| vec![TransactionError::from_store(&ctx.id, e)])?;
        if owner.is_some_and(|owner| !owner.is_empty()) {
            return Err(ctx.error(".asset.username", "Username is not unique"));
        }

        sender.dpos.delegate.username = self.username.clone();
        sender.dpos.delegate.last_forged_height = ctx.height;
        let address = sender.address;
        ctx.set_account(sender)?;
        ctx.store
            .chain
            .set(&key, address.to_vec())
            .map_err(|e| vec![TransactionError::from_store(&ctx.id, e)])
    }

    fn undo_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()> {
        let mut sender = ctx.get_sender()?;
        sender.dpos.delegate.username.clear();
        sender.dpos.delegate.last_forged_height = 0;
        ctx.set_account(sender)?;
        ctx.store
            .chain
            .set(&username_key(&self.username), Vec::new())
            .map_err(|e| vec![TransactionError::from_store(&ctx.id, e)])
    }

    fn verify_against_other_transactions(
        &self,
        transaction: &Transaction,
        others: &[Transaction],
    ) -> Vec<TransactionError> {
        let id = transaction.id();
        let mut errors = Vec::new();
        if same_kind_from_sender(transaction, others).next().is_some() {
            errors.push(TransactionError::new(
                &id,
                ".senderPublicKey",
                "Sender is already registering as a delegate",
            ));
        }
        let username_taken = others
            .iter()
            .filter(|other| AssetKind::of(other) == Some(AssetKind::RegisterDelegate))
            .filter(|other| other.id() != id)
            .filter_map(|other| match TransactionAsset::from_transaction(other) {
                Ok(TransactionAsset::RegisterDelegate(asset)) => Some(asset.username),
                _ => None,
            })
            .any(|username| username == self.username);
        if username_taken {
            errors.push(TransactionError::new(
                &id,
                ".asset.username",
                "Username is being registered by another transaction",
            ));
        }
        errors
    }
}
