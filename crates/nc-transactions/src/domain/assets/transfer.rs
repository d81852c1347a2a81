//! Token transfer.

use super::{ApplyContext, AssetHandler};
use crate::domain::errors::{TransactionError, TransactionResult};
use shared_types::codec::{Codec, FieldReader, FieldWriter};
use shared_types::entities::{Address, TransactionId};
use shared_types::errors::CodecError;

pub const TRANSFER_ASSET_SCHEMA: &str = "/token/transfer";

/// Maximum length of the free-form `data` field in bytes.
pub const MAX_TRANSFER_DATA_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferAsset {
    pub amount: u64,
    pub recipient_address: Address,
    pub data: String,
}

impl Codec for TransferAsset {
    const SCHEMA: &'static str = TRANSFER_ASSET_SCHEMA;

    fn write_fields(&self, w: &mut FieldWriter) {
        w.write_u64(1, self.amount);
        w.write_bytes(2, &self.recipient_address);
        w.write_string(3, &self.data);
    }

    fn read_fields(r: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            amount: r.read_u64(1, "amount")?,
            recipient_address: r.read_fixed(2, "recipientAddress")?,
            data: r.read_string(3, "data")?,
        })
    }
}

impl AssetHandler for TransferAsset {
    const MODULE_ID: u32 = 2;
    const ASSET_ID: u32 = 0;
    const NAME: &'static str = "transfer";

    fn validate_asset(&self, id: &TransactionId) -> Vec<TransactionError> {
        let mut errors = Vec::new();
        if self.amount == 0 {
            errors.push(TransactionError::new(
                id,
                ".asset.amount",
                "Amount must be greater than zero",
            ));
        }
        if self.data.len() > MAX_TRANSFER_DATA_LENGTH {
            errors.push(
                TransactionError::new(id, ".asset.data", "Data is too long")
                    .with_values(self.data.len(), MAX_TRANSFER_DATA_LENGTH),
            );
        }
        errors
    }

    fn apply_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()> {
        let mut sender = ctx.get_sender()?;
        ctx.debit(&mut sender, self.amount, ".asset.amount")?;
        ctx.set_account(sender)?;

        let mut recipient = ctx.get_account(&self.recipient_address)?;
        ctx.credit(&mut recipient, self.amount, ".asset.amount")?;
        ctx.set_account(recipient)
    }

    fn undo_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()> {
        let mut recipient = ctx.get_account(&self.recipient_address)?;
        recipient.token.balance = recipient
            .token
            .balance
            .checked_sub(self.amount)
            .ok_or_else(|| ctx.error(".asset.amount", "Recipient balance underflow"))?;
        ctx.set_account(recipient)?;

        let mut sender = ctx.get_sender()?;
        ctx.credit(&mut sender, self.amount, ".asset.amount")?;
        ctx.set_account(sender)
    }
}
