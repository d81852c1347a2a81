//! Transaction lifecycle
//!
//! The generic contract every transaction goes through, whatever its asset:
//!
//! ```text
//! validate ──▶ verify_signatures ──▶ apply ──▶ (undo)
//!                   │
//!                   └─ multisignature: Pending until enough signatures
//! ```
//!
//! Base rules (nonce, fee, signatures) live here; asset rules are dispatched
//! through the registry in [`crate::domain::assets`].

use crate::domain::assets::{ApplyContext, AssetKind, TransactionAsset};
use crate::domain::{
    MultisignatureStatus, Status, TransactionConfig, TransactionError, TransactionResponse,
    TransactionResult,
};
use nc_state_store::domain::keys::CHAIN_STATE_BURNT_FEE;
use nc_state_store::StateStore;
use shared_types::codec::Codec;
use shared_types::crypto;
use shared_types::entities::{Transaction, TransactionId, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct TransactionProcessor {
    config: TransactionConfig,
}

impl TransactionProcessor {
    pub fn new(config: TransactionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    // === FEES AND EXPIRY ===

    /// Encoded size in bytes.
    pub fn size(transaction: &Transaction) -> usize {
        transaction.encode().len()
    }

    /// `minFeePerByte * size + baseFee` for the transaction's kind.
    pub fn min_fee(&self, transaction: &Transaction) -> u64 {
        let size = Self::size(transaction) as u64;
        self.config
            .min_fee_per_byte
            .saturating_mul(size)
            .saturating_add(self.config.base_fee(transaction.module_id, transaction.asset_id))
    }

    /// Whether a transaction received at `received_at` has outlived the pool
    /// timeout at `now` (both unix seconds).
    pub fn is_expired(&self, received_at: u64, now: u64) -> bool {
        now.saturating_sub(received_at) > self.config.expiry_timeout_secs
    }

    pub fn contains_unique_data(transaction: &Transaction) -> bool {
        AssetKind::of(transaction).is_some_and(|kind| kind.contains_unique_data())
    }

    // === VALIDATE ===

    /// Stateless checks on the envelope and the asset.
    pub fn validate(&self, transaction: &Transaction) -> TransactionResult<TransactionAsset> {
        let id = transaction.id();
        let mut errors = Vec::new();

        if transaction.sender_public_key.len() != PUBLIC_KEY_LENGTH {
            errors.push(TransactionError::new(
                &id,
                ".senderPublicKey",
                format!("Sender public key must be {PUBLIC_KEY_LENGTH} bytes"),
            ));
        }
        if transaction.signatures.is_empty() {
            errors.push(TransactionError::new(&id, ".signatures", "Signatures are required"));
        }
        for (index, signature) in transaction.signatures.iter().enumerate() {
            if !signature.is_empty() && signature.len() != SIGNATURE_LENGTH {
                errors.push(TransactionError::new(
                    &id,
                    format!(".signatures.{index}"),
                    format!("Signature must be empty or {SIGNATURE_LENGTH} bytes"),
                ));
            }
        }
        let min_fee = self.min_fee(transaction);
        if transaction.fee < min_fee {
            errors.push(
                TransactionError::new(&id, ".fee", "Insufficient transaction fee")
                    .with_values(transaction.fee, min_fee),
            );
        }

        match TransactionAsset::from_transaction(transaction) {
            Ok(asset) => {
                errors.extend(asset.validate_asset(&id));
                if errors.is_empty() {
                    Ok(asset)
                } else {
                    Err(errors)
                }
            }
            Err(asset_errors) => {
                errors.extend(asset_errors);
                Err(errors)
            }
        }
    }

    /// Validation hook used before a transaction enters the pool or a block.
    pub fn validate_transaction(&self, transaction: &Transaction) -> TransactionResult<()> {
        self.validate(transaction).map(|_| ())
    }

    // === APPLY / UNDO ===

    fn context<'a>(&self, id: TransactionId, transaction: &Transaction, store: &'a mut StateStore) -> ApplyContext<'a> {
        let height = store
            .chain
            .last_block_header()
            .map(|header| header.height + 1)
            .unwrap_or(0);
        ApplyContext {
            id,
            sender_address: transaction.sender_address(),
            height,
            min_remaining_balance: self.config.min_remaining_balance,
            store,
        }
    }

    /// Applies nonce, fee and asset effects to `store`.
    ///
    /// On error `store` may hold partial writes; callers snapshot first.
    pub fn apply(&self, transaction: &Transaction, store: &mut StateStore) -> TransactionResult<()> {
        let asset = TransactionAsset::from_transaction(transaction)?;
        let id = transaction.id();
        let min_fee = self.min_fee(transaction);
        let mut ctx = self.context(id, transaction, store);

        let mut sender = ctx.get_sender()?;
        if sender.sequence.nonce != transaction.nonce {
            return Err(vec![TransactionError::new(
                &id,
                ".nonce",
                "Incompatible transaction nonce for account",
            )
            .with_values(transaction.nonce, sender.sequence.nonce)]);
        }
        ctx.debit(&mut sender, transaction.fee, ".fee")?;
        sender.sequence.nonce += 1;
        ctx.set_account(sender)?;

        asset.apply_asset(&mut ctx)?;
        self.adjust_burnt_fee(&mut ctx, min_fee, true)?;
        trace!(id = %hex::encode(id), "Transaction applied");
        Ok(())
    }

    /// Reverts [`apply`](Self::apply).
    pub fn undo(&self, transaction: &Transaction, store: &mut StateStore) -> TransactionResult<()> {
        let asset = TransactionAsset::from_transaction(transaction)?;
        let id = transaction.id();
        let min_fee = self.min_fee(transaction);
        let mut ctx = self.context(id, transaction, store);
        // the block being undone is the tip itself
        ctx.height = ctx.height.saturating_sub(1);

        asset.undo_asset(&mut ctx)?;

        let mut sender = ctx.get_sender()?;
        if sender.sequence.nonce != transaction.nonce + 1 {
            return Err(vec![TransactionError::new(
                &id,
                ".nonce",
                "Incompatible transaction nonce for undo",
            )
            .with_values(sender.sequence.nonce, transaction.nonce + 1)]);
        }
        sender.sequence.nonce -= 1;
        ctx.credit(&mut sender, transaction.fee, ".fee")?;
        ctx.set_account(sender)?;
        self.adjust_burnt_fee(&mut ctx, min_fee, false)
    }

    fn adjust_burnt_fee(&self, ctx: &mut ApplyContext<'_>, amount: u64, burn: bool) -> TransactionResult<()> {
        let current = ctx
            .store
            .chain
            .get(CHAIN_STATE_BURNT_FEE)
            .map_err(|e| vec![TransactionError::from_store(&ctx.id, e)])?
            .and_then(|bytes| <[u8; 8]>::try_from(bytes.as_slice()).ok())
            .map(u64::from_be_bytes)
            .unwrap_or(0);
        let next = if burn {
            current.saturating_add(amount)
        } else {
            current.saturating_sub(amount)
        };
        ctx.store
            .chain
            .set(CHAIN_STATE_BURNT_FEE, next.to_be_bytes().to_vec())
            .map_err(|e| vec![TransactionError::from_store(&ctx.id, e)])
    }

    // === SIGNATURES ===

    /// Signature readiness of `transaction` against the sender's key set.
    pub fn verify_signatures(
        &self,
        transaction: &Transaction,
        store: &mut StateStore,
    ) -> (MultisignatureStatus, Vec<TransactionError>) {
        let id = transaction.id();
        let message = transaction.signing_bytes();

        match self.signature_group(transaction, store) {
            Ok(Some(group)) => self.check_group(&id, &message, &transaction.signatures, &group),
            Ok(None) => {
                if transaction.signatures.len() != 1 {
                    return (
                        MultisignatureStatus::Fail,
                        vec![TransactionError::new(
                            &id,
                            ".signatures",
                            "Transactions from non-multisignature accounts must have exactly one signature",
                        )],
                    );
                }
                if self.verify(&message, &transaction.signatures[0], &transaction.sender_public_key) {
                    (MultisignatureStatus::NonMultisignature, Vec::new())
                } else {
                    (
                        MultisignatureStatus::Fail,
                        vec![TransactionError::new(&id, ".signatures.0", "Failed to verify signature")],
                    )
                }
            }
            Err(errors) => (MultisignatureStatus::Fail, errors),
        }
    }

    /// Adds one member signature to a multisignature transaction.
    ///
    /// Duplicate submissions are rejected. Adding a signature changes the
    /// transaction id.
    pub fn add_multisignature(
        &self,
        transaction: &mut Transaction,
        store: &mut StateStore,
        public_key: &[u8],
        signature: Vec<u8>,
    ) -> Result<MultisignatureStatus, TransactionError> {
        let id = transaction.id();
        let group = self
            .signature_group(transaction, store)
            .map_err(|errors| {
                errors.into_iter().next().unwrap_or_else(|| {
                    TransactionError::new(&id, ".asset", "Failed to resolve signature group")
                })
            })?
            .ok_or_else(|| {
                TransactionError::new(&id, ".senderPublicKey", "Sender is not a multisignature account")
            })?;

        let index = group
            .keys
            .iter()
            .position(|key| key.as_slice() == public_key)
            .ok_or_else(|| {
                TransactionError::new(
                    &id,
                    ".signatures",
                    "Public key is not a member of the multisignature group",
                )
            })?;

        if transaction.signatures.len() < group.keys.len() {
            transaction.signatures.resize(group.keys.len(), Vec::new());
        }
        if !transaction.signatures[index].is_empty() {
            return Err(TransactionError::new(
                &id,
                format!(".signatures.{index}"),
                "Encountered duplicate signature in transaction",
            ));
        }
        if !self.verify(&transaction.signing_bytes(), &signature, public_key) {
            return Err(TransactionError::new(
                &id,
                format!(".signatures.{index}"),
                "Failed to verify signature",
            ));
        }
        transaction.signatures[index] = signature;
        debug!(id = %hex::encode(id), index, "Multisignature added");
        Ok(self.verify_signatures(transaction, store).0)
    }

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        crypto::verify_data(&self.config.network_identifier, message, signature, public_key)
    }

    /// The keys that must sign `transaction`, or `None` for a single signer.
    fn signature_group(
        &self,
        transaction: &Transaction,
        store: &mut StateStore,
    ) -> TransactionResult<Option<SignatureGroup>> {
        if AssetKind::of(transaction) == Some(AssetKind::RegisterMultisignature) {
            let TransactionAsset::RegisterMultisignature(asset) =
                TransactionAsset::from_transaction(transaction)?
            else {
                return Ok(None);
            };
            // the sender signs first, then every member
            let keys: Vec<Vec<u8>> = std::iter::once(transaction.sender_public_key.clone())
                .chain(asset.all_keys().cloned())
                .collect();
            return Ok(Some(SignatureGroup {
                mandatory: keys.len(),
                required: keys.len(),
                keys,
            }));
        }

        let sender = store
            .account
            .get_or_default(&transaction.sender_address())
            .map_err(|e| vec![TransactionError::from_store(&transaction.id(), e)])?;
        if !sender.keys.is_multisignature() {
            return Ok(None);
        }
        Ok(Some(SignatureGroup {
            mandatory: sender.keys.mandatory_keys.len(),
            required: sender.keys.number_of_signatures as usize,
            keys: sender
                .keys
                .mandatory_keys
                .iter()
                .chain(sender.keys.optional_keys.iter())
                .cloned()
                .collect(),
        }))
    }

    fn check_group(
        &self,
        id: &TransactionId,
        message: &[u8],
        signatures: &[Vec<u8>],
        group: &SignatureGroup,
    ) -> (MultisignatureStatus, Vec<TransactionError>) {
        if signatures.len() > group.keys.len() {
            return (
                MultisignatureStatus::Fail,
                vec![TransactionError::new(id, ".signatures", "More signatures than keys")
                    .with_values(signatures.len(), group.keys.len())],
            );
        }

        let mut present = 0usize;
        let mut missing_mandatory = false;
        for (index, key) in group.keys.iter().enumerate() {
            let signature = signatures.get(index).map(Vec::as_slice).unwrap_or_default();
            if signature.is_empty() {
                missing_mandatory |= index < group.mandatory;
                continue;
            }
            if !self.verify(message, signature, key) {
                return (
                    MultisignatureStatus::Fail,
                    vec![TransactionError::new(
                        id,
                        format!(".signatures.{index}"),
                        "Failed to verify signature",
                    )],
                );
            }
            present += 1;
        }

        if present > group.required {
            return (
                MultisignatureStatus::Fail,
                vec![TransactionError::new(id, ".signatures", "Too many signatures")
                    .with_values(present, group.required)],
            );
        }
        if missing_mandatory || present < group.required {
            return (MultisignatureStatus::Pending, Vec::new());
        }
        (MultisignatureStatus::Ready, Vec::new())
    }

    // === BATCH CHECKS ===

    pub fn verify_against_other_transactions(
        &self,
        transaction: &Transaction,
        others: &[Transaction],
    ) -> Vec<TransactionError> {
        match TransactionAsset::from_transaction(transaction) {
            Ok(asset) => asset.verify_against_other_transactions(transaction, others),
            Err(errors) => errors,
        }
    }

    pub fn validate_transactions(&self, transactions: &[Transaction]) -> Vec<TransactionResponse> {
        transactions
            .iter()
            .map(|tx| match self.validate(tx) {
                Ok(_) => TransactionResponse::ok(tx.id()),
                Err(errors) => TransactionResponse::fail(tx.id(), errors),
            })
            .collect()
    }

    /// Applies each transaction in order. Failed ones are rolled back and do
    /// not affect the rest.
    pub fn apply_transactions(
        &self,
        transactions: &[Transaction],
        store: &mut StateStore,
    ) -> Vec<TransactionResponse> {
        transactions
            .iter()
            .map(|tx| self.apply_isolated(tx, store))
            .collect()
    }

    /// Signature status, conflicts with the rest of the batch, then a trial
    /// application.
    pub fn verify_transactions(
        &self,
        transactions: &[Transaction],
        store: &mut StateStore,
    ) -> Vec<TransactionResponse> {
        transactions
            .iter()
            .map(|tx| {
                let id = tx.id();
                let (status, mut errors) = self.verify_signatures(tx, store);
                errors.extend(self.verify_against_other_transactions(tx, transactions));
                if !errors.is_empty() {
                    return TransactionResponse::fail(id, errors);
                }
                match status.as_status() {
                    Status::Pending => TransactionResponse::pending(id),
                    Status::Fail => TransactionResponse::fail(
                        id,
                        vec![TransactionError::new(&id, ".signatures", "Signature check failed")],
                    ),
                    Status::Ok => self.apply_isolated(tx, store),
                }
            })
            .collect()
    }

    fn apply_isolated(&self, transaction: &Transaction, store: &mut StateStore) -> TransactionResponse {
        let id = transaction.id();
        store.create_snapshot();
        match self.apply(transaction, store) {
            Ok(()) => TransactionResponse::ok(id),
            Err(errors) => {
                if let Err(e) = store.restore_snapshot() {
                    return TransactionResponse::fail(id, vec![TransactionError::from_store(&id, e)]);
                }
                debug!(id = %hex::encode(id), errors = errors.len(), "Transaction failed to apply");
                TransactionResponse::fail(id, errors)
            }
        }
    }
}

struct SignatureGroup {
    /// Signature order.
    keys: Vec<Vec<u8>>,
    /// Leading keys whose signatures are always required.
    mandatory: usize,
    required: usize,
}

#[cfg(test)]
mod tests;
