//! Transaction asset registry.
//!
//! Every transaction kind is a `(moduleID, assetID)` pair mapped to one
//! variant of [`TransactionAsset`]. The registry is closed: unknown pairs are
//! rejected at validation.
//!
//! | Kind | moduleID | assetID | Unique data |
//! |------|----------|---------|-------------|
//! | transfer | 2 | 0 | no |
//! | register multisignature | 4 | 0 | yes |
//! | register delegate | 5 | 0 | yes |
//! | vote | 5 | 1 | no |

pub mod delegate;
pub mod multisignature;
pub mod transfer;
pub mod vote;

use crate::domain::errors::{TransactionError, TransactionResult};
use nc_state_store::StateStore;
use shared_types::codec::Codec;
use shared_types::entities::{Account, Address, Transaction, TransactionId};

pub use delegate::RegisterDelegateAsset;
pub use multisignature::RegisterMultisignatureAsset;
pub use transfer::TransferAsset;
pub use vote::{VoteAsset, VoteEntry};

/// State handed to an asset while it is applied or undone.
pub struct ApplyContext<'a> {
    pub id: TransactionId,
    pub sender_address: Address,
    /// Height of the block the transaction is applied in.
    pub height: u32,
    pub min_remaining_balance: u64,
    pub store: &'a mut StateStore,
}

impl ApplyContext<'_> {
    pub fn error(&self, path: &str, message: impl Into<String>) -> Vec<TransactionError> {
        vec![TransactionError::new(&self.id, path, message)]
    }

    pub fn get_account(&mut self, address: &Address) -> TransactionResult<Account> {
        self.store
            .account
            .get_or_default(address)
            .map_err(|e| vec![TransactionError::from_store(&self.id, e)])
    }

    pub fn get_sender(&mut self) -> TransactionResult<Account> {
        let address = self.sender_address;
        self.get_account(&address)
    }

    pub fn set_account(&mut self, account: Account) -> TransactionResult<()> {
        self.store
            .account
            .set(account.address, account)
            .map_err(|e| vec![TransactionError::from_store(&self.id, e)])
    }

    /// Debits `amount` from `account`, keeping the minimum remaining balance.
    pub fn debit(&self, account: &mut Account, amount: u64, path: &str) -> TransactionResult<()> {
        let remaining = account
            .token
            .balance
            .checked_sub(amount)
            .filter(|remaining| *remaining >= self.min_remaining_balance);
        match remaining {
            Some(remaining) => {
                account.token.balance = remaining;
                Ok(())
            }
            None => Err(vec![TransactionError::new(
                &self.id,
                path,
                format!(
                    "Account does not have enough minimum remaining balance: {}",
                    hex::encode(account.address)
                ),
            )
            .with_values(account.token.balance, amount)]),
        }
    }

    pub fn credit(&self, account: &mut Account, amount: u64, path: &str) -> TransactionResult<()> {
        account.token.balance = account
            .token
            .balance
            .checked_add(amount)
            .ok_or_else(|| self.error(path, "Balance overflow"))?;
        Ok(())
    }
}

/// Capabilities every asset kind provides.
pub trait AssetHandler: Codec {
    const MODULE_ID: u32;
    const ASSET_ID: u32;
    const NAME: &'static str;
    /// At most one transaction of this kind per sender may be confirmed.
    const CONTAINS_UNIQUE_DATA: bool = false;

    /// Stateless checks on the decoded asset.
    fn validate_asset(&self, id: &TransactionId) -> Vec<TransactionError>;

    fn apply_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()>;

    fn undo_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()>;

    fn asset_to_bytes(&self) -> Vec<u8> {
        self.encode()
    }

    /// Conflicts with other transactions bound for the same block or pool.
    fn verify_against_other_transactions(
        &self,
        _transaction: &Transaction,
        _others: &[Transaction],
    ) -> Vec<TransactionError> {
        Vec::new()
    }
}

/// Registered transaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Transfer,
    RegisterMultisignature,
    RegisterDelegate,
    Vote,
}

impl AssetKind {
    pub const ALL: [AssetKind; 4] = [
        AssetKind::Transfer,
        AssetKind::RegisterMultisignature,
        AssetKind::RegisterDelegate,
        AssetKind::Vote,
    ];

    pub fn from_ids(module_id: u32, asset_id: u32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.ids() == (module_id, asset_id))
    }

    pub fn of(transaction: &Transaction) -> Option<Self> {
        Self::from_ids(transaction.module_id, transaction.asset_id)
    }

    pub fn ids(&self) -> (u32, u32) {
        match self {
            Self::Transfer => (TransferAsset::MODULE_ID, TransferAsset::ASSET_ID),
            Self::RegisterMultisignature => (
                RegisterMultisignatureAsset::MODULE_ID,
                RegisterMultisignatureAsset::ASSET_ID,
            ),
            Self::RegisterDelegate => (
                RegisterDelegateAsset::MODULE_ID,
                RegisterDelegateAsset::ASSET_ID,
            ),
            Self::Vote => (VoteAsset::MODULE_ID, VoteAsset::ASSET_ID),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Transfer => TransferAsset::NAME,
            Self::RegisterMultisignature => RegisterMultisignatureAsset::NAME,
            Self::RegisterDelegate => RegisterDelegateAsset::NAME,
            Self::Vote => VoteAsset::NAME,
        }
    }

    pub fn contains_unique_data(&self) -> bool {
        match self {
            Self::Transfer => TransferAsset::CONTAINS_UNIQUE_DATA,
            Self::RegisterMultisignature => RegisterMultisignatureAsset::CONTAINS_UNIQUE_DATA,
            Self::RegisterDelegate => RegisterDelegateAsset::CONTAINS_UNIQUE_DATA,
            Self::Vote => VoteAsset::CONTAINS_UNIQUE_DATA,
        }
    }
}

/// A decoded asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionAsset {
    Transfer(TransferAsset),
    RegisterMultisignature(RegisterMultisignatureAsset),
    RegisterDelegate(RegisterDelegateAsset),
    Vote(VoteAsset),
}

impl TransactionAsset {
    /// Decodes the asset of `transaction` through the registry.
    pub fn from_transaction(transaction: &Transaction) -> TransactionResult<Self> {
        let id = transaction.id();
        let kind = AssetKind::of(transaction).ok_or_else(|| {
            vec![TransactionError::new(
                &id,
                ".moduleID",
                format!(
                    "Transaction type not found for moduleID {} and assetID {}",
                    transaction.module_id, transaction.asset_id
                ),
            )]
        })?;
        let bytes = &transaction.asset;
        let decoded = match kind {
            AssetKind::Transfer => TransferAsset::decode(bytes).map(Self::Transfer),
            AssetKind::RegisterMultisignature => {
                RegisterMultisignatureAsset::decode(bytes).map(Self::RegisterMultisignature)
            }
            AssetKind::RegisterDelegate => {
                RegisterDelegateAsset::decode(bytes).map(Self::RegisterDelegate)
            }
            AssetKind::Vote => VoteAsset::decode(bytes).map(Self::Vote),
        };
        decoded.map_err(|e| vec![TransactionError::new(&id, ".asset", e.to_string())])
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Transfer(_) => AssetKind::Transfer,
            Self::RegisterMultisignature(_) => AssetKind::RegisterMultisignature,
            Self::RegisterDelegate(_) => AssetKind::RegisterDelegate,
            Self::Vote(_) => AssetKind::Vote,
        }
    }

    pub fn validate_asset(&self, id: &TransactionId) -> Vec<TransactionError> {
        match self {
            Self::Transfer(asset) => asset.validate_asset(id),
            Self::RegisterMultisignature(asset) => asset.validate_asset(id),
            Self::RegisterDelegate(asset) => asset.validate_asset(id),
            Self::Vote(asset) => asset.validate_asset(id),
        }
    }

    pub fn apply_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()> {
        match self {
            Self::Transfer(asset) => asset.apply_asset(ctx),
            Self::RegisterMultisignature(asset) => asset.apply_asset(ctx),
            Self::RegisterDelegate(asset) => asset.apply_asset(ctx),
            Self::Vote(asset) => asset.apply_asset(ctx),
        }
    }

    pub fn undo_asset(&self, ctx: &mut ApplyContext<'_>) -> TransactionResult<()> {
        match self {
            Self::Transfer(asset) => asset.undo_asset(ctx),
            Self::RegisterMultisignature(asset) => asset.undo_asset(ctx),
            Self::RegisterDelegate(asset) => asset.undo_asset(ctx),
            Self::Vote(asset) => asset.undo_asset(ctx),
        }
    }

    pub fn asset_to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Transfer(asset) => asset.asset_to_bytes(),
            Self::RegisterMultisignature(asset) => asset.asset_to_bytes(),
            Self::RegisterDelegate(asset) => asset.asset_to_bytes(),
            Self::Vote(asset) => asset.asset_to_bytes(),
        }
    }

    pub fn verify_against_other_transactions(
        &self,
        transaction: &Transaction,
        others: &[Transaction],
    ) -> Vec<TransactionError> {
        match self {
            Self::Transfer(asset) => asset.verify_against_other_transactions(transaction, others),
            Self::RegisterMultisignature(asset) => {
                asset.verify_against_other_transactions(transaction, others)
            }
            Self::RegisterDelegate(asset) => {
                asset.verify_against_other_transactions(transaction, others)
            }
            Self::Vote(asset) => asset.verify_against_other_transactions(transaction, others),
        }
    }

    /// Accounts credited by this transaction besides the sender.
    pub fn recipient_addresses(&self) -> Vec<Address> {
        match self {
            Self::Transfer(asset) => vec![asset.recipient_address],
            _ => Vec::new(),
        }
    }
}

/// Other transactions of the same kind sent by the same account.
pub(crate) fn same_kind_from_sender<'a>(
    transaction: &'a Transaction,
    others: &'a [Transaction],
) -> impl Iterator<Item = &'a Transaction> + 'a {
    let id = transaction.id();
    others.iter().filter(move |other| {
        other.module_id == transaction.module_id
            && other.asset_id == transaction.asset_id
            && other.sender_public_key == transaction.sender_public_key
            && other.id() != id
    })
}
