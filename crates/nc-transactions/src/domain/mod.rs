//! Domain layer: transaction kinds, configuration and check outcomes.

pub mod assets;
pub mod config;
pub mod errors;
pub mod status;

pub use assets::{ApplyContext, AssetHandler, AssetKind, TransactionAsset};
pub use config::{BaseFee, TransactionConfig, UNCONFIRMED_TRANSACTION_TIMEOUT};
pub use errors::{TransactionError, TransactionResult};
pub use status::{MultisignatureStatus, Status, TransactionResponse};
