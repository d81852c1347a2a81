//! Fakes shared by the pool tests.

use crate::ports::{TimeSource, TransactionChecks};
use crate::service::PoolDependencies;
use async_trait::async_trait;
use nc_transactions::domain::assets::{RegisterDelegateAsset, TransferAsset};
use nc_transactions::{MultisignatureStatus, Status, TransactionError, TransactionResponse};
use parking_lot::Mutex;
use shared_bus::InMemoryEventBus;
use shared_types::codec::Codec;
use shared_types::crypto;
use shared_types::entities::{Address, Transaction, TransactionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) const START: u64 = 1_000_000;

/// Checks driven by per-id overrides, with nonce tracking for `process`.
#[derive(Default)]
pub(crate) struct FakeChecks {
    pub validate: Mutex<HashMap<TransactionId, Status>>,
    pub verify: Mutex<HashMap<TransactionId, Status>>,
    /// Ids that fail to apply regardless of nonce.
    pub process_failures: Mutex<Vec<TransactionId>>,
    /// Confirmed nonce per sender public key.
    pub nonces: Mutex<HashMap<Vec<u8>, u64>>,
    pub process_calls: Mutex<Vec<Vec<TransactionId>>>,
}

impl FakeChecks {
    fn respond(overrides: &Mutex<HashMap<TransactionId, Status>>, transactions: &[Transaction]) -> Vec<TransactionResponse> {
        let overrides = overrides.lock();
        transactions
            .iter()
            .map(|tx| {
                let id = tx.id();
                match overrides.get(&id).copied().unwrap_or(Status::Ok) {
                    Status::Ok => TransactionResponse::ok(id),
                    Status::Pending => TransactionResponse::pending(id),
                    Status::Fail => TransactionResponse::fail(id, vec![TransactionError::new(&id, ".fake", "rejected")]),
                }
            })
            .collect()
    }
}

#[async_trait]
impl TransactionChecks for FakeChecks {
    async fn validate_transactions(&self, transactions: &[Transaction]) -> Vec<TransactionResponse> {
        Self::respond(&self.validate, transactions)
    }

    async fn verify_transactions(&self, transactions: &[Transaction]) -> Vec<TransactionResponse> {
        Self::respond(&self.verify, transactions)
    }

    async fn process_transactions(&self, transactions: &[Transaction]) -> Vec<TransactionResponse> {
        self.process_calls
            .lock()
            .push(transactions.iter().map(Transaction::id).collect());
        let failures = self.process_failures.lock().clone();
        let mut expected = self.nonces.lock().clone();
        transactions
            .iter()
            .map(|tx| {
                let id = tx.id();
                let next = expected.entry(tx.sender_public_key.clone()).or_insert(0);
                if tx.nonce != *next {
                    return TransactionResponse::fail(
                        id,
                        vec![TransactionError::new(&id, ".nonce", "Incompatible transaction nonce for account")
                            .with_values(tx.nonce, *next)],
                    );
                }
                if failures.contains(&id) {
                    return TransactionResponse::fail(id, vec![TransactionError::new(&id, ".asset", "rejected")]);
                }
                *next += 1;
                TransactionResponse::ok(id)
            })
            .collect()
    }

    fn min_fee(&self, _transaction: &Transaction) -> u64 {
        0
    }

    fn add_signature(
        &self,
        transaction: &mut Transaction,
        _public_key: &[u8],
        signature: Vec<u8>,
    ) -> Result<MultisignatureStatus, TransactionError> {
        if transaction.signatures.contains(&signature) {
            return Err(TransactionError::new(
                &transaction.id(),
                ".signatures",
                "Encountered duplicate signature in transaction",
            ));
        }
        transaction.signatures.push(signature);
        Ok(if transaction.signatures.len() >= 2 {
            MultisignatureStatus::Ready
        } else {
            MultisignatureStatus::Pending
        })
    }
}

#[derive(Debug)]
pub(crate) struct FixedClock(AtomicU64);

impl FixedClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct Harness {
    pub checks: Arc<FakeChecks>,
    pub bus: Arc<InMemoryEventBus>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            checks: Arc::new(FakeChecks::default()),
            bus: Arc::new(InMemoryEventBus::new()),
            clock: Arc::new(FixedClock::new(START)),
        }
    }

    pub fn deps(&self) -> PoolDependencies {
        PoolDependencies::new(self.checks.clone(), self.bus.clone()).with_time_source(self.clock.clone())
    }
}

pub(crate) fn sender_key(sender: u8) -> Vec<u8> {
    vec![sender; 32]
}

pub(crate) fn address_of(sender: u8) -> Address {
    crypto::address_from_public_key(&sender_key(sender))
}

pub(crate) fn transfer(sender: u8, nonce: u64, fee: u64, recipient: Address) -> Transaction {
    let asset = TransferAsset {
        amount: 1,
        recipient_address: recipient,
        data: String::new(),
    };
    Transaction {
        module_id: 2,
        asset_id: 0,
        nonce,
        fee,
        sender_public_key: sender_key(sender),
        asset: asset.encode(),
        signatures: vec![vec![sender; 64]],
    }
}

pub(crate) fn tx(sender: u8, nonce: u64, fee: u64) -> Transaction {
    transfer(sender, nonce, fee, [0xEE; 20])
}

pub(crate) fn delegate_registration(sender: u8, nonce: u64, username: &str) -> Transaction {
    let asset = RegisterDelegateAsset {
        username: username.to_string(),
    };
    Transaction {
        module_id: 5,
        asset_id: 0,
        nonce,
        fee: 1_000,
        sender_public_key: sender_key(sender),
        asset: asset.encode(),
        signatures: vec![vec![sender; 64]],
    }
}
