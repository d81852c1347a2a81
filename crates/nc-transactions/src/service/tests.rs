use super::*;
use crate::domain::assets::vote::VOTE_AMOUNT_UNIT;
use crate::domain::assets::{
    RegisterDelegateAsset, RegisterMultisignatureAsset, TransferAsset, VoteAsset, VoteEntry,
};
use ed25519_dalek::SigningKey;
use nc_state_store::{InMemoryStateReader, StateStoreContext};
use shared_types::entities::{Account, Address, BlockHeader};
use std::sync::Arc;

const NETWORK: [u8; 32] = [0xAB; 32];
const BALANCE: u64 = 1_000_000;
const FEE: u64 = 10_000;

// =============================================================================
// FIXTURE
// =============================================================================

fn key(passphrase: &str) -> SigningKey {
    crypto::signing_key_from_passphrase(passphrase)
}

fn public_key(key: &SigningKey) -> Vec<u8> {
    key.verifying_key().to_bytes().to_vec()
}

fn address(key: &SigningKey) -> Address {
    crypto::address_from_public_key(&public_key(key))
}

fn processor() -> TransactionProcessor {
    TransactionProcessor::new(TransactionConfig::for_testing())
}

fn store_with(accounts: &[(&SigningKey, u64)]) -> StateStore {
    let reader = InMemoryStateReader::new();
    for (key, balance) in accounts {
        let mut account = Account::new(address(key));
        account.token.balance = *balance;
        reader.insert_account(account);
    }
    StateStore::new(
        Arc::new(reader),
        StateStoreContext {
            last_block_headers: vec![BlockHeader {
                height: 10,
                ..BlockHeader::default()
            }],
            network_identifier: NETWORK,
            last_block_reward: 0,
        },
    )
}

fn unsigned<A: Codec>(module_id: u32, asset_id: u32, sender: &SigningKey, nonce: u64, asset: &A) -> Transaction {
    Transaction {
        module_id,
        asset_id,
        nonce,
        fee: FEE,
        sender_public_key: public_key(sender),
        asset: asset.encode(),
        signatures: Vec::new(),
    }
}

fn sign(mut tx: Transaction, key: &SigningKey) -> Transaction {
    tx.signatures = vec![crypto::sign_data(&NETWORK, &tx.signing_bytes(), key)];
    tx
}

fn transfer(sender: &SigningKey, nonce: u64, amount: u64, recipient: Address) -> Transaction {
    let asset = TransferAsset {
        amount,
        recipient_address: recipient,
        data: String::new(),
    };
    sign(unsigned(2, 0, sender, nonce, &asset), sender)
}

fn sorted_keys(keys: &[&SigningKey]) -> Vec<Vec<u8>> {
    let mut keys: Vec<Vec<u8>> = keys.iter().map(|k| public_key(k)).collect();
    keys.sort();
    keys
}

fn member_signature(tx: &Transaction, key: &SigningKey) -> Vec<u8> {
    crypto::sign_data(&NETWORK, &tx.signing_bytes(), key)
}

// =============================================================================
// VALIDATE
// =============================================================================

#[test]
fn test_validate_accepts_well_formed_transfer() {
    let alice = key("alice");
    let tx = transfer(&alice, 0, 500, address(&key("bob")));
    let asset = processor().validate(&tx).unwrap();
    assert_eq!(asset.kind(), AssetKind::Transfer);
    assert!(processor().validate_transaction(&tx).is_ok());
}

#[test]
fn test_validate_collects_envelope_errors() {
    let alice = key("alice");
    let mut tx = transfer(&alice, 0, 500, address(&key("bob")));
    tx.sender_public_key = vec![1, 2, 3];
    tx.signatures = Vec::new();
    tx.fee = 1;

    let errors = processor().validate(&tx).unwrap_err();
    let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
    assert!(paths.contains(&".senderPublicKey"));
    assert!(paths.contains(&".signatures"));
    assert!(paths.contains(&".fee"));
}

#[test]
fn test_validate_rejects_malformed_signature_length() {
    let alice = key("alice");
    let mut tx = transfer(&alice, 0, 500, address(&key("bob")));
    tx.signatures[0].truncate(10);
    let errors = processor().validate(&tx).unwrap_err();
    assert_eq!(errors[0].path, ".signatures.0");
}

#[test]
fn test_validate_reports_asset_errors() {
    let alice = key("alice");
    let tx = transfer(&alice, 0, 0, address(&key("bob")));
    let errors = processor().validate(&tx).unwrap_err();
    assert!(errors.iter().any(|e| e.path.starts_with(".asset")));
}

#[test]
fn test_min_fee_includes_base_fee() {
    let alice = key("alice");
    let asset = RegisterDelegateAsset {
        username: "alice".to_string(),
    };
    let tx = sign(unsigned(5, 0, &alice, 0, &asset), &alice);
    let size = TransactionProcessor::size(&tx) as u64;
    assert_eq!(processor().min_fee(&tx), 10 * size + 1_000);

    let plain = transfer(&alice, 0, 1, address(&alice));
    let size = TransactionProcessor::size(&plain) as u64;
    assert_eq!(processor().min_fee(&plain), 10 * size);
}

#[test]
fn test_is_expired() {
    let processor = processor();
    let timeout = processor.config().expiry_timeout_secs;
    assert!(!processor.is_expired(1_000, 1_000 + timeout));
    assert!(processor.is_expired(1_000, 1_001 + timeout));
    assert!(!processor.is_expired(1_000, 500));
}

// =============================================================================
// APPLY / UNDO
// =============================================================================

#[test]
fn test_apply_transfer_moves_balance_and_burns_min_fee() {
    let (alice, bob) = (key("alice"), key("bob"));
    let mut store = store_with(&[(&alice, BALANCE)]);
    let tx = transfer(&alice, 0, 500, address(&bob));
    let processor = processor();

    processor.apply(&tx, &mut store).unwrap();

    let sender = store.account.get(&address(&alice)).unwrap();
    assert_eq!(sender.token.balance, BALANCE - FEE - 500);
    assert_eq!(sender.sequence.nonce, 1);
    assert_eq!(store.account.get(&address(&bob)).unwrap().token.balance, 500);

    let burnt = store.chain.get(CHAIN_STATE_BURNT_FEE).unwrap().unwrap();
    assert_eq!(burnt, processor.min_fee(&tx).to_be_bytes().to_vec());
}

#[test]
fn test_apply_rejects_wrong_nonce() {
    let alice = key("alice");
    let mut store = store_with(&[(&alice, BALANCE)]);
    let tx = transfer(&alice, 3, 500, address(&key("bob")));

    let errors = processor().apply(&tx, &mut store).unwrap_err();
    assert_eq!(errors[0].path, ".nonce");
    assert_eq!(errors[0].actual.as_deref(), Some("3"));
    assert_eq!(errors[0].expected.as_deref(), Some("0"));
}

#[test]
fn test_apply_keeps_min_remaining_balance() {
    let alice = key("alice");
    let mut store = store_with(&[(&alice, FEE + 550)]);
    // min remaining balance is 100
    let tx = transfer(&alice, 0, 500, address(&key("bob")));

    let errors = processor().apply(&tx, &mut store).unwrap_err();
    assert_eq!(errors[0].path, ".asset.amount");
}

#[test]
fn test_undo_reverts_apply() {
    let (alice, bob) = (key("alice"), key("bob"));
    let mut store = store_with(&[(&alice, BALANCE)]);
    let tx = transfer(&alice, 0, 500, address(&bob));
    let processor = processor();

    processor.apply(&tx, &mut store).unwrap();
    processor.undo(&tx, &mut store).unwrap();

    let sender = store.account.get(&address(&alice)).unwrap();
    assert_eq!(sender.token.balance, BALANCE);
    assert_eq!(sender.sequence.nonce, 0);
    assert_eq!(store.account.get_or_default(&address(&bob)).unwrap().token.balance, 0);
    let burnt = store.chain.get(CHAIN_STATE_BURNT_FEE).unwrap().unwrap();
    assert_eq!(burnt, 0u64.to_be_bytes().to_vec());
}

#[test]
fn test_undo_requires_applied_nonce() {
    let alice = key("alice");
    let mut store = store_with(&[(&alice, BALANCE)]);
    let tx = transfer(&alice, 0, 500, address(&key("bob")));
    let errors = processor().undo(&tx, &mut store).unwrap_err();
    assert!(errors.iter().any(|e| e.path == ".nonce" || e.path.starts_with(".asset")));
}

#[test]
fn test_delegate_registration_then_vote_and_undo() {
    let (alice, bob) = (key("alice"), key("bob"));
    let rich = 100 * VOTE_AMOUNT_UNIT;
    let mut store = store_with(&[(&alice, BALANCE), (&bob, rich)]);
    let processor = processor();

    let register = RegisterDelegateAsset {
        username: "alice".to_string(),
    };
    let mut register_tx = unsigned(5, 0, &alice, 0, &register);
    register_tx.fee = 100_000;
    let register_tx = sign(register_tx, &alice);
    processor.apply(&register_tx, &mut store).unwrap();

    let delegate = store.account.get(&address(&alice)).unwrap();
    assert_eq!(delegate.dpos.delegate.username, "alice");
    assert_eq!(delegate.dpos.delegate.last_forged_height, 11);

    let vote = VoteAsset {
        votes: vec![VoteEntry {
            delegate_address: address(&alice),
            amount: (10 * VOTE_AMOUNT_UNIT) as i64,
        }],
    };
    let vote_tx = sign(unsigned(5, 1, &bob, 0, &vote), &bob);
    processor.apply(&vote_tx, &mut store).unwrap();

    let voter = store.account.get(&address(&bob)).unwrap();
    assert_eq!(voter.token.balance, rich - FEE - 10 * VOTE_AMOUNT_UNIT);
    assert_eq!(voter.dpos.sent_votes.len(), 1);
    let delegate = store.account.get(&address(&alice)).unwrap();
    assert_eq!(delegate.dpos.delegate.total_votes_received, 10 * VOTE_AMOUNT_UNIT);

    processor.undo(&vote_tx, &mut store).unwrap();
    let voter = store.account.get(&address(&bob)).unwrap();
    assert_eq!(voter.token.balance, rich);
    assert!(voter.dpos.sent_votes.is_empty());
    let delegate = store.account.get(&address(&alice)).unwrap();
    assert_eq!(delegate.dpos.delegate.total_votes_received, 0);
}

// =============================================================================
// SIGNATURES
// =============================================================================

#[test]
fn test_single_signer_status() {
    let (alice, mallory) = (key("alice"), key("mallory"));

    struct TestCase {
        name: &'static str,
        signatures: fn(&Transaction) -> Vec<Vec<u8>>,
        expected: MultisignatureStatus,
    }

    let cases = [
        TestCase {
            name: "one valid signature",
            signatures: |tx| tx.signatures.clone(),
            expected: MultisignatureStatus::NonMultisignature,
        },
        TestCase {
            name: "two signatures",
            signatures: |tx| vec![tx.signatures[0].clone(), tx.signatures[0].clone()],
            expected: MultisignatureStatus::Fail,
        },
        TestCase {
            name: "foreign signature",
            signatures: |tx| {
                let mallory = crypto::signing_key_from_passphrase("mallory");
                vec![crypto::sign_data(&NETWORK, &tx.signing_bytes(), &mallory)]
            },
            expected: MultisignatureStatus::Fail,
        },
    ];

    let processor = processor();
    let mut store = store_with(&[(&alice, BALANCE), (&mallory, BALANCE)]);
    for case in cases {
        let mut tx = transfer(&alice, 0, 500, address(&mallory));
        tx.signatures = (case.signatures)(&tx);
        let (status, _) = processor.verify_signatures(&tx, &mut store);
        assert_eq!(status, case.expected, "{}", case.name);
    }
}

#[test]
fn test_registration_collects_member_signatures() {
    let (alice, carol, dave) = (key("alice"), key("carol"), key("dave"));
    let mut store = store_with(&[(&alice, BALANCE)]);
    let processor = processor();

    let asset = RegisterMultisignatureAsset {
        number_of_signatures: 2,
        mandatory_keys: sorted_keys(&[&carol, &dave]),
        optional_keys: Vec::new(),
    };
    let mut tx = sign(unsigned(4, 0, &alice, 0, &asset), &alice);
    assert_eq!(processor.verify_signatures(&tx, &mut store).0, MultisignatureStatus::Pending);

    let carol_sig = member_signature(&tx, &carol);
    let status = processor
        .add_multisignature(&mut tx, &mut store, &public_key(&carol), carol_sig.clone())
        .unwrap();
    assert_eq!(status, MultisignatureStatus::Pending);
    assert_eq!(tx.signatures.len(), 3);

    let duplicate = processor
        .add_multisignature(&mut tx, &mut store, &public_key(&carol), carol_sig)
        .unwrap_err();
    assert!(duplicate.message.contains("duplicate"));

    let dave_sig = member_signature(&tx, &dave);
    let status = processor
        .add_multisignature(&mut tx, &mut store, &public_key(&dave), dave_sig)
        .unwrap();
    assert_eq!(status, MultisignatureStatus::Ready);
}

#[test]
fn test_add_multisignature_rejects_outsiders() {
    let (alice, carol, mallory) = (key("alice"), key("carol"), key("mallory"));
    let mut store = store_with(&[(&alice, BALANCE)]);
    let processor = processor();

    let asset = RegisterMultisignatureAsset {
        number_of_signatures: 1,
        mandatory_keys: vec![public_key(&carol)],
        optional_keys: Vec::new(),
    };
    let mut tx = sign(unsigned(4, 0, &alice, 0, &asset), &alice);
    let signature = member_signature(&tx, &mallory);
    let err = processor
        .add_multisignature(&mut tx, &mut store, &public_key(&mallory), signature)
        .unwrap_err();
    assert_eq!(err.path, ".signatures");

    // wrong signer for a valid member key
    let forged = member_signature(&tx, &mallory);
    assert!(processor
        .add_multisignature(&mut tx, &mut store, &public_key(&carol), forged)
        .is_err());

    let mut plain = transfer(&alice, 0, 1, address(&carol));
    let signature = member_signature(&plain, &carol);
    assert!(processor
        .add_multisignature(&mut plain, &mut store, &public_key(&carol), signature)
        .is_err());
}

#[test]
fn test_multisignature_account_status() {
    let (alice, carol, dave, erin) = (key("alice"), key("carol"), key("dave"), key("erin"));
    let mut store = store_with(&[(&alice, BALANCE)]);
    let mut account = store.account.get(&address(&alice)).unwrap();
    account.keys.number_of_signatures = 2;
    account.keys.mandatory_keys = vec![public_key(&carol)];
    account.keys.optional_keys = sorted_keys(&[&dave, &erin]);
    let optional = account.keys.optional_keys.clone();
    store.account.set(account.address, account).unwrap();

    let signer_for = |key: &Vec<u8>| {
        [&dave, &erin]
            .into_iter()
            .find(|k| &public_key(k) == key)
            .cloned()
            .unwrap()
    };
    let (first, second) = (signer_for(&optional[0]), signer_for(&optional[1]));

    let processor = processor();
    let base = transfer(&alice, 0, 1, address(&carol));
    let sig = |key: &SigningKey| member_signature(&base, key);

    let cases: Vec<(&str, Vec<Vec<u8>>, MultisignatureStatus)> = vec![
        ("mandatory only", vec![sig(&carol), vec![], vec![]], MultisignatureStatus::Pending),
        ("mandatory and one optional", vec![sig(&carol), sig(&first), vec![]], MultisignatureStatus::Ready),
        ("too many", vec![sig(&carol), sig(&first), sig(&second)], MultisignatureStatus::Fail),
        ("missing mandatory", vec![vec![], sig(&first), vec![]], MultisignatureStatus::Pending),
        ("wrong slot", vec![sig(&first), vec![], vec![]], MultisignatureStatus::Fail),
        ("more signatures than keys", vec![vec![]; 4], MultisignatureStatus::Fail),
    ];

    for (name, signatures, expected) in cases {
        let mut tx = base.clone();
        tx.signatures = signatures;
        let (status, _) = processor.verify_signatures(&tx, &mut store);
        assert_eq!(status, expected, "{name}");
    }
}

// =============================================================================
// BATCH CHECKS
// =============================================================================

#[test]
fn test_apply_transactions_isolates_failures() {
    let (alice, bob) = (key("alice"), key("bob"));
    let mut store = store_with(&[(&alice, BALANCE)]);
    let txs = vec![
        transfer(&alice, 0, 100, address(&bob)),
        transfer(&alice, 5, 100, address(&bob)),
        transfer(&alice, 1, 100, address(&bob)),
    ];

    let responses = processor().apply_transactions(&txs, &mut store);
    let statuses: Vec<Status> = responses.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![Status::Ok, Status::Fail, Status::Ok]);
    assert_eq!(responses[1].id, txs[1].id());

    let sender = store.account.get(&address(&alice)).unwrap();
    assert_eq!(sender.sequence.nonce, 2);
    assert_eq!(sender.token.balance, BALANCE - 2 * (FEE + 100));
}

#[test]
fn test_validate_transactions_reports_each() {
    let alice = key("alice");
    let good = transfer(&alice, 0, 100, address(&alice));
    let bad = transfer(&alice, 1, 0, address(&alice));
    let responses = processor().validate_transactions(&[good, bad]);
    assert_eq!(responses[0].status, Status::Ok);
    assert_eq!(responses[1].status, Status::Fail);
    assert!(!responses[1].errors.is_empty());
}

#[test]
fn test_verify_transactions_flags_conflicting_registrations() {
    let alice = key("alice");
    let mut store = store_with(&[(&alice, BALANCE)]);
    let register = |nonce, name: &str| {
        let asset = RegisterDelegateAsset {
            username: name.to_string(),
        };
        let mut tx = unsigned(5, 0, &alice, nonce, &asset);
        tx.fee = 100_000;
        sign(tx, &alice)
    };
    let txs = vec![register(0, "first"), register(1, "second")];

    let responses = processor().verify_transactions(&txs, &mut store);
    assert!(responses.iter().all(|r| r.status == Status::Fail));
}

#[test]
fn test_verify_transactions_pending_multisignature() {
    let (alice, carol) = (key("alice"), key("carol"));
    let mut store = store_with(&[(&alice, BALANCE)]);
    let asset = RegisterMultisignatureAsset {
        number_of_signatures: 1,
        mandatory_keys: vec![public_key(&carol)],
        optional_keys: Vec::new(),
    };
    let tx = sign(unsigned(4, 0, &alice, 0, &asset), &alice);
    let ok = transfer(&alice, 0, 100, address(&carol));

    let responses = processor().verify_transactions(&[tx], &mut store);
    assert_eq!(responses[0].status, Status::Pending);
    let responses = processor().verify_transactions(&[ok], &mut store);
    assert_eq!(responses[0].status, Status::Ok);
}
