//! Adversarial tests: hostile delivery orders, conflicting spends, provider
//! failures and concurrent builds.
//!
//! Providers may deliver duplicates, deliver a spend before the output it
//! consumes, announce a block before its transactions, or fail at any
//! point. None of these may corrupt the wallet's view of its funds.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use proptest::prelude::*;
use zinc_core::address::Address;
use zinc_core::constants::MAX_MONEY;
use zinc_core::error::ProviderError;
use zinc_core::traits::ProviderEvent;
use zinc_core::types::{BlockInfo, Hash256, ObservedTransaction, OutPoint, Transaction, TxIn, TxOut, Txid};
use zinc_tests::helpers::*;
use zinc_wallet::{KeyPath, MemoryStore, Seed, SyncState, Wallet, WalletError, derive_seed};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn abandon_seed() -> Seed {
    static SEED: OnceLock<Seed> = OnceLock::new();
    SEED.get_or_init(|| derive_seed(ABANDON_PHRASE, "").unwrap()).clone()
}

fn fresh_wallet() -> Wallet {
    Wallet::from_seed(abandon_seed(), test_config(), Arc::new(MemoryStore::new())).unwrap()
}

fn ext(wallet: &Wallet, index: u32) -> Address {
    wallet.address_at(KeyPath::external(index)).unwrap()
}

/// Spend output `vout` of `funding` to a foreign address. Unsigned: the
/// wallet trusts the provider's view of the chain.
fn spend(funding: &Transaction, vout: u32, value: u64, to: u8) -> Transaction {
    Transaction {
        inputs: vec![TxIn::unsigned(OutPoint::new(funding.txid(), vout))],
        outputs: vec![TxOut {
            value,
            script_pubkey: foreign(to).script_pubkey(),
        }],
        ..Transaction::new()
    }
}

/// Spend output `vout` of `funding` to `to`.
fn spend_to(funding: &Transaction, vout: u32, value: u64, to: &Address) -> Transaction {
    Transaction {
        inputs: vec![TxIn::unsigned(OutPoint::new(funding.txid(), vout))],
        outputs: vec![TxOut {
            value,
            script_pubkey: to.script_pubkey(),
        }],
        ..Transaction::new()
    }
}

fn block(height: u32, txids: Vec<Txid>) -> BlockInfo {
    BlockInfo {
        height,
        hash: Hash256([height as u8; 32]),
        timestamp: GENESIS_TIME + u64::from(height) * BLOCK_INTERVAL,
        txids,
    }
}

fn unconfirmed(tx: &Transaction) -> ObservedTransaction {
    ObservedTransaction::unconfirmed(tx.clone(), GENESIS_TIME)
}

fn confirmed(tx: &Transaction, height: u32) -> ObservedTransaction {
    ObservedTransaction::confirmed(tx.clone(), height, GENESIS_TIME)
}

/// Give the wallet `count` confirmed outputs of `value`, each on its own
/// receive address.
fn fund_outputs(wallet: &Wallet, count: u32, value: u64) {
    for i in 0..count {
        let address = wallet.receive_address().unwrap();
        wallet
            .apply_sync_data(&[confirmed(&payment(&address, value, i), 1)], &[])
            .unwrap();
    }
}

// ---------------------------------------------------------------------------
// Delivery order
// ---------------------------------------------------------------------------

#[test]
fn duplicate_delivery_is_idempotent() {
    let wallet = fresh_wallet();
    let tx = payment(&ext(&wallet, 0), 50_000, 1);
    let observed = unconfirmed(&tx);
    wallet.apply_sync_data(&[observed.clone(), observed.clone()], &[]).unwrap();
    wallet.apply_sync_data(&[observed], &[]).unwrap();
    assert_eq!(wallet.balance(), 50_000);
    assert_eq!(wallet.balance_details().utxo_count, 1);
    assert_eq!(wallet.recent_transactions().len(), 1);
}

#[test]
fn spend_seen_before_funding() {
    let wallet = fresh_wallet();
    let funding = payment(&ext(&wallet, 0), 50_000, 1);
    let spending = spend(&funding, 0, 40_000, 9);

    wallet.apply_sync_data(&[unconfirmed(&spending)], &[]).unwrap();
    assert_eq!(wallet.balance(), 0);
    assert!(wallet.recent_transactions().is_empty());

    wallet.apply_sync_data(&[unconfirmed(&funding)], &[]).unwrap();
    assert_eq!(wallet.balance(), 0);
    let out = OutPoint::new(funding.txid(), 0);
    assert_eq!(wallet.snapshot().utxos.output(&out).unwrap().spent_by, Some(spending.txid()));

    let history: Vec<_> = wallet.recent_transactions().collect();
    assert_eq!(history.len(), 2);
    let debit = history.iter().find(|s| s.txid == spending.txid()).unwrap();
    assert_eq!(debit.sent, 50_000);
    assert_eq!(debit.fee, Some(10_000));
}

#[test]
fn block_seen_before_its_transaction() {
    let wallet = fresh_wallet();
    let funding = payment(&ext(&wallet, 0), 50_000, 1);

    wallet.apply_sync_data(&[], &[block(5, vec![funding.txid()])]).unwrap();
    assert_eq!(wallet.snapshot().utxos.tip(), Some(5));
    assert_eq!(wallet.balance(), 0);

    wallet.apply_sync_data(&[unconfirmed(&funding)], &[]).unwrap();
    let balance = wallet.balance_details();
    assert_eq!(balance.confirmed, 50_000);
    assert_eq!(balance.unconfirmed, 0);
    let entry = wallet.recent_transactions().next().unwrap();
    assert_eq!(entry.confirmations, 1);
    assert_eq!(entry.timestamp, GENESIS_TIME + 5 * BLOCK_INTERVAL);
}

#[test]
fn blocks_out_of_order_keep_highest_tip() {
    let wallet = fresh_wallet();
    let funding = payment(&ext(&wallet, 0), 50_000, 1);
    wallet.apply_sync_data(&[confirmed(&funding, 3)], &[]).unwrap();
    wallet
        .apply_sync_data(&[], &[block(7, vec![]), block(4, vec![]), block(6, vec![])])
        .unwrap();
    assert_eq!(wallet.snapshot().utxos.tip(), Some(7));
    assert_eq!(wallet.recent_transactions().next().unwrap().confirmations, 5);
}

#[test]
fn second_unconfirmed_spend_is_ignored() {
    let wallet = fresh_wallet();
    let funding = payment(&ext(&wallet, 0), 50_000, 1);
    let first = spend(&funding, 0, 40_000, 1);
    let second = spend(&funding, 0, 45_000, 2);
    wallet
        .apply_sync_data(&[confirmed(&funding, 1), unconfirmed(&first), unconfirmed(&second)], &[])
        .unwrap();
    let out = OutPoint::new(funding.txid(), 0);
    assert_eq!(wallet.snapshot().utxos.output(&out).unwrap().spent_by, Some(first.txid()));
    assert_eq!(wallet.balance(), 0);
}

#[test]
fn confirmed_spend_replaces_unconfirmed_conflict() {
    let wallet = fresh_wallet();
    let funding = payment(&ext(&wallet, 0), 50_000, 1);
    let first = spend(&funding, 0, 40_000, 1);
    let second = spend(&funding, 0, 45_000, 2);
    wallet
        .apply_sync_data(&[confirmed(&funding, 1), unconfirmed(&first), confirmed(&second, 2)], &[])
        .unwrap();
    let out = OutPoint::new(funding.txid(), 0);
    assert_eq!(wallet.snapshot().utxos.output(&out).unwrap().spent_by, Some(second.txid()));

    // A later confirmed double spend does not displace it.
    let third = spend(&funding, 0, 30_000, 3);
    wallet.apply_sync_data(&[confirmed(&third, 3)], &[]).unwrap();
    assert_eq!(wallet.snapshot().utxos.output(&out).unwrap().spent_by, Some(second.txid()));
}

#[test]
fn change_of_displaced_spend_is_not_balance() {
    let wallet = fresh_wallet();
    let change = wallet.address_at(KeyPath::internal(0)).unwrap();
    let funding = payment(&ext(&wallet, 0), 50_000, 1);
    let ours = spend_to(&funding, 0, 49_000, &change);
    wallet
        .apply_sync_data(&[confirmed(&funding, 1), unconfirmed(&ours)], &[])
        .unwrap();
    assert_eq!(wallet.balance(), 49_000);

    let theirs = spend(&funding, 0, 45_000, 7);
    wallet.apply_sync_data(&[confirmed(&theirs, 2)], &[]).unwrap();
    assert_eq!(wallet.balance(), 0);
    assert_eq!(wallet.balance_details().utxo_count, 0);
    let entry = wallet
        .recent_transactions()
        .find(|s| s.txid == ours.txid())
        .unwrap();
    assert!(entry.conflicted);
}

#[test]
fn one_coin_two_unconfirmed_spends_count_once() {
    let wallet = fresh_wallet();
    let change = wallet.address_at(KeyPath::internal(0)).unwrap();
    let funding = payment(&ext(&wallet, 0), 50_000, 1);
    let first = spend_to(&funding, 0, 49_000, &change);
    let second = spend_to(&funding, 0, 48_000, &ext(&wallet, 1));
    wallet
        .apply_sync_data(&[confirmed(&funding, 1), unconfirmed(&first), unconfirmed(&second)], &[])
        .unwrap();
    assert_eq!(wallet.balance(), 49_000);

    // Delivered in the opposite order the first one seen still wins.
    let other = fresh_wallet();
    other
        .apply_sync_data(&[unconfirmed(&second), unconfirmed(&first), confirmed(&funding, 1)], &[])
        .unwrap();
    assert_eq!(other.balance(), 48_000);
}

#[test]
fn spends_built_on_displaced_change_are_conflicted() {
    let wallet = fresh_wallet();
    let change = wallet.address_at(KeyPath::internal(0)).unwrap();
    let funding = payment(&ext(&wallet, 0), 50_000, 1);
    let ours = spend_to(&funding, 0, 49_000, &change);
    let onward = spend_to(&ours, 0, 48_000, &ext(&wallet, 1));
    wallet
        .apply_sync_data(&[confirmed(&funding, 1), unconfirmed(&ours), unconfirmed(&onward)], &[])
        .unwrap();
    assert_eq!(wallet.balance(), 48_000);

    wallet
        .apply_sync_data(&[confirmed(&spend(&funding, 0, 45_000, 7), 2)], &[])
        .unwrap();
    assert_eq!(wallet.balance(), 0);
    let conflicted: BTreeSet<Txid> = wallet
        .recent_transactions()
        .filter(|s| s.conflicted)
        .map(|s| s.txid)
        .collect();
    assert_eq!(conflicted, BTreeSet::from([ours.txid(), onward.txid()]));
}

#[test]
fn block_confirming_ignored_spend_takes_over() {
    let wallet = fresh_wallet();
    let change = wallet.address_at(KeyPath::internal(0)).unwrap();
    let funding = payment(&ext(&wallet, 0), 50_000, 1);
    let first = spend_to(&funding, 0, 49_000, &change);
    let second = spend(&funding, 0, 45_000, 7);
    wallet
        .apply_sync_data(&[confirmed(&funding, 1), unconfirmed(&first), unconfirmed(&second)], &[])
        .unwrap();
    assert_eq!(wallet.balance(), 49_000);

    wallet.apply_sync_data(&[], &[block(2, vec![second.txid()])]).unwrap();
    assert_eq!(wallet.balance(), 0);
    let out = OutPoint::new(funding.txid(), 0);
    assert_eq!(wallet.snapshot().utxos.output(&out).unwrap().spent_by, Some(second.txid()));
    assert!(wallet.snapshot().utxos.transaction(&first.txid()).unwrap().conflicted);
}

#[test]
fn redelivered_with_height_ignored_spend_takes_over() {
    let t = TestWallet::abandon();
    let wallet = &t.wallet;
    let change = wallet.address_at(KeyPath::internal(0)).unwrap();
    let funding = payment(&ext(wallet, 0), 50_000, 1);
    let first = spend_to(&funding, 0, 49_000, &change);
    let second = spend(&funding, 0, 45_000, 7);
    wallet
        .apply_sync_data(&[confirmed(&funding, 1), unconfirmed(&first), unconfirmed(&second)], &[])
        .unwrap();

    wallet.apply_sync_data(&[confirmed(&second, 2)], &[]).unwrap();
    assert_eq!(wallet.balance(), 0);

    // The outcome is stored, not recomputed from delivery order on load.
    let reloaded = t.reload();
    assert_eq!(reloaded.balance(), 0);
    assert!(reloaded.snapshot().utxos.transaction(&first.txid()).unwrap().conflicted);
    reloaded.apply_sync_data(&[unconfirmed(&first)], &[]).unwrap();
    assert_eq!(reloaded.balance(), 0);
}

#[test]
fn conflicted_outputs_excluded_from_balance() {
    let wallet = fresh_wallet();
    let funding = payment(&ext(&wallet, 0), 50_000, 1);
    let mut observed = unconfirmed(&funding);
    observed.conflicted = true;
    wallet.apply_sync_data(&[observed.clone()], &[]).unwrap();
    assert_eq!(wallet.balance(), 0);
    assert!(wallet.recent_transactions().next().unwrap().conflicted);

    // The provider clears the flag once the conflict resolves.
    observed.conflicted = false;
    wallet.apply_sync_data(&[observed], &[]).unwrap();
    assert_eq!(wallet.balance(), 50_000);
}

#[test]
fn overflowing_batch_is_rejected_whole() {
    let wallet = fresh_wallet();
    let good = payment(&ext(&wallet, 0), 50_000, 1);
    let bad = payment(&ext(&wallet, 1), MAX_MONEY + 1, 2);
    let err = wallet
        .apply_sync_data(&[unconfirmed(&good), unconfirmed(&bad)], &[])
        .unwrap_err();
    assert!(matches!(err, WalletError::Encode(_)), "{err}");
    assert_eq!(wallet.balance(), 0);
    assert!(wallet.recent_transactions().is_empty());
}

// ---------------------------------------------------------------------------
// Spending
// ---------------------------------------------------------------------------

#[test]
fn concurrent_builds_never_share_inputs() {
    let wallet = fresh_wallet();
    fund_outputs(&wallet, 10, 50_000);
    assert_eq!(wallet.balance(), 500_000);

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..12)
            .map(|_| s.spawn(|| wallet.build_transaction(30_000, FOREIGN_ADDRESS)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut seen = BTreeSet::new();
    let mut built = 0;
    for result in results {
        match result {
            Ok(tx) => {
                built += 1;
                for input in &tx.inputs {
                    assert!(seen.insert(input.outpoint), "{} spent twice", input.outpoint);
                }
            }
            Err(e) => assert!(matches!(e, WalletError::InsufficientFunds { .. }), "{e}"),
        }
    }
    assert_eq!(built, 10);
    assert_eq!(wallet.balance(), 0);
    assert_eq!(wallet.balance_details().reserved, 500_000);
}

#[test]
fn abandon_makes_inputs_available_again() {
    let wallet = fresh_wallet();
    fund_outputs(&wallet, 1, 100_000);
    let built = wallet.build_transaction(50_000, FOREIGN_ADDRESS).unwrap();
    assert!(matches!(
        wallet.build_transaction(10_000, FOREIGN_ADDRESS),
        Err(WalletError::InsufficientFunds { have: 0, need: 10_000 })
    ));
    assert!(wallet.abandon(&built.txid()).unwrap());
    assert!(!wallet.abandon(&built.txid()).unwrap());
    let rebuilt = wallet.build_transaction(10_000, FOREIGN_ADDRESS).unwrap();
    assert_eq!(rebuilt.inputs[0].outpoint, built.inputs[0].outpoint);
}

#[test]
fn destination_on_other_network_is_rejected() {
    let wallet = fresh_wallet();
    fund_outputs(&wallet, 1, 100_000);
    let err = wallet
        .build_transaction(10_000, "mkpZhYtJu2r87Js3pDiWJDmPte2NRZ8bJV")
        .unwrap_err();
    assert!(matches!(err, WalletError::InvalidAddress(_)), "{err}");
    assert_eq!(wallet.balance_details().reserved, 0);
}

#[test]
fn failed_save_leaves_reservation_untaken() {
    let store = Arc::new(MemoryStore::new());
    let wallet = Wallet::from_seed(abandon_seed(), test_config(), store.clone()).unwrap();
    fund_outputs(&wallet, 1, 100_000);
    store.set_fail_saves(true);
    assert!(matches!(
        wallet.build_transaction(10_000, FOREIGN_ADDRESS),
        Err(WalletError::Storage(_))
    ));
    assert_eq!(wallet.balance(), 100_000);
    assert!(!wallet.snapshot().addresses.is_used(&wallet.address_at(KeyPath::internal(0)).unwrap()));
}

// ---------------------------------------------------------------------------
// Provider failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provider_error_then_recovery() {
    let mut h = Harness::abandon();
    h.start().await;
    h.provider.emit(ProviderEvent::Error(ProviderError::Timeout)).await;
    h.drain().await;
    assert_eq!(h.coordinator.state(), SyncState::Failed("timeout".into()));

    // Funds that arrive during the outage are picked up by the rescan.
    let receive = h.wallet().receive_address().unwrap();
    h.provider.set_offline(true);
    h.provider.fund(&receive, 25_000).await;
    h.drain().await;
    assert_eq!(h.wallet().balance(), 0);
    assert!(h.coordinator.start().await.is_err());

    h.provider.set_offline(false);
    h.start().await;
    assert_eq!(h.coordinator.state(), SyncState::Synced);
    assert_eq!(h.wallet().balance(), 25_000);
}

#[tokio::test]
async fn watch_failure_fails_start() {
    let mut h = Harness::abandon();
    h.provider.fail_watch(Some(ProviderError::Unavailable("connection refused".into())));
    let err = h.coordinator.start().await.unwrap_err();
    assert!(matches!(err, WalletError::Provider(ProviderError::Unavailable(_))));
    assert_eq!(
        h.coordinator.state(),
        SyncState::Failed("unavailable: connection refused".into())
    );
    assert!(h.coordinator.watched().is_empty());

    h.provider.fail_watch(None);
    h.start().await;
    assert_eq!(h.coordinator.state(), SyncState::Synced);
    assert_eq!(h.coordinator.watched().len(), 8);
}

#[tokio::test]
async fn rejected_broadcast_releases_inputs() {
    let mut h = Harness::abandon();
    h.start().await;
    let receive = h.wallet().receive_address().unwrap();
    h.provider.fund(&receive, 100_000).await;
    h.drain().await;

    let built = h.wallet().build_transaction(50_000, FOREIGN_ADDRESS).unwrap();
    h.provider.fail_broadcast(Some(ProviderError::Rejected("min relay fee not met".into())));
    let err = h.coordinator.broadcast(&built).await.unwrap_err();
    assert_eq!(err, WalletError::BroadcastRejected("min relay fee not met".into()));
    assert_eq!(h.coordinator.state(), SyncState::Synced);
    assert_eq!(h.wallet().balance(), 100_000);
    assert!(h.provider.broadcasts().is_empty());
}

#[tokio::test]
async fn broadcast_timeout_fails_sync_and_releases_inputs() {
    let mut h = Harness::abandon();
    h.start().await;
    let receive = h.wallet().receive_address().unwrap();
    h.provider.fund(&receive, 100_000).await;
    h.drain().await;

    let built = h.wallet().build_transaction(50_000, FOREIGN_ADDRESS).unwrap();
    h.provider.fail_broadcast(Some(ProviderError::Timeout));
    let err = h.coordinator.broadcast(&built).await.unwrap_err();
    assert_eq!(err, WalletError::Provider(ProviderError::Timeout));
    assert_eq!(h.coordinator.state(), SyncState::Failed("timeout".into()));
    assert_eq!(h.wallet().balance(), 100_000);

    h.provider.fail_broadcast(None);
    h.start().await;
    assert_eq!(h.coordinator.state(), SyncState::Synced);
}

#[tokio::test]
async fn failed_save_during_sync_is_redelivered() {
    let mut h = Harness::abandon();
    h.start().await;
    h.wallet.store.set_fail_saves(true);
    let receive = h.wallet().receive_address().unwrap();
    h.provider.fund(&receive, 40_000).await;
    h.drain().await;
    assert!(matches!(h.coordinator.state(), SyncState::Failed(_)));
    assert_eq!(h.wallet().balance(), 0);

    h.wallet.store.set_fail_saves(false);
    h.start().await;
    assert_eq!(h.coordinator.state(), SyncState::Synced);
    assert_eq!(h.wallet().balance(), 40_000);
}

#[tokio::test]
async fn expired_reservations_released_on_start() {
    let mut h = Harness::abandon();
    h.start().await;
    let receive = h.wallet().receive_address().unwrap();
    h.provider.fund(&receive, 100_000).await;
    h.drain().await;

    let built = h.wallet().build_transaction(50_000, FOREIGN_ADDRESS).unwrap();
    h.wallet.clock.advance(599);
    assert_eq!(h.wallet().balance(), 0);
    h.wallet.clock.advance(1);
    assert_eq!(h.wallet().balance(), 100_000, "reservation lapses at its expiry");
    assert!(h.wallet().snapshot().utxos.reservation(&built.txid()).is_some());

    h.start().await;
    assert!(h.wallet().snapshot().utxos.reservation(&built.txid()).is_none());
}

#[tokio::test]
async fn malformed_delivery_fails_sync() {
    let mut h = Harness::abandon();
    h.start().await;
    let receive = h.wallet().receive_address().unwrap();
    let bad = payment(&receive, MAX_MONEY + 1, 1);
    h.provider.emit(ProviderEvent::Transactions(vec![unconfirmed(&bad)])).await;
    h.drain().await;
    assert!(matches!(h.coordinator.state(), SyncState::Failed(_)));
    assert_eq!(h.wallet().balance(), 0);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum Delivery {
    Tx(ObservedTransaction),
    Block(BlockInfo),
}

/// Three payments, one spend, two blocks. Final state: 40_000 confirmed.
fn scenario() -> Vec<Delivery> {
    let wallet = fresh_wallet();
    let f0 = payment(&ext(&wallet, 0), 30_000, 1);
    let f1 = payment(&ext(&wallet, 1), 20_000, 2);
    let f2 = payment(&ext(&wallet, 2), 10_000, 3);
    let s1 = spend(&f1, 0, 15_000, 7);
    vec![
        Delivery::Block(block(1, vec![f0.txid(), f1.txid()])),
        Delivery::Block(block(2, vec![s1.txid(), f2.txid()])),
        Delivery::Tx(unconfirmed(&f0)),
        Delivery::Tx(unconfirmed(&f1)),
        Delivery::Tx(unconfirmed(&f2)),
        Delivery::Tx(unconfirmed(&s1)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn delivery_order_does_not_change_outcome(order in Just(scenario()).prop_shuffle()) {
        let wallet = fresh_wallet();
        for delivery in &order {
            match delivery {
                Delivery::Tx(tx) => wallet.apply_sync_data(std::slice::from_ref(tx), &[]),
                Delivery::Block(b) => wallet.apply_sync_data(&[], std::slice::from_ref(b)),
            }
            .unwrap();
        }

        let balance = wallet.balance_details();
        prop_assert_eq!(balance.spendable, 40_000);
        prop_assert_eq!(balance.confirmed, 40_000);
        prop_assert_eq!(balance.unconfirmed, 0);
        prop_assert_eq!(balance.utxo_count, 2);
        prop_assert_eq!(wallet.snapshot().utxos.tip(), Some(2));

        let history: Vec<_> = wallet.recent_transactions().collect();
        prop_assert_eq!(history.len(), 4);
        prop_assert!(history.iter().all(|s| s.confirmations >= 1));
        prop_assert!(history.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        prop_assert_eq!(wallet.receive_address().unwrap(), ext(&wallet, 3));
    }

    #[test]
    fn builds_conserve_value(amounts in prop::collection::vec(546u64..=120_000, 1..8)) {
        let wallet = fresh_wallet();
        fund_outputs(&wallet, 4, 60_000);
        let total = 240_000u64;

        let mut reserved = BTreeSet::new();
        for amount in amounts {
            match wallet.build_transaction(amount, FOREIGN_ADDRESS) {
                Ok(built) => {
                    let outputs: u64 = built.tx.outputs.iter().map(|o| o.value).sum();
                    prop_assert_eq!(built.input_value(), outputs + built.fee);
                    prop_assert_eq!(built.tx.outputs[0].value, amount);
                    prop_assert!(built.fee >= 10_000);
                    for input in &built.inputs {
                        prop_assert!(reserved.insert(input.outpoint));
                    }
                }
                Err(WalletError::InsufficientFunds { .. }) => {}
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
            let balance = wallet.balance_details();
            prop_assert_eq!(balance.spendable + balance.reserved, total);
        }
    }
}
