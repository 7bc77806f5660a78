//! Criterion benchmarks for zinc-wallet.
//!
//! Covers: seed derivation, leaf key derivation, address pool extension,
//! coin selection, and a full build-and-sign.

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

use zinc_core::address::{Address, Network};
use zinc_core::types::{Hash256, ObservedTransaction, OutPoint, Transaction, TxIn, TxOut};
use zinc_wallet::{
    AddressBook, Chain, CoinSelector, FeeConfig, FeePolicy, KeyChain, KeyPath, MemoryStore, SelectionStrategy,
    SpendableOutput, Wallet, WalletConfig, derive_seed,
};

const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn bench_derivation(c: &mut Criterion) {
    c.bench_function("derive_seed_pbkdf2", |b| {
        b.iter(|| derive_seed(black_box(PHRASE), "").unwrap())
    });

    let seed = derive_seed(PHRASE, "").unwrap();
    let keychain = KeyChain::new(&seed, Network::Mainnet).unwrap();
    c.bench_function("keychain_leaf_key", |b| {
        b.iter(|| keychain.key_pair(black_box(KeyPath::external(7))).unwrap())
    });

    let xpubs = Arc::new(keychain.xpubs());
    c.bench_function("address_book_new_20_10", |b| {
        b.iter(|| AddressBook::new(xpubs.clone(), 20, 10).unwrap())
    });
    c.bench_function("address_book_mark_used", |b| {
        b.iter_batched(
            || AddressBook::new(xpubs.clone(), 20, 10).unwrap(),
            |mut book| {
                let addr = book.entries(Chain::External)[19].address;
                book.mark_used(&addr).unwrap()
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_selection(c: &mut Criterion) {
    let policy = FeePolicy::new(&FeeConfig::default(), 1_000).unwrap();
    let candidates: Vec<SpendableOutput> = (0..500u32)
        .map(|i| SpendableOutput {
            outpoint: OutPoint::new(Hash256([(i % 251) as u8; 32]), i),
            value: 1_000 + u64::from(i) * 37,
            address: Address::from_pubkey_hash([1; 20], Network::Mainnet),
            path: KeyPath::external(i),
            height: Some(i),
            sequence: u64::from(i),
        })
        .collect();

    for strategy in [SelectionStrategy::OldestFirst, SelectionStrategy::LargestFirst] {
        c.bench_function(&format!("coin_select_500_{strategy:?}"), |b| {
            b.iter_batched(
                || candidates.clone(),
                |cands| CoinSelector::select(cands, 250_000, 1, &policy, strategy).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_build(c: &mut Criterion) {
    let wallet = Wallet::from_phrase(PHRASE, "", WalletConfig::default(), Arc::new(MemoryStore::new())).unwrap();
    let funding: Vec<ObservedTransaction> = (0..10u8)
        .map(|i| {
            let to = wallet.address_at(KeyPath::external(u32::from(i))).unwrap();
            let tx = Transaction {
                inputs: vec![TxIn::unsigned(OutPoint::new(Hash256([i; 32]), 0))],
                outputs: vec![TxOut {
                    value: 50_000,
                    script_pubkey: to.script_pubkey(),
                }],
                ..Transaction::new()
            };
            ObservedTransaction::confirmed(tx, 100, 1_700_000_000)
        })
        .collect();
    wallet.apply_sync_data(&funding, &[]).unwrap();
    let dest = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";

    c.bench_function("build_and_sign_4_inputs", |b| {
        b.iter(|| {
            let built = wallet.build_transaction_with_fee_rate(black_box(180_000), dest, 1_000).unwrap();
            wallet.abandon(&built.txid()).unwrap();
        })
    });
}

criterion_group!(benches, bench_derivation, bench_selection, bench_build);
criterion_main!(benches);
