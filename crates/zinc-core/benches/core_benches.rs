//! Criterion benchmarks for zinc-core hot paths.
//!
//! Covers: transaction serialization and txid, legacy sighash,
//! ECDSA input signing and verification, and address encoding.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use zinc_core::address::{Address, Network};
use zinc_core::crypto::{self, KeyPair};
use zinc_core::script;
use zinc_core::types::{Hash256, OutPoint, Transaction, TxIn, TxOut};

fn sample_transaction(kp: &KeyPair, inputs: usize) -> Transaction {
    let mut tx = Transaction::new();
    for i in 0..inputs {
        tx.inputs
            .push(TxIn::unsigned(OutPoint::new(Hash256([i as u8; 32]), i as u32)));
    }
    tx.outputs.push(TxOut {
        value: 60_000,
        script_pubkey: script::p2pkh_script_pubkey(&[0xCC; 20]),
    });
    tx.outputs.push(TxOut {
        value: 39_000,
        script_pubkey: script::p2pkh_script_pubkey(&kp.pubkey_hash()),
    });
    tx
}

fn bench_encoding(c: &mut Criterion) {
    let kp = KeyPair::from_secret_bytes(&[0x42; 32]).unwrap();
    let tx = sample_transaction(&kp, 4);
    let bytes = tx.encode();

    c.bench_function("tx_encode_4in", |b| b.iter(|| black_box(&tx).encode()));
    c.bench_function("tx_decode_4in", |b| {
        b.iter(|| Transaction::decode(black_box(&bytes)).unwrap())
    });
    c.bench_function("txid_4in", |b| b.iter(|| black_box(&tx).txid()));
}

fn bench_signing(c: &mut Criterion) {
    let kp = KeyPair::from_secret_bytes(&[0x42; 32]).unwrap();
    let prev = script::p2pkh_script_pubkey(&kp.pubkey_hash());
    let tx = sample_transaction(&kp, 4);

    c.bench_function("sighash_4in", |b| {
        b.iter(|| crypto::signature_hash(black_box(&tx), 2, &prev).unwrap())
    });

    c.bench_function("sign_input", |b| {
        b.iter_batched(
            || tx.clone(),
            |mut tx| crypto::sign_input(&mut tx, 0, &kp, &prev).unwrap(),
            criterion::BatchSize::SmallInput,
        )
    });

    let mut signed = tx.clone();
    crypto::sign_input(&mut signed, 0, &kp, &prev).unwrap();
    c.bench_function("verify_input", |b| {
        b.iter(|| crypto::verify_input(black_box(&signed), 0, &prev).unwrap())
    });
}

fn bench_address(c: &mut Criterion) {
    let kp = KeyPair::from_secret_bytes(&[0x42; 32]).unwrap();
    let addr = kp.address(Network::Mainnet);
    let encoded = addr.to_string();

    c.bench_function("address_encode", |b| b.iter(|| black_box(&addr).encode()));
    c.bench_function("address_decode", |b| {
        b.iter(|| Address::decode(black_box(&encoded)).unwrap())
    });
}

criterion_group!(benches, bench_encoding, bench_signing, bench_address);
criterion_main!(benches);
