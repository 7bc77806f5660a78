//! Wallet composition: key management, output tracking, transaction creation.
//!
//! A [`Wallet`] is one explicit, injectable context. It owns the seed, the
//! signing keychain and the current [`WalletState`] snapshot, and writes
//! every state change through its [`WalletStore`].
//!
//! Readers clone an `Arc` of the current snapshot and never block on a
//! writer. Writers are serialized: each mutation clones the snapshot,
//! applies its change, saves it, and only then publishes it. A failed save
//! leaves the published snapshot untouched.

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use zeroize::Zeroizing;

use zinc_core::address::{Address, Network};
use zinc_core::types::{BlockInfo, ObservedTransaction, Transaction, Txid};

use crate::address_book::AddressBook;
use crate::builder::{BuiltTransaction, TransactionBuilder};
use crate::clock::{Clock, SystemClock};
use crate::coin_selection::SpendableOutput;
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::events::WalletEvent;
use crate::keys::{AccountXpubs, Chain, DerivedKey, KeyChain, KeyPath, Seed};
use crate::mnemonic;
use crate::store::{StoredWallet, WALLET_VERSION, WalletStore};
use crate::utxo_set::{TransactionSummary, UtxoSet};

/// Address pool and tracked outputs, published as one consistent snapshot.
#[derive(Clone, Debug)]
pub struct WalletState {
    pub addresses: AddressBook,
    pub utxos: UtxoSet,
}

/// Balance breakdown at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalletBalance {
    /// What a build may spend under the configured balance policy.
    pub spendable: u64,
    /// Unspent outputs with at least one confirmation.
    pub confirmed: u64,
    /// Unspent outputs not yet mined.
    pub unconfirmed: u64,
    /// Held by unbroadcast transactions.
    pub reserved: u64,
    /// Number of unspent outputs.
    pub utxo_count: usize,
}

/// Lazy history over one snapshot, most recent first.
///
/// Summaries are computed as the iterator advances. [`restart`](Self::restart)
/// rewinds to the newest entry of the same snapshot.
#[derive(Clone)]
pub struct TransactionHistory {
    state: Arc<WalletState>,
    order: Arc<[Txid]>,
    pos: usize,
}

impl TransactionHistory {
    fn new(state: Arc<WalletState>) -> Self {
        let order = state.utxos.history_order().into();
        Self { state, order, pos: 0 }
    }

    pub fn restart(&mut self) {
        self.pos = 0;
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Iterator for TransactionHistory {
    type Item = TransactionSummary;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(txid) = self.order.get(self.pos) {
            self.pos += 1;
            if let Some(summary) = self.state.utxos.summary(txid) {
                return Some(summary);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.order.len() - self.pos;
        (remaining, Some(remaining))
    }
}

/// HD wallet context.
pub struct Wallet {
    config: WalletConfig,
    seed: Seed,
    keychain: KeyChain,
    xpubs: Arc<AccountXpubs>,
    state: RwLock<Arc<WalletState>>,
    writer: Mutex<()>,
    store: Arc<dyn WalletStore>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<WalletEvent>,
}

impl Wallet {
    /// Create a wallet from fresh OS entropy.
    ///
    /// Returns the wallet and its seed phrase. The phrase is not kept.
    pub fn create(
        config: WalletConfig,
        store: Arc<dyn WalletStore>,
    ) -> Result<(Self, Zeroizing<String>), WalletError> {
        let (phrase, seed) = mnemonic::generate_random_seed("")?;
        let wallet = Self::from_seed(seed, config, store)?;
        info!(network = %wallet.network(), "created wallet");
        Ok((wallet, phrase))
    }

    /// Restore a wallet from a seed phrase. Discovery of past activity is
    /// left to sync.
    pub fn from_phrase(
        phrase: &str,
        passphrase: &str,
        config: WalletConfig,
        store: Arc<dyn WalletStore>,
    ) -> Result<Self, WalletError> {
        let seed = mnemonic::derive_seed(phrase, passphrase)?;
        Self::from_seed(seed, config, store)
    }

    /// Start a wallet from a seed with empty state and save it.
    pub fn from_seed(seed: Seed, config: WalletConfig, store: Arc<dyn WalletStore>) -> Result<Self, WalletError> {
        config.validate()?;
        let keychain = KeyChain::new(&seed, config.network)?;
        let xpubs = Arc::new(keychain.xpubs());
        let state = WalletState {
            addresses: AddressBook::new(xpubs.clone(), config.receive_gap_limit, config.change_gap_limit)?,
            utxos: UtxoSet::new(),
        };
        let wallet = Self::assemble(config, seed, keychain, xpubs, state, store);
        let state = wallet.snapshot();
        wallet.persist(&state)?;
        Ok(wallet)
    }

    /// Open the wallet saved in `store`.
    ///
    /// Stored addresses are re-derived from the seed and checked. Pending
    /// reservations do not survive a reload.
    pub fn load(config: WalletConfig, store: Arc<dyn WalletStore>) -> Result<Self, WalletError> {
        config.validate()?;
        let stored = store.load()?.ok_or(WalletError::NoWallet)?;
        if stored.network != config.network {
            return Err(WalletError::InvalidConfig(format!(
                "wallet is for {} but config selects {}",
                stored.network, config.network
            )));
        }
        let keychain = KeyChain::new(&stored.seed, config.network)?;
        let xpubs = Arc::new(keychain.xpubs());
        let addresses = AddressBook::restore(
            xpubs.clone(),
            config.receive_gap_limit,
            config.change_gap_limit,
            stored.addresses,
        )?;
        let state = WalletState {
            addresses,
            utxos: stored.utxos,
        };
        info!(
            network = %config.network,
            addresses = state.addresses.len(),
            outputs = state.utxos.outputs().count(),
            "loaded wallet"
        );
        Ok(Self::assemble(config, stored.seed, keychain, xpubs, state, store))
    }

    fn assemble(
        config: WalletConfig,
        seed: Seed,
        keychain: KeyChain,
        xpubs: Arc<AccountXpubs>,
        state: WalletState,
        store: Arc<dyn WalletStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_capacity);
        Self {
            config,
            seed,
            keychain,
            xpubs,
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
            store,
            clock: Arc::new(SystemClock),
            events,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // --- Accessors ---

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Current time according to the wallet's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// The current consistent snapshot.
    pub fn snapshot(&self) -> Arc<WalletState> {
        self.state.read().clone()
    }

    /// Receive events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    /// Publish an event. Never blocks; dropped when nobody listens.
    pub fn emit(&self, event: WalletEvent) {
        debug!(%event, "emitting wallet event");
        let _ = self.events.send(event);
    }

    // --- Queries ---

    /// Spendable balance under the configured policy.
    pub fn balance(&self) -> u64 {
        self.snapshot().utxos.balance(&self.config.balance, self.now())
    }

    pub fn balance_details(&self) -> WalletBalance {
        let state = self.snapshot();
        let now = self.now();
        let tip = state.utxos.tip();
        let mut balance = WalletBalance {
            spendable: state.utxos.balance(&self.config.balance, now),
            reserved: state.utxos.reserved_value(now),
            ..WalletBalance::default()
        };
        for out in state.utxos.unspent().filter(|o| !o.conflicted) {
            if out.confirmations(tip) > 0 {
                balance.confirmed += out.value;
            } else {
                balance.unconfirmed += out.value;
            }
        }
        balance.utxo_count = state.utxos.unspent().count();
        balance
    }

    /// Lowest-index unused receive address.
    pub fn receive_address(&self) -> Result<Address, WalletError> {
        self.snapshot().addresses.next_unused(Chain::External)
    }

    pub fn is_owned(&self, address: &Address) -> bool {
        self.snapshot().addresses.is_owned(address)
    }

    /// Parse `address` for this wallet's network and report whether it is ours.
    pub fn check_address(&self, address: &str) -> Result<bool, WalletError> {
        let address = Address::decode_for(address, self.network())?;
        Ok(self.is_owned(&address))
    }

    pub fn recent_transactions(&self) -> TransactionHistory {
        TransactionHistory::new(self.snapshot())
    }

    /// Public half of the key at `path`.
    pub fn derive_key(&self, path: KeyPath) -> Result<DerivedKey, WalletError> {
        self.keychain.key_pair(path)
    }

    /// Address at `path`, derived from the account public keys.
    pub fn address_at(&self, path: KeyPath) -> Result<Address, WalletError> {
        self.xpubs.address_at(path)
    }

    /// Every address the provider should watch: used and lookahead, both chains.
    pub fn watch_addresses(&self) -> Vec<Address> {
        self.snapshot().addresses.addresses().copied().collect()
    }

    // --- Mutation ---

    fn stored(&self, state: &WalletState) -> StoredWallet {
        StoredWallet {
            version: WALLET_VERSION,
            network: self.network(),
            seed: self.seed.clone(),
            addresses: state.addresses.to_data(),
            utxos: state.utxos.clone(),
        }
    }

    fn persist(&self, state: &WalletState) -> Result<(), WalletError> {
        self.store.save(&self.stored(state))
    }

    /// Apply `f` to a copy of the state and publish it once saved.
    fn mutate<T>(&self, f: impl FnOnce(&mut WalletState) -> Result<T, WalletError>) -> Result<T, WalletError> {
        self.commit(true, f)
    }

    /// Like [`mutate`](Self::mutate) for changes that are never persisted.
    fn mutate_volatile<T>(
        &self,
        f: impl FnOnce(&mut WalletState) -> Result<T, WalletError>,
    ) -> Result<T, WalletError> {
        self.commit(false, f)
    }

    fn commit<T>(
        &self,
        persist: bool,
        f: impl FnOnce(&mut WalletState) -> Result<T, WalletError>,
    ) -> Result<T, WalletError> {
        let _writer = self.writer.lock();
        let mut next = WalletState::clone(&self.snapshot());
        let out = f(&mut next)?;
        if persist {
            self.persist(&next)?;
        }
        *self.state.write() = Arc::new(next);
        Ok(out)
    }

    /// Build and sign a payment at the configured default fee rate.
    pub fn build_transaction(&self, amount: u64, destination: &str) -> Result<BuiltTransaction, WalletError> {
        self.build_transaction_with_fee_rate(amount, destination, self.config.fees.default_fee_rate_per_kb)
    }

    /// Build and sign a payment of `amount` to `destination`.
    ///
    /// The consumed outputs are reserved until the transaction is broadcast,
    /// abandoned, or the reservation expires. Nothing is broadcast.
    pub fn build_transaction_with_fee_rate(
        &self,
        amount: u64,
        destination: &str,
        fee_rate_per_kb: u64,
    ) -> Result<BuiltTransaction, WalletError> {
        let destination = Address::decode_for(destination, self.network())?;
        if amount == 0 {
            return Err(WalletError::InvalidAmount("amount must be non-zero".into()));
        }

        let now = self.now();
        let ttl = i64::try_from(self.config.reservation_ttl_secs).unwrap_or(i64::MAX);
        let built = self.mutate(|state| {
            let balance = state.utxos.balance(&self.config.balance, now);
            if amount > balance {
                return Err(WalletError::InsufficientFunds {
                    have: balance,
                    need: amount,
                });
            }

            let spendable = spendable_outputs(state, &self.config, now)?;
            let change_address = state.addresses.next_unused(Chain::Internal)?;

            let mut builder = TransactionBuilder::new();
            builder
                .add_recipient(destination, amount)
                .set_fee_rate(fee_rate_per_kb)
                .set_strategy(self.config.selection_strategy);
            let unsigned = builder.build(spendable, &change_address, &self.config.fees)?;
            let built = TransactionBuilder::sign(unsigned, &self.keychain)?;

            let txid = built.txid();
            let outpoints = built.inputs.iter().map(|i| i.outpoint).collect();
            state.utxos.reserve(txid, outpoints, now.saturating_add(ttl), now)?;
            if let Some(change) = &built.change {
                state.addresses.mark_used(&change.address)?;
            }
            Ok(built)
        })?;

        info!(
            txid = %built.txid(),
            amount,
            fee = built.fee,
            inputs = built.inputs.len(),
            change = built.change.as_ref().map_or(0, |c| c.amount),
            "built transaction"
        );
        Ok(built)
    }

    /// Release the inputs of an unbroadcast transaction.
    pub fn abandon(&self, txid: &Txid) -> Result<bool, WalletError> {
        let released = self.release_reservation(txid)?;
        if released {
            info!(%txid, "abandoned transaction");
        }
        Ok(released)
    }

    pub fn release_reservation(&self, txid: &Txid) -> Result<bool, WalletError> {
        self.mutate_volatile(|state| Ok(state.utxos.release(txid).is_some()))
    }

    /// Drop reservations whose time is up. Returns their txids.
    pub fn release_expired(&self) -> Result<Vec<Txid>, WalletError> {
        let now = self.now();
        let expired = self.mutate_volatile(|state| Ok(state.utxos.release_expired(now)))?;
        if !expired.is_empty() {
            debug!(count = expired.len(), "released expired reservations");
        }
        Ok(expired)
    }

    pub fn release_all_reservations(&self) -> Result<usize, WalletError> {
        self.mutate_volatile(|state| Ok(state.utxos.release_all()))
    }

    /// Ingest a batch of provider data atomically.
    ///
    /// Either every transaction and block is applied and saved, or none is.
    /// Returns addresses derived because the batch used part of the
    /// lookahead; they still need to be watched.
    pub fn apply_sync_data(
        &self,
        transactions: &[ObservedTransaction],
        blocks: &[BlockInfo],
    ) -> Result<Vec<Address>, WalletError> {
        let (new_txs, new_addresses) = self.mutate(|state| {
            let mut new_txs = 0usize;
            let mut new_addresses = Vec::new();
            for observed in transactions {
                let outcome = state.utxos.ingest(observed, &mut state.addresses)?;
                new_txs += usize::from(outcome.is_new);
                new_addresses.extend(outcome.new_addresses);
            }
            for block in blocks {
                state.utxos.apply_block(block);
            }
            Ok((new_txs, new_addresses))
        })?;
        info!(
            transactions = transactions.len(),
            new = new_txs,
            blocks = blocks.len(),
            derived = new_addresses.len(),
            "applied sync data"
        );
        Ok(new_addresses)
    }

    /// Record a transaction the provider accepted.
    ///
    /// Its reservation is released and the transaction is ingested locally
    /// so its inputs are spent and its change becomes unconfirmed balance.
    pub fn confirm_broadcast(&self, tx: &Transaction) -> Result<Vec<Address>, WalletError> {
        let txid = tx.txid();
        let observed = ObservedTransaction::unconfirmed(tx.clone(), self.now().max(0) as u64);
        self.mutate(|state| {
            state.utxos.release(&txid);
            Ok(state.utxos.ingest(&observed, &mut state.addresses)?.new_addresses)
        })
    }
}

/// Outputs a build may consume, with the derivation path of each.
fn spendable_outputs(
    state: &WalletState,
    config: &WalletConfig,
    now: i64,
) -> Result<Vec<SpendableOutput>, WalletError> {
    state
        .utxos
        .spendable(&config.balance, now)
        .map(|out| {
            let path = state.addresses.path_of(&out.address).ok_or_else(|| {
                error!(outpoint = %out.outpoint, address = %out.address, "tracked output pays an unknown address");
                WalletError::Inconsistent(format!("no derivation path for {}", out.address))
            })?;
            Ok(SpendableOutput {
                outpoint: out.outpoint,
                value: out.value,
                address: out.address,
                path,
                height: out.height,
                sequence: out.sequence,
            })
        })
        .collect()
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.snapshot();
        f.debug_struct("Wallet")
            .field("network", &self.network())
            .field("addresses", &state.addresses.len())
            .field("outputs", &state.utxos.unspent().count())
            .finish()
    }
}
