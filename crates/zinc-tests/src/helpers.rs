//! Shared test helpers for E2E and adversarial tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;

use zinc_core::address::{Address, Network};
use zinc_core::error::ProviderError;
use zinc_core::traits::{ProviderEvent, SyncProvider};
use zinc_core::types::{BlockInfo, Hash256, ObservedTransaction, OutPoint, Transaction, TxIn, TxOut, Txid};
use zinc_wallet::{ManualClock, MemoryStore, SyncCoordinator, Wallet, WalletConfig, WalletStore};

/// The all-"abandon" BIP-39 test phrase.
pub const ABANDON_PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// First receive address of [`ABANDON_PHRASE`] on mainnet.
pub const ABANDON_ADDRESS_0: &str = "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA";

/// An address no test wallet owns.
pub const FOREIGN_ADDRESS: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";

/// Seconds between simulated blocks.
pub const BLOCK_INTERVAL: u64 = 600;

/// Time of the simulated genesis.
pub const GENESIS_TIME: u64 = 1_700_000_000;

/// Deterministic foreign address from a seed byte.
pub fn foreign(seed: u8) -> Address {
    Address::from_pubkey_hash([seed; 20], Network::Mainnet)
}

/// A transaction paying `value` to `to`, funded from an outpoint no wallet owns.
///
/// `nonce` makes the txid unique.
pub fn payment(to: &Address, value: u64, nonce: u32) -> Transaction {
    let mut marker = [0xEE; 32];
    marker[..4].copy_from_slice(&nonce.to_le_bytes());
    Transaction {
        inputs: vec![TxIn::unsigned(OutPoint::new(Hash256(marker), 0))],
        outputs: vec![TxOut {
            value,
            script_pubkey: to.script_pubkey(),
        }],
        ..Transaction::new()
    }
}

/// Small gap limits keep address pools easy to reason about.
pub fn test_config() -> WalletConfig {
    WalletConfig {
        receive_gap_limit: 5,
        change_gap_limit: 3,
        ..WalletConfig::default()
    }
}

/// A wallet under test with handles on its store and clock.
pub struct TestWallet {
    pub wallet: Arc<Wallet>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl TestWallet {
    /// Restore `phrase` over a fresh memory store, clock at [`GENESIS_TIME`].
    pub fn restore(phrase: &str, config: WalletConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(GENESIS_TIME as i64));
        let wallet = Wallet::from_phrase(phrase, "", config, store.clone())
            .unwrap()
            .with_clock(clock.clone());
        Self {
            wallet: Arc::new(wallet),
            store,
            clock,
        }
    }

    /// [`ABANDON_PHRASE`] with [`test_config`].
    pub fn abandon() -> Self {
        Self::restore(ABANDON_PHRASE, test_config())
    }

    /// Reopen the wallet from what its store holds.
    pub fn reload(&self) -> Arc<Wallet> {
        let store: Arc<dyn WalletStore> = self.store.clone();
        let wallet = Wallet::load(self.wallet.config().clone(), store)
            .unwrap()
            .with_clock(self.clock.clone());
        Arc::new(wallet)
    }
}

/// A wallet, a mock provider, and a coordinator joining them.
pub struct Harness {
    pub wallet: TestWallet,
    pub provider: Arc<MockProvider>,
    pub coordinator: SyncCoordinator,
    pub events: mpsc::Receiver<ProviderEvent>,
}

impl Harness {
    pub fn new(wallet: TestWallet) -> Self {
        let (provider, events) = MockProvider::new();
        let coordinator = SyncCoordinator::new(wallet.wallet.clone(), provider.clone());
        Self {
            wallet,
            provider,
            coordinator,
            events,
        }
    }

    pub fn abandon() -> Self {
        Self::new(TestWallet::abandon())
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet.wallet
    }

    /// Start syncing and process everything the provider sends back.
    pub async fn start(&mut self) {
        self.coordinator.start().await.unwrap();
        self.drain().await;
    }

    /// Process queued provider events.
    pub async fn drain(&mut self) -> usize {
        drain(&self.coordinator, &mut self.events).await
    }
}

#[derive(Default)]
struct Chain {
    /// Every transaction known to the simulated network, with its height.
    transactions: Vec<(Transaction, Option<u32>)>,
    blocks: Vec<BlockInfo>,
    watched: BTreeSet<Address>,
    broadcasts: Vec<Transaction>,
    watch_failure: Option<ProviderError>,
    broadcast_failure: Option<ProviderError>,
    /// Events are dropped and watch calls fail.
    offline: bool,
    nonce: u32,
}

impl Chain {
    fn height(&self) -> u32 {
        self.blocks.last().map_or(0, |b| b.height)
    }

    fn time(&self) -> u64 {
        GENESIS_TIME + u64::from(self.height()) * BLOCK_INTERVAL
    }

    fn pays_watched(&self, out: &TxOut) -> bool {
        Address::from_script_pubkey(&out.script_pubkey, Network::Mainnet)
            .is_some_and(|a| self.watched.contains(&a))
    }

    /// Pays or spends from a watched address.
    fn is_relevant(&self, tx: &Transaction) -> bool {
        tx.outputs.iter().any(|o| self.pays_watched(o))
            || tx.inputs.iter().any(|i| {
                self.transactions
                    .iter()
                    .find(|(t, _)| t.txid() == i.previous_output.txid)
                    .and_then(|(t, _)| t.outputs.get(i.previous_output.vout as usize))
                    .is_some_and(|o| self.pays_watched(o))
            })
    }

    fn observed(&self, tx: &Transaction, height: Option<u32>) -> ObservedTransaction {
        ObservedTransaction {
            tx: tx.clone(),
            height,
            timestamp: self.time(),
            conflicted: false,
        }
    }

    /// Everything on the chain touching a watched address.
    fn relevant(&self) -> Vec<ObservedTransaction> {
        self.transactions
            .iter()
            .filter(|(tx, _)| self.is_relevant(tx))
            .map(|(tx, h)| self.observed(tx, *h))
            .collect()
    }
}

/// Scripted sync provider backed by a simulated chain.
///
/// Every watch call rescans: it delivers all matching transactions on the
/// chain (including ones delivered before), the known blocks, then
/// `CaughtUp`. New transactions and blocks are pushed to
/// the event channel as they happen.
pub struct MockProvider {
    events: mpsc::Sender<ProviderEvent>,
    chain: Mutex<Chain>,
}

impl MockProvider {
    pub fn new() -> (Arc<Self>, mpsc::Receiver<ProviderEvent>) {
        let (events, rx) = mpsc::channel(1024);
        let provider = Arc::new(Self {
            events,
            chain: Mutex::new(Chain::default()),
        });
        (provider, rx)
    }

    async fn push(&self, events: Vec<ProviderEvent>) {
        if self.chain.lock().offline {
            return;
        }
        for event in events {
            // Receiver may be gone once a test is done with it.
            let _ = self.events.send(event).await;
        }
    }

    /// Inject a raw provider event.
    pub async fn emit(&self, event: ProviderEvent) {
        self.push(vec![event]).await;
    }

    /// Add a transaction to the mempool and deliver it if it touches a
    /// watched address.
    pub async fn submit(&self, tx: Transaction) {
        let events = {
            let mut chain = self.chain.lock();
            let relevant = chain.is_relevant(&tx);
            let observed = chain.observed(&tx, None);
            chain.transactions.push((tx, None));
            if relevant {
                vec![ProviderEvent::Transactions(vec![observed])]
            } else {
                vec![]
            }
        };
        self.push(events).await;
    }

    /// Pay `value` to `to` from outside any wallet.
    pub async fn fund(&self, to: &Address, value: u64) -> Transaction {
        let tx = {
            let mut chain = self.chain.lock();
            chain.nonce += 1;
            payment(to, value, chain.nonce)
        };
        self.submit(tx.clone()).await;
        tx
    }

    /// Mine every mempool transaction into a new block.
    pub async fn mine(&self) -> BlockInfo {
        let (block, events) = {
            let mut chain = self.chain.lock();
            let height = chain.height() + 1;
            let relevant: Vec<Txid> = chain
                .transactions
                .iter()
                .filter(|(tx, h)| h.is_none() && chain.is_relevant(tx))
                .map(|(tx, _)| tx.txid())
                .collect();
            for (_, h) in chain.transactions.iter_mut() {
                if h.is_none() {
                    *h = Some(height);
                }
            }
            let mut hash = [0xB0; 32];
            hash[..4].copy_from_slice(&height.to_le_bytes());
            let block = BlockInfo {
                height,
                hash: Hash256(hash),
                timestamp: GENESIS_TIME + u64::from(height) * BLOCK_INTERVAL,
                txids: relevant,
            };
            chain.blocks.push(block.clone());
            (block.clone(), vec![ProviderEvent::Blocks(vec![block])])
        };
        self.push(events).await;
        block
    }

    /// Mine `n` blocks.
    pub async fn mine_n(&self, n: u32) {
        for _ in 0..n {
            self.mine().await;
        }
    }

    /// While offline nothing is delivered; the chain keeps moving.
    pub fn set_offline(&self, offline: bool) {
        self.chain.lock().offline = offline;
    }

    pub fn fail_watch(&self, error: Option<ProviderError>) {
        self.chain.lock().watch_failure = error;
    }

    pub fn fail_broadcast(&self, error: Option<ProviderError>) {
        self.chain.lock().broadcast_failure = error;
    }

    pub fn watched(&self) -> Vec<Address> {
        self.chain.lock().watched.iter().copied().collect()
    }

    pub fn broadcasts(&self) -> Vec<Transaction> {
        self.chain.lock().broadcasts.clone()
    }

    pub fn height(&self) -> u32 {
        self.chain.lock().height()
    }
}

#[async_trait]
impl SyncProvider for MockProvider {
    async fn watch(&self, addresses: &[Address]) -> Result<(), ProviderError> {
        let events = {
            let mut chain = self.chain.lock();
            if let Some(e) = chain.watch_failure.clone() {
                return Err(e);
            }
            if chain.offline {
                return Err(ProviderError::Unavailable("offline".into()));
            }
            chain.watched.extend(addresses.iter().copied());
            let relevant = chain.relevant();
            let mut events = Vec::new();
            if !relevant.is_empty() {
                events.push(ProviderEvent::Transactions(relevant));
            }
            if !chain.blocks.is_empty() {
                events.push(ProviderEvent::Blocks(chain.blocks.clone()));
            }
            events.push(ProviderEvent::CaughtUp);
            events
        };
        self.push(events).await;
        Ok(())
    }

    async fn unwatch(&self, addresses: &[Address]) -> Result<(), ProviderError> {
        let mut chain = self.chain.lock();
        for a in addresses {
            chain.watched.remove(a);
        }
        Ok(())
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<(), ProviderError> {
        {
            let mut chain = self.chain.lock();
            if let Some(e) = chain.broadcast_failure.clone() {
                return Err(e);
            }
            chain.broadcasts.push(tx.clone());
        }
        self.submit(tx.clone()).await;
        Ok(())
    }
}

/// Feed every queued provider event to the coordinator, including events
/// the coordinator's own watch calls cause.
pub async fn drain(coordinator: &SyncCoordinator, events: &mut mpsc::Receiver<ProviderEvent>) -> usize {
    let mut handled = 0;
    while let Ok(event) = events.try_recv() {
        coordinator.handle(event).await;
        handled += 1;
    }
    handled
}
