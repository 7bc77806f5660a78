//! # zinc-wallet: non-custodial HD wallet.
//!
//! Turns a BIP-39 seed phrase into a BIP-44 key hierarchy, tracks the
//! outputs that pay the wallet's gap-limited address pool, builds and signs
//! payments, and keeps itself in step with a sync provider.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`mnemonic`]: seed phrase generation and parsing
//! - [`keys`]: Seed, KeyChain, BIP-32 derivation
//! - [`address_book`]: gap-limited address pool
//! - [`utxo_set`]: owned outputs, balance, reservations, history
//! - [`fee`]: size estimation and fee policy
//! - [`coin_selection`]: deterministic UTXO selection
//! - [`builder`]: transaction builder with signing
//! - [`encryption`]: AES-256-GCM wallet file encryption
//! - [`store`]: persistence seam and file/memory stores
//! - [`wallet`]: the wallet context
//! - [`sync`]: sync state machine driving a provider

pub mod address_book;
pub mod builder;
pub mod clock;
pub mod coin_selection;
pub mod config;
pub mod encryption;
pub mod error;
pub mod events;
pub mod fee;
pub mod keys;
pub mod mnemonic;
pub mod store;
pub mod sync;
pub mod utxo_set;
pub mod wallet;

// Re-exports for convenient access
pub use address_book::{AddressBook, AddressEntry};
pub use builder::{BuiltTransaction, Recipient, TransactionBuilder, UnsignedTransaction};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coin_selection::{CoinSelection, CoinSelector, SelectionStrategy, SpendableOutput};
pub use config::{BalancePolicy, FeeConfig, WalletConfig};
pub use encryption::{decrypt, encrypt};
pub use error::WalletError;
pub use events::WalletEvent;
pub use fee::FeePolicy;
pub use keys::{Chain, DerivedKey, KeyChain, KeyPath, Seed, derive_key_pair};
pub use mnemonic::{derive_seed, generate_random_seed, validate_phrase};
pub use store::{FileStore, MemoryStore, StoredWallet, WalletStore};
pub use sync::{SyncCoordinator, SyncState};
pub use utxo_set::{TransactionSummary, UtxoSet, WalletOutput};
pub use wallet::{TransactionHistory, Wallet, WalletBalance, WalletState};
