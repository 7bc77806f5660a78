//! # zinc-core
//! Transaction, address and signing primitives for the Zinc wallet.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod encode;
pub mod error;
pub mod script;
pub mod traits;
pub mod types;

pub use address::{Address, Network};
pub use error::{AddressError, CryptoError, EncodeError, ProviderError, ZincError};
pub use types::{BlockInfo, Hash256, ObservedTransaction, OutPoint, Transaction, TxIn, TxOut, Txid};
