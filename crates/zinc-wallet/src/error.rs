//! Wallet error types.

use thiserror::Error;
use zinc_core::error::{AddressError, CryptoError, EncodeError, ProviderError};

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Seed phrase failed word-list or checksum validation.
    #[error("invalid seed phrase: {0}")]
    InvalidPhrase(String),

    /// Destination address failed format, checksum or network validation.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Insufficient funds to cover the transaction amount plus fees.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Spendable balance in satoshis.
        have: u64,
        /// Required amount in satoshis.
        need: u64,
    },

    /// Requested fee rate is below the network relay minimum.
    #[error("fee rate {rate} sat/kB is below the minimum of {minimum} sat/kB")]
    FeeTooLow {
        /// Requested rate.
        rate: u64,
        /// Relay minimum.
        minimum: u64,
    },

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The transaction would exceed the standard size limit.
    #[error("transaction too large: {size} > {max} bytes")]
    TransactionTooLarge {
        /// Estimated size in bytes.
        size: usize,
        /// Largest standard size.
        max: usize,
    },

    /// An input could not be signed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The sync provider failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The network refused a broadcast transaction.
    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),

    /// The OS random number generator is unavailable.
    #[error("random source unavailable: {0}")]
    RandomSource(String),

    /// Key derivation failure.
    #[error("key derivation: {0}")]
    KeyDerivation(String),

    /// Encryption failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// Decryption failure.
    #[error("decryption: {0}")]
    Decryption(String),

    /// Wrong password for wallet file.
    #[error("invalid password")]
    InvalidPassword,

    /// Wallet file is corrupted or has invalid format.
    #[error("corrupted file: {0}")]
    CorruptedFile(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// The wallet store failed to persist state.
    #[error("storage: {0}")]
    Storage(String),

    /// No wallet has been saved in the store.
    #[error("no wallet found")]
    NoWallet,

    /// Invalid configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Internal invariant violated. The operation was aborted.
    #[error("internal inconsistency: {0}")]
    Inconsistent(String),

    /// Cryptographic error from zinc-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Raw transaction data could not be decoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::Io(e.to_string())
    }
}

impl From<bip32::Error> for WalletError {
    fn from(e: bip32::Error) -> Self {
        WalletError::KeyDerivation(e.to_string())
    }
}
