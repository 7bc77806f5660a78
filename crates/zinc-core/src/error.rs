//! Error types shared by the Zinc crates.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unexpected end of data: needed {needed} more bytes")] UnexpectedEof { needed: usize },
    #[error("{0} trailing bytes after transaction")] TrailingBytes(usize),
    #[error("non-canonical compact size")] NonCanonicalSize,
    #[error("oversized: {size} > {max}")] Oversized { size: usize, max: usize },
    #[error("value overflow")] ValueOverflow,
    #[error("invalid hex: {0}")] InvalidHex(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("public key does not match the output being spent")] PubkeyHashMismatch,
    #[error("unsupported script")] UnsupportedScript,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
    #[error("signing failed: {0}")] SigningFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("empty address")] Empty,
    #[error("invalid base58 encoding: {0}")] InvalidEncoding(String),
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid length: {0}")] InvalidLength(usize),
    #[error("unknown version byte: {0:#04x}")] InvalidVersion(u8),
    #[error("address is for {found}, wallet is on {expected}")] WrongNetwork { expected: String, found: String },
}

/// Failures reported by a sync provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The network refused the transaction.
    #[error("rejected: {0}")] Rejected(String),
    #[error("timeout")] Timeout,
    #[error("unavailable: {0}")] Unavailable(String),
    #[error("{0}")] Other(String),
}

impl ProviderError {
    /// Whether the provider refused the request, as opposed to failing to deliver it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ProviderError::Rejected(_))
    }
}

#[derive(Error, Debug)]
pub enum ZincError {
    #[error(transparent)] Encode(#[from] EncodeError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Address(#[from] AddressError),
    #[error(transparent)] Provider(#[from] ProviderError),
}
