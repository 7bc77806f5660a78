//! BIP-39 seed phrases.

use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::keys::Seed;

/// Entropy for newly generated phrases (12 words).
const NEW_PHRASE_ENTROPY_LEN: usize = 16;

/// Normalize spacing and case before parsing.
fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Generate a new 12-word phrase from the OS random source and derive its seed.
pub fn generate_random_seed(passphrase: &str) -> Result<(Zeroizing<String>, Seed), WalletError> {
    let mut entropy = Zeroizing::new([0u8; NEW_PHRASE_ENTROPY_LEN]);
    rand::rngs::OsRng
        .try_fill_bytes(&mut entropy[..])
        .map_err(|e| WalletError::RandomSource(e.to_string()))?;
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy[..])
        .map_err(|e| WalletError::InvalidPhrase(e.to_string()))?;
    let seed = seed_from_mnemonic(&mnemonic, passphrase);
    Ok((Zeroizing::new(mnemonic.to_string()), seed))
}

/// Parse a phrase and derive its 64-byte seed.
///
/// Normalizes whitespace and converts to lowercase before parsing. Fails with
/// [`WalletError::InvalidPhrase`] on an unknown word, a bad word count or a
/// checksum mismatch.
pub fn derive_seed(phrase: &str, passphrase: &str) -> Result<Seed, WalletError> {
    let normalized = Zeroizing::new(normalize(phrase));
    let mnemonic = Mnemonic::parse_in(Language::English, normalized.as_str())
        .map_err(|e| WalletError::InvalidPhrase(e.to_string()))?;
    Ok(seed_from_mnemonic(&mnemonic, passphrase))
}

/// Check a phrase without deriving anything.
pub fn validate_phrase(phrase: &str) -> Result<(), WalletError> {
    let normalized = Zeroizing::new(normalize(phrase));
    Mnemonic::parse_in(Language::English, normalized.as_str())
        .map(|_| ())
        .map_err(|e| WalletError::InvalidPhrase(e.to_string()))
}

fn seed_from_mnemonic(mnemonic: &Mnemonic, passphrase: &str) -> Seed {
    let bytes = Zeroizing::new(mnemonic.to_seed(passphrase));
    Seed::from_bytes(*bytes)
}
