//! AES-256-GCM wallet file encryption.
//!
//! The encryption key is derived from the password with Argon2id using the
//! crate's default parameters.
//!
//! # Wire format
//! ```text
//! salt (16 bytes) || nonce (12 bytes) || ciphertext + auth_tag
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::WalletError;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

const TAG_LEN: usize = 16;

/// Minimum encrypted payload size (salt + nonce + auth tag).
const MIN_ENCRYPTED_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

/// Derive a 256-bit encryption key from a password and salt using Argon2id.
pub fn derive_key(password: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(password, salt, &mut key[..])
        .map_err(|e| WalletError::Encryption(format!("key derivation failed: {e}")))?;
    Ok(key)
}

/// An Argon2id-derived key together with the salt it was derived from.
///
/// Deriving is the expensive step, so a store derives once and seals every
/// later write with the same key and a fresh nonce.
pub struct SealingKey {
    salt: [u8; SALT_LEN],
    key: Zeroizing<[u8; 32]>,
}

impl SealingKey {
    /// Derive a key under a fresh random salt.
    pub fn generate(password: &[u8]) -> Result<Self, WalletError> {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| WalletError::RandomSource(e.to_string()))?;
        Self::derive(password, salt)
    }

    pub fn derive(password: &[u8], salt: [u8; SALT_LEN]) -> Result<Self, WalletError> {
        let key = derive_key(password, &salt)?;
        Ok(Self { salt, key })
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// True if `encrypted` was sealed under this key's salt.
    pub fn matches(&self, encrypted: &[u8]) -> bool {
        encrypted.get(..SALT_LEN) == Some(&self.salt[..])
    }

    fn cipher(&self) -> Result<Aes256Gcm, WalletError> {
        Aes256Gcm::new_from_slice(&self.key[..]).map_err(|e| WalletError::Encryption(e.to_string()))
    }

    /// Encrypt under a fresh nonce. Returns `salt || nonce || ciphertext+tag`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, WalletError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| WalletError::RandomSource(e.to_string()))?;
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| WalletError::Encryption(e.to_string()))?;

        let mut result = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&self.salt);
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt a payload sealed under this key.
    pub fn open(&self, encrypted: &[u8]) -> Result<Zeroizing<Vec<u8>>, WalletError> {
        let (salt, nonce_bytes, ciphertext) = split(encrypted)?;
        if salt != self.salt {
            return Err(WalletError::InvalidPassword);
        }
        self.cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| WalletError::InvalidPassword)
    }
}

fn split(encrypted: &[u8]) -> Result<([u8; SALT_LEN], &[u8], &[u8]), WalletError> {
    if encrypted.len() < MIN_ENCRYPTED_LEN {
        return Err(WalletError::CorruptedFile(format!(
            "encrypted data too short: {} < {MIN_ENCRYPTED_LEN}",
            encrypted.len()
        )));
    }
    let (salt, rest) = encrypted.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
    let mut salt_bytes = [0u8; SALT_LEN];
    salt_bytes.copy_from_slice(salt);
    Ok((salt_bytes, nonce_bytes, ciphertext))
}

/// Encrypt plaintext with a password under a fresh salt and nonce.
pub fn encrypt(plaintext: &[u8], password: &[u8]) -> Result<Vec<u8>, WalletError> {
    SealingKey::generate(password)?.seal(plaintext)
}

/// Decrypt with a password, also returning the derived key so later writes
/// can reuse it.
///
/// Returns [`WalletError::InvalidPassword`] if authentication fails, which
/// covers both a wrong password and a tampered payload.
pub fn open(encrypted: &[u8], password: &[u8]) -> Result<(Zeroizing<Vec<u8>>, SealingKey), WalletError> {
    let (salt, _, _) = split(encrypted)?;
    let key = SealingKey::derive(password, salt)?;
    let plaintext = key.open(encrypted)?;
    Ok((plaintext, key))
}

/// Decrypt data produced by [`encrypt`].
pub fn decrypt(encrypted: &[u8], password: &[u8]) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    open(encrypted, password).map(|(plaintext, _)| plaintext)
}
