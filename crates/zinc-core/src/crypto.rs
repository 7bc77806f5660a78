//! secp256k1 ECDSA signing for P2PKH inputs.
//!
//! # Signing scheme
//!
//! Inputs use the legacy `SIGHASH_ALL` digest:
//! - every input's unlocking script is cleared
//! - the input being signed carries the locking script of the output it spends
//! - the 4-byte sighash type is appended and the result is double-SHA256'd
//!
//! Signatures are DER-encoded, low-S, and followed by the sighash type byte.
//! The unlocking script is `<sig> <compressed pubkey>`.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::address::{Address, Network};
use crate::constants::SIGHASH_ALL;
use crate::error::CryptoError;
use crate::script;
use crate::types::{Hash256, Transaction};

/// RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// SHA256(SHA256(data)).
pub fn sha256d(data: &[u8]) -> Hash256 {
    Hash256::hash(data)
}

/// A secp256k1 signing key.
///
/// The secret scalar is zeroized on drop by `k256`.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Build a key from a 32-byte secret scalar.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_slice(bytes).map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// SEC1 compressed public key.
    pub fn public_key(&self) -> [u8; 33] {
        compressed_pubkey(self.signing_key.verifying_key())
    }

    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.public_key())
    }

    pub fn address(&self, network: Network) -> Address {
        Address::from_pubkey_hash(self.pubkey_hash(), network)
    }

    /// Sign a 32-byte digest. Returns a low-S DER signature.
    pub fn sign_digest(&self, digest: &Hash256) -> Result<Vec<u8>, CryptoError> {
        let sig: Signature = self
            .signing_key
            .sign_prehash(digest.as_bytes())
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let sig = sig.normalize_s().unwrap_or(sig);
        Ok(sig.to_der().as_bytes().to_vec())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

fn compressed_pubkey(key: &VerifyingKey) -> [u8; 33] {
    let point = key.to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Legacy `SIGHASH_ALL` digest for input `input_index`.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    prev_script_pubkey: &[u8],
) -> Result<Hash256, CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let mut copy = tx.clone();
    for (i, input) in copy.inputs.iter_mut().enumerate() {
        input.script_sig = if i == input_index {
            prev_script_pubkey.to_vec()
        } else {
            Vec::new()
        };
    }

    let mut data = copy.encode();
    data.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
    Ok(sha256d(&data))
}

/// Sign input `input_index` in place.
///
/// `prev_script_pubkey` must be the P2PKH locking script of `keypair`.
pub fn sign_input(
    tx: &mut Transaction,
    input_index: usize,
    keypair: &KeyPair,
    prev_script_pubkey: &[u8],
) -> Result<(), CryptoError> {
    let owner = script::parse_p2pkh(prev_script_pubkey).ok_or(CryptoError::UnsupportedScript)?;
    if owner != keypair.pubkey_hash() {
        return Err(CryptoError::PubkeyHashMismatch);
    }

    let sighash = signature_hash(tx, input_index, prev_script_pubkey)?;
    let mut sig = keypair.sign_digest(&sighash)?;
    sig.push(SIGHASH_ALL as u8);

    tx.inputs[input_index].script_sig = script::p2pkh_script_sig(&sig, &keypair.public_key())?;
    Ok(())
}

/// Verify input `input_index` against the output it spends.
///
/// Checks that:
/// 1. The unlocking script is `<sig> <pubkey>` with a `SIGHASH_ALL` signature
/// 2. The pubkey hashes to the owner named in `prev_script_pubkey`
/// 3. The signature verifies against the legacy sighash
pub fn verify_input(
    tx: &Transaction,
    input_index: usize,
    prev_script_pubkey: &[u8],
) -> Result<(), CryptoError> {
    let input = tx.inputs.get(input_index).ok_or(CryptoError::InputIndexOutOfBounds {
        index: input_index,
        len: tx.inputs.len(),
    })?;
    let owner = script::parse_p2pkh(prev_script_pubkey).ok_or(CryptoError::UnsupportedScript)?;

    let (sig_with_type, pubkey) = script::parse_p2pkh_script_sig(&input.script_sig)?;
    let (&hash_type, der) = sig_with_type
        .split_last()
        .ok_or(CryptoError::InvalidSignature)?;
    if u32::from(hash_type) != SIGHASH_ALL {
        return Err(CryptoError::InvalidSignature);
    }

    if hash160(pubkey) != owner {
        return Err(CryptoError::PubkeyHashMismatch);
    }
    let key = VerifyingKey::from_sec1_bytes(pubkey).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = Signature::from_der(der).map_err(|_| CryptoError::InvalidSignature)?;

    let sighash = signature_hash(tx, input_index, prev_script_pubkey)?;
    key.verify_prehash(sighash.as_bytes(), &sig)
        .map_err(|_| CryptoError::VerificationFailed)
}
