//! Seed management and BIP-32/BIP-44 key derivation.
//!
//! Keys live under the account `m/44'/coin'/0'` with two non-hardened chains:
//! external (receive) addresses on chain 0 and internal (change) addresses on
//! chain 1. Address discovery only needs the chain extended public keys
//! ([`AccountXpubs`]); private keys are derived on demand by the [`KeyChain`]
//! when an input is signed.

use bip32::{ChildNumber, XPrv, XPub};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use zinc_core::address::{Address, Network};
use zinc_core::constants::BIP44_PURPOSE;
use zinc_core::crypto::KeyPair;

use crate::error::WalletError;

/// Length of a BIP-39 seed.
pub const SEED_LEN: usize = 64;

/// A 64-byte BIP-39 seed.
///
/// Secret material is zeroized on drop to prevent leaking key material
/// in freed memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; SEED_LEN],
}

impl Seed {
    /// Create a seed from raw bytes.
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.bytes
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl PartialEq for Seed {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Seed {}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed").field("bytes", &"[REDACTED]").finish()
    }
}

impl Serialize for Seed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bytes.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Seed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = Vec::<u8>::deserialize(deserializer)?;
        if raw.len() != SEED_LEN {
            let len = raw.len();
            raw.zeroize();
            return Err(serde::de::Error::invalid_length(len, &"64 seed bytes"));
        }
        let mut bytes = [0u8; SEED_LEN];
        bytes.copy_from_slice(&raw);
        raw.zeroize();
        Ok(Self { bytes })
    }
}

/// BIP-44 chain within the account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Chain {
    /// Receive addresses handed out to payers.
    External,
    /// Change addresses used by the wallet itself.
    Internal,
}

impl Chain {
    pub fn index(&self) -> u32 {
        match self {
            Chain::External => 0,
            Chain::Internal => 1,
        }
    }
}

/// Position of a key within the account: chain and child index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyPath {
    pub chain: Chain,
    pub index: u32,
}

impl KeyPath {
    pub fn new(chain: Chain, index: u32) -> Self {
        Self { chain, index }
    }

    pub fn external(index: u32) -> Self {
        Self::new(Chain::External, index)
    }

    pub fn internal(index: u32) -> Self {
        Self::new(Chain::Internal, index)
    }

    /// Full BIP-44 path, e.g. `m/44'/0'/0'/0/5`.
    pub fn full_path(&self, network: Network) -> String {
        format!(
            "m/{BIP44_PURPOSE}'/{}'/0'/{}/{}",
            network.coin_type(),
            self.chain.index(),
            self.index
        )
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chain.index(), self.index)
    }
}

/// A key derived at a [`KeyPath`].
///
/// The public key and address are freely readable; the private key is only
/// reachable by the signing code in this crate.
#[derive(Clone, Debug)]
pub struct DerivedKey {
    path: KeyPath,
    public_key: [u8; 33],
    address: Address,
    keypair: KeyPair,
}

impl DerivedKey {
    pub fn path(&self) -> KeyPath {
        self.path
    }

    /// SEC1 compressed public key.
    pub fn public_key(&self) -> &[u8; 33] {
        &self.public_key
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn keypair(&self) -> &KeyPair {
        &self.keypair
    }
}

fn child(index: u32, hardened: bool) -> Result<ChildNumber, WalletError> {
    Ok(ChildNumber::new(index, hardened)?)
}

/// Derive the account key `m/44'/coin'/0'`.
fn account_key(seed: &Seed, network: Network) -> Result<XPrv, WalletError> {
    let mut key = XPrv::new(seed.as_bytes())?;
    for n in [BIP44_PURPOSE, network.coin_type(), 0] {
        key = key.derive_child(child(n, true)?)?;
    }
    Ok(key)
}

fn derived_from_chain(
    chain_key: &XPrv,
    path: KeyPath,
    network: Network,
) -> Result<DerivedKey, WalletError> {
    let key = chain_key.derive_child(child(path.index, false)?)?;
    let keypair = KeyPair::from_signing_key(key.private_key().clone());
    let public_key = keypair.public_key();
    Ok(DerivedKey {
        path,
        public_key,
        address: Address::from_public_key(&public_key, network),
        keypair,
    })
}

/// Derive the key at `path` directly from a seed.
///
/// Pure: the same seed, network and path always produce the same key.
pub fn derive_key_pair(
    seed: &Seed,
    network: Network,
    path: KeyPath,
) -> Result<DerivedKey, WalletError> {
    let chain_key = account_key(seed, network)?.derive_child(child(path.chain.index(), false)?)?;
    derived_from_chain(&chain_key, path, network)
}

/// Signing keys for one account.
///
/// Holds the two chain private keys and derives leaf keys on demand.
#[derive(Clone)]
pub struct KeyChain {
    network: Network,
    external: XPrv,
    internal: XPrv,
}

impl KeyChain {
    pub fn new(seed: &Seed, network: Network) -> Result<Self, WalletError> {
        let account = account_key(seed, network)?;
        Ok(Self {
            network,
            external: account.derive_child(child(Chain::External.index(), false)?)?,
            internal: account.derive_child(child(Chain::Internal.index(), false)?)?,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Derive the key at `path`.
    pub fn key_pair(&self, path: KeyPath) -> Result<DerivedKey, WalletError> {
        let chain_key = match path.chain {
            Chain::External => &self.external,
            Chain::Internal => &self.internal,
        };
        derived_from_chain(chain_key, path, self.network)
    }

    /// Public half of the chain keys.
    pub fn xpubs(&self) -> AccountXpubs {
        AccountXpubs {
            network: self.network,
            external: self.external.public_key(),
            internal: self.internal.public_key(),
        }
    }
}

impl fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyChain")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// Extended public keys of the account's two chains.
#[derive(Clone)]
pub struct AccountXpubs {
    network: Network,
    external: XPub,
    internal: XPub,
}

impl AccountXpubs {
    pub fn network(&self) -> Network {
        self.network
    }

    /// Address at `path`, derived without any private key.
    pub fn address_at(&self, path: KeyPath) -> Result<Address, WalletError> {
        let parent = match path.chain {
            Chain::External => &self.external,
            Chain::Internal => &self.internal,
        };
        let key = parent.derive_child(child(path.index, false)?)?;
        Ok(Address::from_public_key(&key.to_bytes(), self.network))
    }
}

impl fmt::Debug for AccountXpubs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountXpubs")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}
