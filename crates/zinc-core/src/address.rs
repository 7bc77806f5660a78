//! Pay-to-pubkey-hash addresses.
//!
//! An address is the Base58Check encoding of a version byte followed by the
//! 20-byte HASH160 of a compressed secp256k1 public key:
//! - Mainnet: version `0x00`, addresses start with `1`
//! - Testnet: version `0x6f`, addresses start with `m` or `n`
//!
//! The 4-byte double-SHA256 checksum catches typos before funds are sent.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    MAINNET_COIN_TYPE, MAINNET_PUBKEY_HASH_VERSION, TESTNET_COIN_TYPE, TESTNET_PUBKEY_HASH_VERSION,
};
use crate::crypto::hash160;
use crate::error::AddressError;
use crate::script;

/// Network an address (and a wallet) belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
}

impl Network {
    /// Base58Check version byte for P2PKH addresses.
    pub fn pubkey_hash_version(&self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_PUBKEY_HASH_VERSION,
            Network::Testnet => TESTNET_PUBKEY_HASH_VERSION,
        }
    }

    /// Look up the network from a P2PKH version byte.
    pub fn from_version(version: u8) -> Result<Self, AddressError> {
        match version {
            MAINNET_PUBKEY_HASH_VERSION => Ok(Network::Mainnet),
            TESTNET_PUBKEY_HASH_VERSION => Ok(Network::Testnet),
            other => Err(AddressError::InvalidVersion(other)),
        }
    }

    /// BIP-44 coin type used in derivation paths.
    pub fn coin_type(&self) -> u32 {
        match self {
            Network::Mainnet => MAINNET_COIN_TYPE,
            Network::Testnet => TESTNET_COIN_TYPE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            other => Err(AddressError::InvalidEncoding(format!("unknown network: {other}"))),
        }
    }
}

/// A P2PKH address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    network: Network,
    pubkey_hash: [u8; 20],
}

impl Address {
    pub fn from_pubkey_hash(pubkey_hash: [u8; 20], network: Network) -> Self {
        Self {
            network,
            pubkey_hash,
        }
    }

    /// Address of a SEC1-encoded (compressed) public key.
    pub fn from_public_key(public_key: &[u8], network: Network) -> Self {
        Self::from_pubkey_hash(hash160(public_key), network)
    }

    /// Recover the address paid by a locking script, if it is P2PKH.
    pub fn from_script_pubkey(script_pubkey: &[u8], network: Network) -> Option<Self> {
        script::parse_p2pkh(script_pubkey).map(|h| Self::from_pubkey_hash(h, network))
    }

    pub fn pubkey_hash(&self) -> &[u8; 20] {
        &self.pubkey_hash
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Locking script that pays this address.
    pub fn script_pubkey(&self) -> Vec<u8> {
        script::p2pkh_script_pubkey(&self.pubkey_hash)
    }

    pub fn encode(&self) -> String {
        let mut payload = [0u8; 21];
        payload[0] = self.network.pubkey_hash_version();
        payload[1..].copy_from_slice(&self.pubkey_hash);
        bs58::encode(payload).with_check().into_string()
    }

    /// Decode an address on any known network.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        let payload = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|e| match e {
                bs58::decode::Error::InvalidChecksum { .. } => AddressError::InvalidChecksum,
                other => AddressError::InvalidEncoding(other.to_string()),
            })?;
        if payload.len() != 21 {
            return Err(AddressError::InvalidLength(payload.len()));
        }
        let network = Network::from_version(payload[0])?;
        let mut pubkey_hash = [0u8; 20];
        pubkey_hash.copy_from_slice(&payload[1..]);
        Ok(Self {
            network,
            pubkey_hash,
        })
    }

    /// Decode an address and require that it belongs to `network`.
    pub fn decode_for(s: &str, network: Network) -> Result<Self, AddressError> {
        let addr = Self::decode(s)?;
        if addr.network != network {
            return Err(AddressError::WrongNetwork {
                expected: network.to_string(),
                found: addr.network.to_string(),
            });
        }
        Ok(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}
