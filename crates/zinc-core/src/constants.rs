//! Protocol and policy constants. All monetary values in satoshis (1 BTC = 10^8 sat).

pub const COIN: u64 = 100_000_000;

/// Upper bound on any single amount or sum of amounts.
pub const MAX_MONEY: u64 = 21_000_000 * COIN;

/// Default fee rate offered by the wallet, per 1000 bytes.
pub const DEFAULT_FEE_PER_KB: u64 = 10_000;

/// Minimum relay fee rate accepted by the network, per 1000 bytes.
pub const MIN_RELAY_FEE_PER_KB: u64 = 1_000;

/// Outputs below this value are non-standard and will not be relayed.
pub const DUST_THRESHOLD: u64 = 546;

/// Upper bound on the serialized size of a signed P2PKH input.
///
/// outpoint (36) + script length (1) + scriptSig (<= 107) + sequence (4).
pub const TX_INPUT_SIZE: usize = 148;

/// Serialized size of a P2PKH output: value (8) + script length (1) + script (25).
pub const TX_OUTPUT_SIZE: usize = 34;

/// Fixed part of a transaction: version (4) + lock_time (4).
pub const TX_FIXED_SIZE: usize = 8;

/// Largest transaction the wallet will build, in bytes.
pub const MAX_STANDARD_TX_SIZE: usize = 100_000;

/// Default transaction version.
pub const TX_VERSION: i32 = 1;

/// Final sequence number (no relative lock, no replace-by-fee).
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Legacy signature hash type committing to all inputs and outputs.
pub const SIGHASH_ALL: u32 = 0x01;

/// Base58Check version byte for mainnet P2PKH addresses.
pub const MAINNET_PUBKEY_HASH_VERSION: u8 = 0x00;

/// Base58Check version byte for testnet P2PKH addresses.
pub const TESTNET_PUBKEY_HASH_VERSION: u8 = 0x6f;

/// BIP-44 purpose field.
pub const BIP44_PURPOSE: u32 = 44;

/// BIP-44 registered coin type for mainnet.
pub const MAINNET_COIN_TYPE: u32 = 0;

/// BIP-44 coin type shared by all test networks.
pub const TESTNET_COIN_TYPE: u32 = 1;
