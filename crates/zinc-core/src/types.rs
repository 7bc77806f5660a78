//! Core protocol types: transactions, outpoints, and the block/transaction
//! records delivered by a sync provider.
//!
//! All monetary values are in satoshis. Transactions use the legacy
//! consensus serialization so that byte sizes (and therefore fees) match
//! what the network measures.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::constants::{SEQUENCE_FINAL, TX_VERSION};
use crate::encode::{self, Reader};
use crate::error::EncodeError;

/// A 32-byte double-SHA256 digest.
///
/// Stored in internal byte order; displayed byte-reversed, which is how
/// explorers and RPC interfaces print transaction and block hashes.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

/// Transaction identifier.
pub type Txid = Hash256;

/// Block header hash.
pub type BlockHash = Hash256;

impl Hash256 {
    /// The zero hash.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Double SHA-256 of `data`.
    pub fn hash(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        Self(Sha256::digest(first).into())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({self})")
    }
}

impl FromStr for Hash256 {
    type Err = EncodeError;

    /// Parse the byte-reversed hex display form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes: [u8; 32] = hex::decode(s)
            .map_err(|e| EncodeError::InvalidHex(e.to_string()))?
            .try_into()
            .map_err(|v: Vec<u8>| EncodeError::InvalidHex(format!("expected 32 bytes, got {}", v.len())))?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    /// Transaction containing the referenced output.
    pub txid: Txid,
    /// Index of the output within that transaction.
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// A transaction input, spending a previous output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    /// Unlocking script. Empty until the input is signed.
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    /// An unsigned input with a final sequence number.
    pub fn unsigned(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            script_sig: Vec::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

/// A transaction output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    /// Value in satoshis.
    pub value: u64,
    /// Locking script.
    pub script_pubkey: Vec<u8>,
}

/// A transaction transferring value between scripts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// An empty transaction with the default version and no lock time.
    pub fn new() -> Self {
        Self {
            version: TX_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    /// Legacy consensus serialization.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        buf.extend_from_slice(&self.version.to_le_bytes());
        encode::write_compact_size(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(input.previous_output.txid.as_bytes());
            buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            encode::write_var_bytes(&mut buf, &input.script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        encode::write_compact_size(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            encode::write_var_bytes(&mut buf, &output.script_pubkey);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    /// Parse a transaction from its consensus serialization.
    ///
    /// The whole slice must be consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self, EncodeError> {
        let mut r = Reader::new(bytes);
        let version = r.read_i32()?;

        let n_in = r.read_length()?;
        let mut inputs = Vec::with_capacity(n_in);
        for _ in 0..n_in {
            let txid = Hash256(r.read_array()?);
            let vout = r.read_u32()?;
            let script_sig = r.read_var_bytes()?;
            let sequence = r.read_u32()?;
            inputs.push(TxIn {
                previous_output: OutPoint { txid, vout },
                script_sig,
                sequence,
            });
        }

        let n_out = r.read_length()?;
        let mut outputs = Vec::with_capacity(n_out);
        for _ in 0..n_out {
            let value = r.read_u64()?;
            let script_pubkey = r.read_var_bytes()?;
            outputs.push(TxOut {
                value,
                script_pubkey,
            });
        }

        let lock_time = r.read_u32()?;
        if r.remaining() > 0 {
            return Err(EncodeError::TrailingBytes(r.remaining()));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    /// Parse a hex-encoded raw transaction.
    pub fn from_hex(s: &str) -> Result<Self, EncodeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| EncodeError::InvalidHex(e.to_string()))?;
        Self::decode(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    /// Transaction id: double SHA-256 of the serialization.
    pub fn txid(&self) -> Txid {
        Hash256::hash(&self.encode())
    }

    /// Serialized size in bytes, computed without encoding.
    pub fn size(&self) -> usize {
        let inputs: usize = self
            .inputs
            .iter()
            .map(|i| 36 + encode::compact_size_len(i.script_sig.len() as u64) + i.script_sig.len() + 4)
            .sum();
        let outputs: usize = self
            .outputs
            .iter()
            .map(|o| 8 + encode::compact_size_len(o.script_pubkey.len() as u64) + o.script_pubkey.len())
            .sum();
        8 + encode::compact_size_len(self.inputs.len() as u64)
            + encode::compact_size_len(self.outputs.len() as u64)
            + inputs
            + outputs
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

/// A transaction as reported by a sync provider.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObservedTransaction {
    pub tx: Transaction,
    /// Height of the block containing the transaction, if mined.
    pub height: Option<u32>,
    /// Unix time the provider first saw the transaction.
    pub timestamp: u64,
    /// Provider flagged the transaction as conflicting with another
    /// (double-spend risk).
    pub conflicted: bool,
}

impl ObservedTransaction {
    /// An unconfirmed, unflagged observation.
    pub fn unconfirmed(tx: Transaction, timestamp: u64) -> Self {
        Self {
            tx,
            height: None,
            timestamp,
            conflicted: false,
        }
    }

    /// A transaction mined at `height`.
    pub fn confirmed(tx: Transaction, height: u32, timestamp: u64) -> Self {
        Self {
            tx,
            height: Some(height),
            timestamp,
            conflicted: false,
        }
    }

    /// Decode a raw provider delivery.
    pub fn from_raw(raw: &[u8], height: Option<u32>, timestamp: u64) -> Result<Self, EncodeError> {
        Ok(Self {
            tx: Transaction::decode(raw)?,
            height,
            timestamp,
            conflicted: false,
        })
    }
}

/// Block summary delivered by a sync provider.
///
/// `txids` holds the transactions in the block that match the wallet's
/// watched addresses (a filtered block), not necessarily every transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    pub height: u32,
    pub hash: BlockHash,
    /// Block header timestamp (Unix seconds).
    pub timestamp: u64,
    pub txids: Vec<Txid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxIn {
                previous_output: OutPoint::new(Hash256([0x11; 32]), 3),
                script_sig: vec![0xAB; 107],
                sequence: SEQUENCE_FINAL,
            }],
            outputs: vec![
                TxOut {
                    value: 60_000,
                    script_pubkey: vec![0x76; 25],
                },
                TxOut {
                    value: 39_000,
                    script_pubkey: vec![0x76; 25],
                },
            ],
            lock_time: 0,
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let tx = sample_tx();
        let bytes = tx.encode();
        assert_eq!(Transaction::decode(&bytes).unwrap(), tx);
    }

    #[test]
    fn size_matches_encoding() {
        let tx = sample_tx();
        assert_eq!(tx.size(), tx.encode().len());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = sample_tx().encode();
        bytes.push(0);
        assert_eq!(Transaction::decode(&bytes).unwrap_err(), EncodeError::TrailingBytes(1));
    }

    #[test]
    fn truncated_rejected() {
        let bytes = sample_tx().encode();
        let err = Transaction::decode(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, EncodeError::UnexpectedEof { .. }));
    }

    #[test]
    fn txid_changes_with_content() {
        let tx = sample_tx();
        let mut other = tx.clone();
        other.outputs[0].value += 1;
        assert_ne!(tx.txid(), other.txid());
        assert_eq!(tx.txid(), sample_tx().txid());
    }

    #[test]
    fn hash_display_is_byte_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x01;
        let h = Hash256(bytes);
        let s = h.to_string();
        assert!(s.ends_with("01"));
        assert_eq!(s.parse::<Hash256>().unwrap(), h);
    }

    #[test]
    fn genesis_coinbase_txid() {
        // Bitcoin genesis block coinbase.
        let raw = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";
        let tx = Transaction::from_hex(raw).unwrap();
        assert_eq!(
            tx.txid().to_string(),
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
        );
        assert_eq!(tx.to_hex(), raw);
        assert_eq!(tx.total_output_value(), Some(50 * crate::constants::COIN));
    }

    #[test]
    fn total_output_value_overflow() {
        let mut tx = sample_tx();
        tx.outputs[0].value = u64::MAX;
        assert_eq!(tx.total_output_value(), None);
    }

    #[test]
    fn observed_from_raw() {
        let tx = sample_tx();
        let obs = ObservedTransaction::from_raw(&tx.encode(), Some(7), 1_700_000_000).unwrap();
        assert_eq!(obs.tx, tx);
        assert_eq!(obs.height, Some(7));
        assert!(!obs.conflicted);
    }
}
