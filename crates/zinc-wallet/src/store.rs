//! Wallet state persistence.
//!
//! [`WalletStore`] is the seam to whatever storage engine embeds the wallet.
//! [`FileStore`] writes an encrypted file; [`MemoryStore`] keeps the encoded
//! state in memory.
//!
//! # File format
//! ```text
//! header_len (4 bytes LE) || header_json || encrypted_payload
//! ```
//! The header is unencrypted JSON containing magic bytes and version. The
//! payload is bincode-encoded [`StoredWallet`] sealed by [`encryption`].
//! A [`FileStore`] derives its key once, on the first load or save, and
//! keeps the salt for the life of the store.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

use zinc_core::address::Network;

use crate::address_book::AddressBookData;
use crate::encryption::{self, SealingKey};
use crate::error::WalletError;
use crate::keys::Seed;
use crate::utxo_set::UtxoSet;

/// Magic bytes identifying a Zinc wallet file.
pub const WALLET_MAGIC: &[u8; 4] = b"ZNWL";

/// Current wallet state format version.
pub const WALLET_VERSION: u32 = 1;

/// Everything the wallet persists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredWallet {
    pub version: u32,
    pub network: Network,
    pub seed: Seed,
    pub addresses: AddressBookData,
    pub utxos: UtxoSet,
}

/// Key-value storage of a single wallet's state.
pub trait WalletStore: Send + Sync {
    /// Load the stored state, or `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<StoredWallet>, WalletError>;

    /// Replace the stored state. Must not leave a partial write behind.
    fn save(&self, state: &StoredWallet) -> Result<(), WalletError>;
}

fn encode_state(state: &StoredWallet) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    bincode::serde::encode_to_vec(state, bincode::config::standard())
        .map(Zeroizing::new)
        .map_err(|e| WalletError::Serialization(e.to_string()))
}

fn decode_state(bytes: &[u8]) -> Result<StoredWallet, WalletError> {
    let (state, read): (StoredWallet, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| WalletError::CorruptedFile(format!("invalid payload: {e}")))?;
    if read != bytes.len() {
        return Err(WalletError::CorruptedFile(format!(
            "{} trailing bytes after payload",
            bytes.len() - read
        )));
    }
    if state.version != WALLET_VERSION {
        return Err(WalletError::CorruptedFile(format!(
            "unsupported state version: {}",
            state.version
        )));
    }
    Ok(state)
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    bytes: Mutex<Option<Zeroizing<Vec<u8>>>>,
    fail_saves: Mutex<bool>,
    saves: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail with a storage error.
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> u64 {
        *self.saves.lock()
    }
}

impl WalletStore for MemoryStore {
    fn load(&self) -> Result<Option<StoredWallet>, WalletError> {
        self.bytes.lock().as_deref().map(|b| decode_state(b)).transpose()
    }

    fn save(&self, state: &StoredWallet) -> Result<(), WalletError> {
        if *self.fail_saves.lock() {
            return Err(WalletError::Storage("store unavailable".into()));
        }
        let encoded = encode_state(state)?;
        *self.bytes.lock() = Some(encoded);
        *self.saves.lock() += 1;
        Ok(())
    }
}

/// Wallet file header serialized as JSON.
#[derive(Serialize, Deserialize)]
struct WalletFileHeader {
    magic: String,
    version: u32,
}

/// Password-encrypted wallet file.
pub struct FileStore {
    path: PathBuf,
    password: Zeroizing<Vec<u8>>,
    key: Mutex<Option<SealingKey>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, password: &[u8]) -> Self {
        Self {
            path: path.into(),
            password: Zeroizing::new(password.to_vec()),
            key: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn encode_file(&self, state: &StoredWallet) -> Result<Vec<u8>, WalletError> {
        let header = WalletFileHeader {
            magic: String::from_utf8_lossy(WALLET_MAGIC).to_string(),
            version: WALLET_VERSION,
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| WalletError::Serialization(e.to_string()))?;

        let payload = encode_state(state)?;
        let encrypted = self.seal(&payload)?;

        let header_len = header_json.len() as u32;
        let mut file_data = Vec::with_capacity(4 + header_json.len() + encrypted.len());
        file_data.extend_from_slice(&header_len.to_le_bytes());
        file_data.extend_from_slice(&header_json);
        file_data.extend_from_slice(&encrypted);
        Ok(file_data)
    }

    fn decode_file(&self, file_data: &[u8]) -> Result<StoredWallet, WalletError> {
        let Some((len_bytes, rest)) = file_data.split_first_chunk::<4>() else {
            return Err(WalletError::CorruptedFile("file too short".into()));
        };
        let header_len = u32::from_le_bytes(*len_bytes) as usize;
        if rest.len() < header_len {
            return Err(WalletError::CorruptedFile("header truncated".into()));
        }
        let (header_json, encrypted) = rest.split_at(header_len);

        let header: WalletFileHeader = serde_json::from_slice(header_json)
            .map_err(|e| WalletError::CorruptedFile(format!("invalid header: {e}")))?;
        if header.magic.as_bytes() != WALLET_MAGIC {
            return Err(WalletError::CorruptedFile("invalid magic bytes".into()));
        }
        if header.version != WALLET_VERSION {
            return Err(WalletError::CorruptedFile(format!(
                "unsupported version: {}",
                header.version
            )));
        }

        let payload = self.unseal(encrypted)?;
        decode_state(&payload)
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, WalletError> {
        let mut cached = self.key.lock();
        let key = match cached.take() {
            Some(key) => key,
            None => SealingKey::generate(&self.password)?,
        };
        let sealed = key.seal(plaintext);
        *cached = Some(key);
        sealed
    }

    fn unseal(&self, encrypted: &[u8]) -> Result<Zeroizing<Vec<u8>>, WalletError> {
        let mut cached = self.key.lock();
        if let Some(key) = cached.as_ref().filter(|k| k.matches(encrypted)) {
            return key.open(encrypted);
        }
        let (plaintext, key) = encryption::open(encrypted, &self.password)?;
        *cached = Some(key);
        Ok(plaintext)
    }
}

impl WalletStore for FileStore {
    fn load(&self) -> Result<Option<StoredWallet>, WalletError> {
        let file_data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.decode_file(&file_data).map(Some)
    }

    fn save(&self, state: &StoredWallet) -> Result<(), WalletError> {
        let file_data = self.encode_file(state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&file_data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), bytes = file_data.len(), "wallet file written");
        Ok(())
    }
}
