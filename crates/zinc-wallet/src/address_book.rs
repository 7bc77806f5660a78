//! Gap-limited pool of derived addresses.
//!
//! Each chain keeps at least `gap_limit` unused addresses beyond its
//! highest-index used address. Marking an address used extends the pool
//! when that lookahead shrinks; this is the only place new addresses are
//! derived.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

use zinc_core::address::{Address, Network};

use crate::error::WalletError;
use crate::keys::{AccountXpubs, Chain, KeyPath};

/// One derived address and whether it has been seen on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub path: KeyPath,
    pub address: Address,
    pub used: bool,
}

/// Persisted form of an [`AddressBook`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBookData {
    pub external: Vec<AddressEntry>,
    pub internal: Vec<AddressEntry>,
}

/// Ordered, gap-limited sequence of derived addresses for both chains.
#[derive(Clone, Debug)]
pub struct AddressBook {
    xpubs: Arc<AccountXpubs>,
    receive_gap: u32,
    change_gap: u32,
    external: Vec<AddressEntry>,
    internal: Vec<AddressEntry>,
    by_address: HashMap<Address, KeyPath>,
}

impl AddressBook {
    /// Create a book with a full lookahead on both chains.
    pub fn new(xpubs: Arc<AccountXpubs>, receive_gap: u32, change_gap: u32) -> Result<Self, WalletError> {
        let mut book = Self {
            xpubs,
            receive_gap,
            change_gap,
            external: Vec::new(),
            internal: Vec::new(),
            by_address: HashMap::new(),
        };
        book.ensure_gap(Chain::External)?;
        book.ensure_gap(Chain::Internal)?;
        Ok(book)
    }

    /// Rebuild a book from persisted entries.
    ///
    /// Every stored address is re-derived and compared; a mismatch means the
    /// data does not belong to this seed. The lookahead is topped up to the
    /// current gap limits.
    pub fn restore(
        xpubs: Arc<AccountXpubs>,
        receive_gap: u32,
        change_gap: u32,
        data: AddressBookData,
    ) -> Result<Self, WalletError> {
        let mut book = Self {
            xpubs,
            receive_gap,
            change_gap,
            external: Vec::with_capacity(data.external.len()),
            internal: Vec::with_capacity(data.internal.len()),
            by_address: HashMap::new(),
        };
        for (chain, entries) in [(Chain::External, data.external), (Chain::Internal, data.internal)] {
            for (i, entry) in entries.into_iter().enumerate() {
                let expected = KeyPath::new(chain, i as u32);
                if entry.path != expected {
                    return Err(WalletError::CorruptedFile(format!(
                        "address entry {} stored at position {expected}",
                        entry.path
                    )));
                }
                let derived = book.xpubs.address_at(expected)?;
                if derived != entry.address {
                    return Err(WalletError::CorruptedFile(format!(
                        "address at {expected} does not match the seed"
                    )));
                }
                book.by_address.insert(entry.address, entry.path);
                book.chain_mut(chain).push(entry);
            }
        }
        book.ensure_gap(Chain::External)?;
        book.ensure_gap(Chain::Internal)?;
        Ok(book)
    }

    /// Persisted form.
    pub fn to_data(&self) -> AddressBookData {
        AddressBookData {
            external: self.external.clone(),
            internal: self.internal.clone(),
        }
    }

    fn chain(&self, chain: Chain) -> &Vec<AddressEntry> {
        match chain {
            Chain::External => &self.external,
            Chain::Internal => &self.internal,
        }
    }

    fn chain_mut(&mut self, chain: Chain) -> &mut Vec<AddressEntry> {
        match chain {
            Chain::External => &mut self.external,
            Chain::Internal => &mut self.internal,
        }
    }

    pub fn network(&self) -> Network {
        self.xpubs.network()
    }

    pub fn gap_limit(&self, chain: Chain) -> u32 {
        match chain {
            Chain::External => self.receive_gap,
            Chain::Internal => self.change_gap,
        }
    }

    /// Index of the highest used address on `chain`.
    pub fn highest_used(&self, chain: Chain) -> Option<u32> {
        self.chain(chain).iter().rposition(|e| e.used).map(|i| i as u32)
    }

    /// Unused addresses beyond the highest used one.
    pub fn lookahead(&self, chain: Chain) -> u32 {
        let len = self.chain(chain).len() as u32;
        match self.highest_used(chain) {
            Some(h) => len - h - 1,
            None => len,
        }
    }

    /// Derive addresses until the lookahead reaches the gap limit.
    ///
    /// Returns the newly derived addresses. Idempotent.
    fn ensure_gap(&mut self, chain: Chain) -> Result<Vec<Address>, WalletError> {
        let target = self
            .highest_used(chain)
            .map_or(0, |h| h + 1)
            .saturating_add(self.gap_limit(chain));
        let mut added = Vec::new();
        while (self.chain(chain).len() as u32) < target {
            let path = KeyPath::new(chain, self.chain(chain).len() as u32);
            let address = self.xpubs.address_at(path)?;
            self.by_address.insert(address, path);
            self.chain_mut(chain).push(AddressEntry {
                path,
                address,
                used: false,
            });
            added.push(address);
        }
        if !added.is_empty() {
            debug!(?chain, count = added.len(), "extended address pool");
        }
        Ok(added)
    }

    /// Mark `address` used and extend its chain if needed.
    ///
    /// Returns the addresses derived by the extension. Unknown addresses are
    /// ignored.
    pub fn mark_used(&mut self, address: &Address) -> Result<Vec<Address>, WalletError> {
        let Some(path) = self.by_address.get(address).copied() else {
            return Ok(Vec::new());
        };
        let entry = self
            .chain_mut(path.chain)
            .get_mut(path.index as usize)
            .ok_or_else(|| WalletError::Inconsistent(format!("address index {path} out of range")))?;
        if entry.used {
            return Ok(Vec::new());
        }
        entry.used = true;
        self.ensure_gap(path.chain)
    }

    pub fn is_owned(&self, address: &Address) -> bool {
        self.by_address.contains_key(address)
    }

    /// Derivation path of an owned address.
    pub fn path_of(&self, address: &Address) -> Option<KeyPath> {
        self.by_address.get(address).copied()
    }

    pub fn is_used(&self, address: &Address) -> bool {
        self.path_of(address)
            .and_then(|p| self.chain(p.chain).get(p.index as usize))
            .is_some_and(|e| e.used)
    }

    /// Lowest-index unused address on `chain`.
    pub fn next_unused(&self, chain: Chain) -> Result<Address, WalletError> {
        match self.chain(chain).iter().find(|e| !e.used) {
            Some(entry) => Ok(entry.address),
            None => {
                error!(?chain, "address pool has no unused address");
                Err(WalletError::Inconsistent(format!("no unused address on {chain:?} chain")))
            }
        }
    }

    /// All derived addresses, receive chain first.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> + '_ {
        self.external.iter().chain(self.internal.iter()).map(|e| &e.address)
    }

    pub fn entries(&self, chain: Chain) -> &[AddressEntry] {
        self.chain(chain)
    }

    pub fn len(&self) -> usize {
        self.external.len() + self.internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
