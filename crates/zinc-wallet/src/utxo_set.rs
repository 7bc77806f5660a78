//! Wallet-owned outputs derived from observed transactions.
//!
//! Every delivered transaction is kept by txid, together with the set of
//! outpoints any observed transaction spends. This makes ingestion
//! idempotent and order-independent: a spend that arrives before the output
//! it consumes is remembered, and the output is recorded as spent when it
//! shows up.
//!
//! When two observed transactions spend the same outpoint, one wins: the
//! first seen, unless a later one is confirmed while the first is not. The
//! loser and everything built on its outputs are marked conflicted, so their
//! outputs drop out of the balance and the inputs only they consumed count
//! as unspent again.
//!
//! Pending-spend reservations live here too but are never persisted.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, warn};

use zinc_core::address::Address;
use zinc_core::constants::MAX_MONEY;
use zinc_core::error::EncodeError;
use zinc_core::types::{BlockInfo, ObservedTransaction, OutPoint, Transaction, Txid};

use crate::address_book::AddressBook;
use crate::config::BalancePolicy;
use crate::error::WalletError;

/// A transaction the wallet has observed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub tx: Transaction,
    pub height: Option<u32>,
    /// Timestamp of the confirming block, when known.
    pub block_time: Option<u64>,
    /// When the transaction was first observed.
    pub timestamp: u64,
    /// Reported conflicted by the provider, or displaced by a competing spend.
    pub conflicted: bool,
    /// The provider's own conflict flag.
    #[serde(default)]
    pub reported_conflicted: bool,
    /// Observation order.
    pub sequence: u64,
}

impl TxRecord {
    /// Time used to order history: block time once mined, observation time before.
    pub fn display_time(&self) -> u64 {
        self.block_time.unwrap_or(self.timestamp)
    }
}

/// An output paying one of the wallet's addresses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletOutput {
    pub outpoint: OutPoint,
    pub address: Address,
    pub value: u64,
    pub height: Option<u32>,
    pub conflicted: bool,
    /// Transaction that consumed this output, if one has been observed.
    pub spent_by: Option<Txid>,
    /// Observation order of the funding transaction.
    pub sequence: u64,
}

impl WalletOutput {
    pub fn is_spent(&self) -> bool {
        self.spent_by.is_some()
    }

    /// Blocks mined on top of (and including) the confirming block.
    pub fn confirmations(&self, tip: Option<u32>) -> u32 {
        confirmations(self.height, tip)
    }
}

fn confirmations(height: Option<u32>, tip: Option<u32>) -> u32 {
    match (height, tip) {
        (Some(h), Some(t)) if t >= h => t - h + 1,
        (Some(_), _) => 1,
        (None, _) => 0,
    }
}

/// Confirmation seen before the transaction itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct BlockRef {
    height: u32,
    time: u64,
}

/// Inputs held back for a built, not yet broadcast transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    pub txid: Txid,
    pub outpoints: Vec<OutPoint>,
    /// Unix seconds after which the reservation lapses.
    pub expires_at: i64,
}

impl Reservation {
    pub fn is_active(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

/// Result of ingesting one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    /// The txid had not been seen before.
    pub is_new: bool,
    /// Addresses derived because this transaction used part of the lookahead.
    pub new_addresses: Vec<Address>,
}

/// One row of transaction history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionSummary {
    pub txid: Txid,
    /// Value paid to wallet addresses.
    pub received: u64,
    /// Value of wallet outputs consumed.
    pub sent: u64,
    /// Known only when every input spends a wallet output.
    pub fee: Option<u64>,
    pub confirmations: u32,
    pub timestamp: u64,
    pub conflicted: bool,
}

impl TransactionSummary {
    /// Balance change caused by the transaction.
    pub fn net(&self) -> i64 {
        self.received as i64 - self.sent as i64
    }
}

/// All outputs the wallet owns, spent or not.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UtxoSet {
    transactions: BTreeMap<Txid, TxRecord>,
    outputs: BTreeMap<OutPoint, WalletOutput>,
    /// Every outpoint consumed by an observed transaction.
    spends: BTreeMap<OutPoint, Txid>,
    pending_confirmations: BTreeMap<Txid, BlockRef>,
    /// Transactions that lost a spend, and their descendants.
    #[serde(default)]
    displaced: BTreeSet<Txid>,
    tip: Option<u32>,
    next_sequence: u64,
    #[serde(skip)]
    reservations: BTreeMap<Txid, Reservation>,
    #[serde(skip)]
    reserved: BTreeMap<OutPoint, Txid>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transaction.
    ///
    /// Outputs paying owned addresses become wallet outputs and mark their
    /// address used. Inputs mark the outputs they consume as spent.
    /// Re-ingesting a known txid only refreshes its height and conflict flag.
    pub fn ingest(
        &mut self,
        observed: &ObservedTransaction,
        book: &mut AddressBook,
    ) -> Result<IngestOutcome, WalletError> {
        match observed.tx.total_output_value() {
            Some(total) if total <= MAX_MONEY => {}
            _ => return Err(EncodeError::ValueOverflow.into()),
        }

        let txid = observed.tx.txid();
        if self.transactions.contains_key(&txid) {
            self.refresh(txid, observed.height, observed.conflicted);
            debug!(%txid, "transaction already known");
            return Ok(IngestOutcome::default());
        }

        let (height, block_time) = match self.pending_confirmations.remove(&txid) {
            Some(block) if observed.height.is_none_or(|h| h == block.height) => {
                (Some(block.height), Some(block.time))
            }
            _ => (observed.height, None),
        };
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let mut contested = false;
        for input in &observed.tx.inputs {
            contested |= self.record_spend(input.previous_output, txid, height.is_some());
        }
        let parent_displaced = observed
            .tx
            .inputs
            .iter()
            .any(|i| self.displaced.contains(&i.previous_output.txid));

        let network = book.network();
        let mut new_addresses = Vec::new();
        let mut received = 0usize;
        for (vout, out) in observed.tx.outputs.iter().enumerate() {
            let Some(address) = Address::from_script_pubkey(&out.script_pubkey, network) else {
                continue;
            };
            if !book.is_owned(&address) {
                continue;
            }
            let outpoint = OutPoint::new(txid, vout as u32);
            self.outputs.insert(
                outpoint,
                WalletOutput {
                    outpoint,
                    address,
                    value: out.value,
                    height,
                    conflicted: observed.conflicted,
                    spent_by: self
                        .spends
                        .get(&outpoint)
                        .copied()
                        .filter(|s| !self.displaced.contains(s)),
                    sequence,
                },
            );
            received += 1;
            new_addresses.extend(book.mark_used(&address)?);
        }

        self.transactions.insert(
            txid,
            TxRecord {
                tx: observed.tx.clone(),
                height,
                block_time,
                timestamp: observed.timestamp,
                conflicted: observed.conflicted,
                reported_conflicted: observed.conflicted,
                sequence,
            },
        );
        if contested || parent_displaced {
            self.resolve_conflicts();
        }
        debug!(%txid, ?height, outputs = received, "ingested transaction");

        Ok(IngestOutcome {
            is_new: true,
            new_addresses,
        })
    }

    /// Claim `outpoint` for `txid`.
    ///
    /// Returns true when another transaction already claimed it, whichever
    /// of the two ends up holding it.
    fn record_spend(&mut self, outpoint: OutPoint, txid: Txid, confirmed: bool) -> bool {
        let existing = self.spends.get(&outpoint).copied();
        if let Some(existing) = existing {
            if existing == txid {
                return false;
            }
            let existing_confirmed = self
                .transactions
                .get(&existing)
                .is_some_and(|r| r.height.is_some());
            if !self.displaced.contains(&existing) && (existing_confirmed || !confirmed) {
                warn!(%outpoint, first = %existing, second = %txid, "conflicting spend loses");
                return true;
            }
            warn!(%outpoint, replaced = %existing, by = %txid, "spend replaces conflicting one");
        }
        self.spends.insert(outpoint, txid);
        if let Some(out) = self.outputs.get_mut(&outpoint) {
            out.spent_by = Some(txid);
        }
        existing.is_some()
    }

    /// Confirmation may let a transaction win outpoints it lost while
    /// unconfirmed.
    fn reclaim_spends(&mut self, txid: Txid) {
        let Some(record) = self.transactions.get(&txid) else {
            return;
        };
        let inputs: Vec<OutPoint> = record.tx.inputs.iter().map(|i| i.previous_output).collect();
        let lost_any = inputs.iter().any(|op| self.spends.get(op).is_some_and(|s| *s != txid));
        if !lost_any {
            return;
        }
        for outpoint in inputs {
            self.record_spend(outpoint, txid, true);
        }
        self.resolve_conflicts();
    }

    /// Recompute which transactions are displaced and push the result into
    /// every record and output.
    ///
    /// A transaction is displaced when some outpoint it spends is held by
    /// another transaction, or when it spends an output of a displaced one.
    fn resolve_conflicts(&mut self) {
        let mut queue: Vec<Txid> = self
            .transactions
            .iter()
            .filter(|(txid, record)| {
                record
                    .tx
                    .inputs
                    .iter()
                    .any(|i| self.spends.get(&i.previous_output).is_some_and(|s| s != *txid))
            })
            .map(|(txid, _)| *txid)
            .collect();

        let mut displaced = BTreeSet::new();
        while let Some(txid) = queue.pop() {
            if !displaced.insert(txid) {
                continue;
            }
            let Some(record) = self.transactions.get(&txid) else {
                continue;
            };
            for vout in 0..record.tx.outputs.len() {
                if let Some(child) = self.spends.get(&OutPoint::new(txid, vout as u32)) {
                    queue.push(*child);
                }
            }
        }

        for (txid, record) in self.transactions.iter_mut() {
            let conflicted = record.reported_conflicted || displaced.contains(txid);
            if conflicted != record.conflicted {
                debug!(%txid, conflicted, "conflict state changed");
            }
            record.conflicted = conflicted;
            for out in Self::outputs_of_mut(&mut self.outputs, *txid) {
                out.conflicted = conflicted;
            }
        }
        for (outpoint, out) in self.outputs.iter_mut() {
            out.spent_by = self.spends.get(outpoint).copied().filter(|s| !displaced.contains(s));
        }
        self.displaced = displaced;
    }

    /// Update height and conflict flag of a known transaction.
    fn refresh(&mut self, txid: Txid, height: Option<u32>, reported_conflicted: bool) {
        let Some(record) = self.transactions.get_mut(&txid) else {
            return;
        };
        let newly_confirmed = record.height.is_none() && height.is_some();
        if height.is_some() && record.height != height {
            record.height = height;
            record.block_time = None;
        }
        record.reported_conflicted = reported_conflicted;
        record.conflicted = reported_conflicted || self.displaced.contains(&txid);
        let (height, conflicted) = (record.height, record.conflicted);
        for out in Self::outputs_of_mut(&mut self.outputs, txid) {
            out.height = height;
            out.conflicted = conflicted;
        }
        if newly_confirmed {
            self.reclaim_spends(txid);
        }
    }

    fn outputs_of_mut(
        outputs: &mut BTreeMap<OutPoint, WalletOutput>,
        txid: Txid,
    ) -> impl Iterator<Item = &mut WalletOutput> + '_ {
        outputs
            .range_mut(OutPoint::new(txid, 0)..=OutPoint::new(txid, u32::MAX))
            .map(|(_, out)| out)
    }

    fn outputs_of(&self, txid: Txid) -> impl Iterator<Item = &WalletOutput> + '_ {
        self.outputs
            .range(OutPoint::new(txid, 0)..=OutPoint::new(txid, u32::MAX))
            .map(|(_, out)| out)
    }

    /// Advance the tip and confirm the block's transactions.
    ///
    /// Confirmations for transactions not yet seen are kept until they arrive.
    pub fn apply_block(&mut self, block: &BlockInfo) {
        self.tip = Some(self.tip.map_or(block.height, |t| t.max(block.height)));
        for txid in &block.txids {
            match self.transactions.get_mut(txid) {
                Some(record) => {
                    let newly_confirmed = record.height.is_none();
                    record.height = Some(block.height);
                    record.block_time = Some(block.timestamp);
                    for out in Self::outputs_of_mut(&mut self.outputs, *txid) {
                        out.height = Some(block.height);
                    }
                    debug!(%txid, height = block.height, "transaction confirmed");
                    if newly_confirmed {
                        self.reclaim_spends(*txid);
                    }
                }
                None => {
                    self.pending_confirmations.insert(
                        *txid,
                        BlockRef {
                            height: block.height,
                            time: block.timestamp,
                        },
                    );
                }
            }
        }
    }

    pub fn tip(&self) -> Option<u32> {
        self.tip
    }

    pub fn transaction(&self, txid: &Txid) -> Option<&TxRecord> {
        self.transactions.get(txid)
    }

    pub fn contains_transaction(&self, txid: &Txid) -> bool {
        self.transactions.contains_key(txid)
    }

    pub fn output(&self, outpoint: &OutPoint) -> Option<&WalletOutput> {
        self.outputs.get(outpoint)
    }

    /// Every owned output, spent or not.
    pub fn outputs(&self) -> impl Iterator<Item = &WalletOutput> + '_ {
        self.outputs.values()
    }

    /// Owned outputs with no observed spend.
    pub fn unspent(&self) -> impl Iterator<Item = &WalletOutput> + '_ {
        self.outputs.values().filter(|o| !o.is_spent())
    }

    fn counts_toward_balance(&self, out: &WalletOutput, policy: &BalancePolicy, now: i64) -> bool {
        !out.is_spent()
            && !self.is_reserved(&out.outpoint, now)
            && (policy.include_conflicted || !out.conflicted)
            && out.confirmations(self.tip) >= policy.min_confirmations
    }

    /// Outputs a build may spend under `policy`.
    pub fn spendable<'a>(
        &'a self,
        policy: &'a BalancePolicy,
        now: i64,
    ) -> impl Iterator<Item = &'a WalletOutput> + 'a {
        self.outputs
            .values()
            .filter(move |o| self.counts_toward_balance(o, policy, now))
    }

    /// Sum of unspent, unreserved outputs admitted by `policy`.
    pub fn balance(&self, policy: &BalancePolicy, now: i64) -> u64 {
        self.spendable(policy, now).map(|o| o.value).sum()
    }

    /// Value held by active reservations.
    pub fn reserved_value(&self, now: i64) -> u64 {
        self.unspent()
            .filter(|o| self.is_reserved(&o.outpoint, now))
            .map(|o| o.value)
            .sum()
    }

    // --- Reservations ---

    /// Hold `outpoints` for the unbroadcast transaction `txid`.
    pub fn reserve(&mut self, txid: Txid, outpoints: Vec<OutPoint>, expires_at: i64, now: i64) -> Result<(), WalletError> {
        if let Some(taken) = outpoints.iter().find(|op| self.is_reserved(op, now)) {
            error!(outpoint = %taken, %txid, "output already reserved by another transaction");
            return Err(WalletError::Inconsistent(format!("output {taken} is already reserved")));
        }
        for op in &outpoints {
            self.reserved.insert(*op, txid);
        }
        self.reservations.insert(
            txid,
            Reservation {
                txid,
                outpoints,
                expires_at,
            },
        );
        Ok(())
    }

    /// Drop the reservation for `txid`. Returns it if one existed.
    pub fn release(&mut self, txid: &Txid) -> Option<Reservation> {
        let reservation = self.reservations.remove(txid)?;
        for op in &reservation.outpoints {
            if self.reserved.get(op) == Some(txid) {
                self.reserved.remove(op);
            }
        }
        Some(reservation)
    }

    /// Drop every reservation that has lapsed. Returns their txids.
    pub fn release_expired(&mut self, now: i64) -> Vec<Txid> {
        let expired: Vec<Txid> = self
            .reservations
            .values()
            .filter(|r| !r.is_active(now))
            .map(|r| r.txid)
            .collect();
        for txid in &expired {
            self.release(txid);
        }
        expired
    }

    /// Drop all reservations. Returns how many were held.
    pub fn release_all(&mut self) -> usize {
        let n = self.reservations.len();
        self.reservations.clear();
        self.reserved.clear();
        n
    }

    pub fn is_reserved(&self, outpoint: &OutPoint, now: i64) -> bool {
        self.reserved
            .get(outpoint)
            .and_then(|txid| self.reservations.get(txid))
            .is_some_and(|r| r.is_active(now))
    }

    pub fn reservation(&self, txid: &Txid) -> Option<&Reservation> {
        self.reservations.get(txid)
    }

    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> + '_ {
        self.reservations.values()
    }

    // --- History ---

    fn is_relevant(&self, record: &TxRecord, txid: Txid) -> bool {
        self.outputs_of(txid).next().is_some()
            || record
                .tx
                .inputs
                .iter()
                .any(|i| self.outputs.contains_key(&i.previous_output))
    }

    /// Txids touching the wallet, most recent first.
    pub fn history_order(&self) -> Vec<Txid> {
        let mut keyed: Vec<_> = self
            .transactions
            .iter()
            .filter(|(txid, record)| self.is_relevant(record, **txid))
            .map(|(txid, record)| (Reverse(record.display_time()), Reverse(record.sequence), *txid))
            .collect();
        keyed.sort();
        keyed.into_iter().map(|(_, _, txid)| txid).collect()
    }

    /// Summary of a known transaction from the wallet's point of view.
    pub fn summary(&self, txid: &Txid) -> Option<TransactionSummary> {
        let record = self.transactions.get(txid)?;
        let received: u64 = self.outputs_of(*txid).map(|o| o.value).sum();

        let mut sent = 0u64;
        let mut all_inputs_owned = !record.tx.inputs.is_empty();
        for input in &record.tx.inputs {
            match self.outputs.get(&input.previous_output) {
                Some(out) => sent = sent.saturating_add(out.value),
                None => all_inputs_owned = false,
            }
        }
        let fee = if all_inputs_owned {
            record
                .tx
                .total_output_value()
                .and_then(|out_total| sent.checked_sub(out_total))
        } else {
            None
        };

        Some(TransactionSummary {
            txid: *txid,
            received,
            sent,
            fee,
            confirmations: confirmations(record.height, self.tip),
            timestamp: record.display_time(),
            conflicted: record.conflicted,
        })
    }
}
