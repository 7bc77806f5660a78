//! Transaction builder with coin selection and signing.
//!
//! Provides a builder pattern for constructing transactions:
//! 1. Add recipients (address + amount)
//! 2. Build an unsigned transaction (performs coin selection and fee calculation)
//! 3. Sign all inputs with the wallet's keychain

use tracing::error;

use zinc_core::address::Address;
use zinc_core::constants::{MAX_MONEY, MAX_STANDARD_TX_SIZE};
use zinc_core::crypto::{sign_input, verify_input};
use zinc_core::types::{Transaction, TxIn, TxOut, Txid};

use crate::coin_selection::{CoinSelection, CoinSelector, SelectionStrategy, SpendableOutput};
use crate::config::FeeConfig;
use crate::error::WalletError;
use crate::fee::{FeePolicy, estimate_size};
use crate::keys::KeyChain;

/// A transaction recipient: address and amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Destination address.
    pub address: Address,
    /// Amount in satoshis.
    pub amount: u64,
}

/// An unsigned transaction ready for signing.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    /// The transaction with empty unlocking scripts.
    pub tx: Transaction,
    /// The coin selection result used to build this transaction.
    pub selection: CoinSelection,
    /// Change output, if one was added (always the last output).
    pub change: Option<Recipient>,
}

/// A signed transaction with the bookkeeping the wallet needs afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltTransaction {
    pub tx: Transaction,
    /// Outputs consumed, in input order.
    pub inputs: Vec<SpendableOutput>,
    pub fee: u64,
    pub change: Option<Recipient>,
}

impl BuiltTransaction {
    pub fn txid(&self) -> Txid {
        self.tx.txid()
    }

    /// Sum of the consumed outputs.
    pub fn input_value(&self) -> u64 {
        self.inputs.iter().map(|i| i.value).sum()
    }
}

/// Builder for constructing and signing transactions.
///
/// # Example
/// ```ignore
/// let unsigned = TransactionBuilder::new()
///     .add_recipient(address, 60_000)
///     .set_fee_rate(1_000)
///     .build(spendable, &change_addr, &fee_config)?;
/// let signed = TransactionBuilder::sign(unsigned, &keychain)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransactionBuilder {
    recipients: Vec<Recipient>,
    fee_rate_per_kb: Option<u64>,
    strategy: SelectionStrategy,
    lock_time: u32,
}

impl TransactionBuilder {
    /// Create a new transaction builder using the configured default fee rate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipient to the transaction.
    pub fn add_recipient(&mut self, address: Address, amount: u64) -> &mut Self {
        self.recipients.push(Recipient { address, amount });
        self
    }

    /// Override the fee rate, in sat per 1000 bytes.
    pub fn set_fee_rate(&mut self, rate_per_kb: u64) -> &mut Self {
        self.fee_rate_per_kb = Some(rate_per_kb);
        self
    }

    pub fn set_strategy(&mut self, strategy: SelectionStrategy) -> &mut Self {
        self.strategy = strategy;
        self
    }

    /// Set the transaction lock time.
    pub fn set_lock_time(&mut self, lock_time: u32) -> &mut Self {
        self.lock_time = lock_time;
        self
    }

    /// Total paid to recipients.
    pub fn total_amount(&self) -> Result<u64, WalletError> {
        self.recipients.iter().try_fold(0u64, |acc, r| {
            acc.checked_add(r.amount)
                .filter(|total| *total <= MAX_MONEY)
                .ok_or_else(|| WalletError::InvalidAmount("total amount overflow".into()))
        })
    }

    /// Build an unsigned transaction by selecting coins and constructing outputs.
    ///
    /// # Arguments
    /// - `spendable`: outputs the wallet may spend
    /// - `change_address`: address to receive change
    /// - `fees`: fee configuration; supplies the rate when none was set
    pub fn build(
        &self,
        spendable: Vec<SpendableOutput>,
        change_address: &Address,
        fees: &FeeConfig,
    ) -> Result<UnsignedTransaction, WalletError> {
        if self.recipients.is_empty() {
            return Err(WalletError::InvalidAmount("no recipients".into()));
        }
        for r in &self.recipients {
            if r.amount == 0 {
                return Err(WalletError::InvalidAmount("recipient amount is zero".into()));
            }
            if r.amount < fees.dust_threshold {
                return Err(WalletError::InvalidAmount(format!(
                    "recipient amount {} is below the dust threshold {}",
                    r.amount, fees.dust_threshold
                )));
            }
        }
        let total_send = self.total_amount()?;

        let rate = self.fee_rate_per_kb.unwrap_or(fees.default_fee_rate_per_kb);
        let policy = FeePolicy::new(fees, rate)?;

        let selection = CoinSelector::select(
            spendable,
            total_send,
            self.recipients.len(),
            &policy,
            self.strategy,
        )?;

        let change = (selection.change > 0).then(|| Recipient {
            address: *change_address,
            amount: selection.change,
        });
        let output_count = self.recipients.len() + usize::from(change.is_some());
        let size = estimate_size(selection.selected.len(), output_count);
        if size > MAX_STANDARD_TX_SIZE {
            return Err(WalletError::TransactionTooLarge {
                size,
                max: MAX_STANDARD_TX_SIZE,
            });
        }

        let inputs = selection
            .selected
            .iter()
            .map(|s| TxIn::unsigned(s.outpoint))
            .collect();
        let outputs = self
            .recipients
            .iter()
            .chain(change.iter())
            .map(|r| TxOut {
                value: r.amount,
                script_pubkey: r.address.script_pubkey(),
            })
            .collect();

        let tx = Transaction {
            inputs,
            outputs,
            lock_time: self.lock_time,
            ..Transaction::new()
        };

        let out_total = tx.total_output_value().unwrap_or(u64::MAX);
        if out_total.checked_add(selection.fee) != Some(selection.total) {
            error!(
                inputs = selection.total,
                outputs = out_total,
                fee = selection.fee,
                "built transaction does not balance"
            );
            return Err(WalletError::Inconsistent("inputs != outputs + fee".into()));
        }

        Ok(UnsignedTransaction {
            tx,
            selection,
            change,
        })
    }

    /// Sign all inputs of an unsigned transaction using the keychain.
    ///
    /// Derives each input's key from its path and checks it controls the
    /// output being spent. Every signature is verified before returning.
    pub fn sign(unsigned: UnsignedTransaction, keychain: &KeyChain) -> Result<BuiltTransaction, WalletError> {
        let mut tx = unsigned.tx;

        for (i, input) in unsigned.selection.selected.iter().enumerate() {
            let key = keychain
                .key_pair(input.path)
                .map_err(|e| WalletError::Signing(format!("input {i}: {e}")))?;
            if key.address() != input.address {
                error!(path = %input.path, address = %input.address, "derived key does not own output");
                return Err(WalletError::Signing(format!(
                    "key at {} does not control {}",
                    input.path, input.address
                )));
            }
            sign_input(&mut tx, i, key.keypair(), &input.address.script_pubkey())
                .map_err(|e| WalletError::Signing(format!("input {i}: {e}")))?;
        }

        for (i, input) in unsigned.selection.selected.iter().enumerate() {
            if let Err(e) = verify_input(&tx, i, &input.address.script_pubkey()) {
                error!(input = i, error = %e, "signature failed self-check");
                return Err(WalletError::Signing(format!("input {i} failed verification: {e}")));
            }
        }

        Ok(BuiltTransaction {
            tx,
            inputs: unsigned.selection.selected,
            fee: unsigned.selection.fee,
            change: unsigned.change,
        })
    }
}
