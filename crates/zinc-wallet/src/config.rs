//! Wallet configuration.
//!
//! Every field has a default, so a partial config file (or none at all)
//! yields a usable [`WalletConfig`].

use serde::{Deserialize, Serialize};

use zinc_core::address::Network;
use zinc_core::constants::{DEFAULT_FEE_PER_KB, DUST_THRESHOLD, MIN_RELAY_FEE_PER_KB};

use crate::coin_selection::SelectionStrategy;
use crate::error::WalletError;

/// Unused receive addresses kept ahead of the highest used one.
pub const DEFAULT_RECEIVE_GAP_LIMIT: u32 = 20;

/// Unused change addresses kept ahead of the highest used one.
pub const DEFAULT_CHANGE_GAP_LIMIT: u32 = 10;

/// Seconds an unbroadcast transaction keeps its inputs reserved.
pub const DEFAULT_RESERVATION_TTL_SECS: u64 = 600;

/// Buffered lifecycle events per subscriber.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Fee parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Rate used when a build does not name one, in sat per 1000 bytes.
    pub default_fee_rate_per_kb: u64,
    /// Lowest rate the network relays.
    pub min_relay_fee_per_kb: u64,
    /// Change below this is added to the fee instead of creating an output.
    pub dust_threshold: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            default_fee_rate_per_kb: DEFAULT_FEE_PER_KB,
            min_relay_fee_per_kb: MIN_RELAY_FEE_PER_KB,
            dust_threshold: DUST_THRESHOLD,
        }
    }
}

/// Which outputs count toward the balance and may be spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancePolicy {
    /// Confirmations an output needs. 0 includes unconfirmed outputs.
    pub min_confirmations: u32,
    /// Count outputs of transactions the provider flagged as conflicting.
    pub include_conflicted: bool,
}

/// Configuration for a wallet instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub network: Network,
    pub receive_gap_limit: u32,
    pub change_gap_limit: u32,
    pub fees: FeeConfig,
    pub balance: BalancePolicy,
    pub selection_strategy: SelectionStrategy,
    pub reservation_ttl_secs: u64,
    pub event_channel_capacity: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            receive_gap_limit: DEFAULT_RECEIVE_GAP_LIMIT,
            change_gap_limit: DEFAULT_CHANGE_GAP_LIMIT,
            fees: FeeConfig::default(),
            balance: BalancePolicy::default(),
            selection_strategy: SelectionStrategy::default(),
            reservation_ttl_secs: DEFAULT_RESERVATION_TTL_SECS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl WalletConfig {
    /// Defaults for `network`.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Reject values the wallet cannot operate with.
    pub fn validate(&self) -> Result<(), WalletError> {
        if self.receive_gap_limit == 0 {
            return Err(WalletError::InvalidConfig("receive_gap_limit must be at least 1".into()));
        }
        if self.change_gap_limit == 0 {
            return Err(WalletError::InvalidConfig("change_gap_limit must be at least 1".into()));
        }
        if self.fees.min_relay_fee_per_kb == 0 {
            return Err(WalletError::InvalidConfig("min_relay_fee_per_kb must be positive".into()));
        }
        if self.fees.default_fee_rate_per_kb < self.fees.min_relay_fee_per_kb {
            return Err(WalletError::InvalidConfig(format!(
                "default_fee_rate_per_kb {} is below min_relay_fee_per_kb {}",
                self.fees.default_fee_rate_per_kb, self.fees.min_relay_fee_per_kb
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(WalletError::InvalidConfig("event_channel_capacity must be at least 1".into()));
        }
        Ok(())
    }
}
