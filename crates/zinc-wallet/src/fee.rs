//! Size estimation and fee policy.
//!
//! Fees are charged per started kilobyte: `ceil(size / 1000) * rate`, where
//! `rate` is in satoshis per 1000 bytes.

use zinc_core::constants::{TX_FIXED_SIZE, TX_INPUT_SIZE, TX_OUTPUT_SIZE};
use zinc_core::encode::compact_size_len;

use crate::config::FeeConfig;
use crate::error::WalletError;

/// Upper bound of the signed size of a P2PKH transaction.
pub fn estimate_size(inputs: usize, outputs: usize) -> usize {
    TX_FIXED_SIZE
        + compact_size_len(inputs as u64)
        + compact_size_len(outputs as u64)
        + TX_INPUT_SIZE * inputs
        + TX_OUTPUT_SIZE * outputs
}

/// Fee for `size` bytes at `rate_per_kb`, rounded up to whole kilobytes.
pub fn fee_for_size(size: usize, rate_per_kb: u64) -> u64 {
    (size as u64).div_ceil(1000).saturating_mul(rate_per_kb)
}

/// Fee rules applied to a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeePolicy {
    /// Rate requested for this build.
    pub rate_per_kb: u64,
    /// Smallest change output worth creating.
    pub dust_threshold: u64,
}

impl FeePolicy {
    /// Check `rate_per_kb` against the relay minimum in `config`.
    pub fn new(config: &FeeConfig, rate_per_kb: u64) -> Result<Self, WalletError> {
        if rate_per_kb < config.min_relay_fee_per_kb {
            return Err(WalletError::FeeTooLow {
                rate: rate_per_kb,
                minimum: config.min_relay_fee_per_kb,
            });
        }
        Ok(Self {
            rate_per_kb,
            dust_threshold: config.dust_threshold,
        })
    }

    /// Fee for a transaction of the given shape.
    pub fn fee(&self, inputs: usize, outputs: usize) -> u64 {
        fee_for_size(estimate_size(inputs, outputs), self.rate_per_kb)
    }
}
