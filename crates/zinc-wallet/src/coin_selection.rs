//! Deterministic coin selection.
//!
//! Candidates are ordered by the configured [`SelectionStrategy`] and taken
//! greedily until they cover the amount plus the fee for the transaction
//! they would form. A change output is added only when the leftover clears
//! the dust threshold; otherwise the leftover goes to the fee.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use zinc_core::address::Address;
use zinc_core::types::OutPoint;

use crate::error::WalletError;
use crate::fee::FeePolicy;
use crate::keys::KeyPath;

/// Order in which spendable outputs are considered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Confirmed outputs by height, then unconfirmed ones, each in the order
    /// they were observed.
    #[default]
    OldestFirst,
    /// Lowest value first. Consolidates small outputs.
    SmallestFirst,
    /// Highest value first. Fewest inputs.
    LargestFirst,
}

/// An owned, unspent, unreserved output available to a build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendableOutput {
    pub outpoint: OutPoint,
    pub value: u64,
    pub address: Address,
    /// Derivation path of the key that can spend this output.
    pub path: KeyPath,
    /// Height of the block that confirmed the output, if any.
    pub height: Option<u32>,
    /// Observation order of the funding transaction.
    pub sequence: u64,
}

impl SpendableOutput {
    fn age_key(&self) -> (bool, u32, u64, OutPoint) {
        (
            self.height.is_none(),
            self.height.unwrap_or(u32::MAX),
            self.sequence,
            self.outpoint,
        )
    }
}

/// Result of coin selection: which outputs to spend and the fee/change breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Selected outputs, in strategy order.
    pub selected: Vec<SpendableOutput>,
    /// Total value of the selected outputs.
    pub total: u64,
    /// Fee paid by the transaction, including any folded-in dust.
    pub fee: u64,
    /// Change to return to the wallet. 0 means no change output.
    pub change: u64,
}

/// Greedy coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Sort candidates into the order `strategy` considers them.
    pub fn order(candidates: &mut [SpendableOutput], strategy: SelectionStrategy) {
        match strategy {
            SelectionStrategy::OldestFirst => candidates.sort_by_key(|c| c.age_key()),
            SelectionStrategy::SmallestFirst => candidates.sort_by_key(|c| (c.value, c.age_key())),
            SelectionStrategy::LargestFirst => {
                candidates.sort_by_key(|c| (Reverse(c.value), c.age_key()))
            }
        }
    }

    /// Select outputs paying `amount` to `recipients` outputs.
    ///
    /// # Arguments
    /// - `candidates`: spendable outputs, in any order
    /// - `amount`: total paid to recipients, excluding fee
    /// - `recipients`: number of recipient outputs
    /// - `policy`: fee rate and dust threshold
    /// - `strategy`: candidate order
    pub fn select(
        mut candidates: Vec<SpendableOutput>,
        amount: u64,
        recipients: usize,
        policy: &FeePolicy,
        strategy: SelectionStrategy,
    ) -> Result<CoinSelection, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount("amount must be non-zero".into()));
        }

        Self::order(&mut candidates, strategy);
        let available: u64 = candidates.iter().map(|c| c.value).fold(0, u64::saturating_add);
        let candidate_count = candidates.len();

        let mut selected = Vec::new();
        let mut total: u64 = 0;

        for candidate in candidates {
            total = total.saturating_add(candidate.value);
            selected.push(candidate);

            let fee_without_change = policy.fee(selected.len(), recipients);
            if total < amount.saturating_add(fee_without_change) {
                continue;
            }

            let fee_with_change = policy.fee(selected.len(), recipients + 1);
            let needed_for_change = amount
                .saturating_add(fee_with_change)
                .saturating_add(policy.dust_threshold);

            let (fee, change) = if total >= needed_for_change {
                (fee_with_change, total - amount - fee_with_change)
            } else {
                (total - amount, 0)
            };

            return Ok(CoinSelection {
                selected,
                total,
                fee,
                change,
            });
        }

        Err(WalletError::InsufficientFunds {
            have: available,
            need: amount.saturating_add(policy.fee(candidate_count.max(1), recipients)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zinc_core::address::Network;
    use zinc_core::types::Hash256;

    fn policy(rate: u64) -> FeePolicy {
        FeePolicy {
            rate_per_kb: rate,
            dust_threshold: 546,
        }
    }

    fn output(n: u8, value: u64, height: Option<u32>, sequence: u64) -> SpendableOutput {
        SpendableOutput {
            outpoint: OutPoint::new(Hash256([n; 32]), 0),
            value,
            address: Address::from_pubkey_hash([n; 20], Network::Mainnet),
            path: KeyPath::external(n as u32),
            height,
            sequence,
        }
    }

    fn values(sel: &CoinSelection) -> Vec<u64> {
        sel.selected.iter().map(|s| s.value).collect()
    }

    #[test]
    fn single_input_with_change() {
        let sel = CoinSelector::select(
            vec![output(1, 100_000, Some(10), 0)],
            60_000,
            1,
            &policy(1000),
            SelectionStrategy::OldestFirst,
        )
        .unwrap();
        assert_eq!(values(&sel), vec![100_000]);
        assert_eq!(sel.fee, 1000);
        assert_eq!(sel.change, 39_000);
        assert_eq!(sel.total, 60_000 + sel.fee + sel.change);
    }

    #[test]
    fn dust_change_folded_into_fee() {
        // 61_300 - 60_000 - 1000 = 300 < dust
        let sel = CoinSelector::select(
            vec![output(1, 61_300, Some(1), 0)],
            60_000,
            1,
            &policy(1000),
            SelectionStrategy::OldestFirst,
        )
        .unwrap();
        assert_eq!(sel.change, 0);
        assert_eq!(sel.fee, 1_300);
    }

    #[test]
    fn exact_amount_without_change() {
        let sel = CoinSelector::select(
            vec![output(1, 61_000, Some(1), 0)],
            60_000,
            1,
            &policy(1000),
            SelectionStrategy::OldestFirst,
        )
        .unwrap();
        assert_eq!(sel.change, 0);
        assert_eq!(sel.fee, 1000);
    }

    #[test]
    fn oldest_first_prefers_confirmed_by_height() {
        let candidates = vec![
            output(1, 50_000, None, 0),
            output(2, 50_000, Some(20), 1),
            output(3, 50_000, Some(5), 2),
        ];
        let sel = CoinSelector::select(candidates, 40_000, 1, &policy(1000), SelectionStrategy::OldestFirst)
            .unwrap();
        assert_eq!(sel.selected[0].outpoint.txid, Hash256([3; 32]));
    }

    #[test]
    fn unconfirmed_ordered_by_observation() {
        let mut candidates = vec![output(1, 10, None, 9), output(2, 10, None, 3), output(3, 10, Some(1), 50)];
        CoinSelector::order(&mut candidates, SelectionStrategy::OldestFirst);
        let seqs: Vec<u64> = candidates.iter().map(|c| c.sequence).collect();
        assert_eq!(seqs, vec![50, 3, 9]);
    }

    #[test]
    fn smallest_and_largest_first() {
        let candidates = vec![
            output(1, 30_000, Some(1), 0),
            output(2, 10_000, Some(2), 1),
            output(3, 90_000, Some(3), 2),
        ];
        let small = CoinSelector::select(
            candidates.clone(),
            35_000,
            1,
            &policy(1000),
            SelectionStrategy::SmallestFirst,
        )
        .unwrap();
        assert_eq!(values(&small), vec![10_000, 30_000]);

        let large = CoinSelector::select(candidates, 35_000, 1, &policy(1000), SelectionStrategy::LargestFirst)
            .unwrap();
        assert_eq!(values(&large), vec![90_000]);
    }

    #[test]
    fn fee_grows_with_inputs() {
        // Seven inputs push the size past 1000 bytes.
        let candidates: Vec<_> = (0..10).map(|i| output(i, 10_000, Some(i as u32), 0)).collect();
        let sel = CoinSelector::select(candidates, 65_000, 1, &policy(1000), SelectionStrategy::OldestFirst)
            .unwrap();
        assert_eq!(sel.selected.len(), 7);
        assert_eq!(sel.fee, 2000);
        assert_eq!(sel.change, 3000);
    }

    #[test]
    fn insufficient_funds() {
        let err = CoinSelector::select(
            vec![output(1, 1_000, Some(1), 0)],
            900,
            1,
            &policy(1000),
            SelectionStrategy::OldestFirst,
        )
        .unwrap_err();
        assert_eq!(
            err,
            WalletError::InsufficientFunds {
                have: 1_000,
                need: 1_900
            }
        );
    }

    #[test]
    fn empty_candidates() {
        let err = CoinSelector::select(vec![], 1_000, 1, &policy(1000), SelectionStrategy::OldestFirst)
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { have: 0, .. }));
    }

    #[test]
    fn zero_amount_rejected() {
        let err = CoinSelector::select(
            vec![output(1, 1_000, Some(1), 0)],
            0,
            1,
            &policy(1000),
            SelectionStrategy::OldestFirst,
        )
        .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
    }

    #[test]
    fn selection_is_deterministic_regardless_of_input_order() {
        let a = vec![output(1, 20_000, None, 4), output(2, 20_000, None, 4), output(3, 20_000, Some(2), 1)];
        let mut b = a.clone();
        b.reverse();
        let pa = CoinSelector::select(a, 25_000, 1, &policy(1000), SelectionStrategy::OldestFirst).unwrap();
        let pb = CoinSelector::select(b, 25_000, 1, &policy(1000), SelectionStrategy::OldestFirst).unwrap();
        assert_eq!(pa, pb);
    }
}
