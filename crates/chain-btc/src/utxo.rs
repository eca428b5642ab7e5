use serde::{Deserialize, Serialize};

use crate::error::BtcError;

/// An output being spent, as needed for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// The locking script (scriptPubKey) of the output.
    pub script: Vec<u8>,
    /// Value in satoshis.
    pub value: u64,
    /// Derivation path of the spending key, relative to the root key.
    pub path: Vec<u32>,
}

/// Picks inputs largest-first until they cover `target` plus the fee of the
/// selected set.
///
/// `values[i]` is the value of candidate `i`; `fee_for` returns the fee of a
/// transaction spending the given candidate indexes. The returned indexes are
/// in ascending order so the caller can keep its input order.
pub fn select_largest_first<F>(values: &[u64], target: u64, fee_for: F) -> Result<Vec<usize>, BtcError>
where
    F: Fn(&[usize]) -> Result<u64, BtcError>,
{
    if values.is_empty() {
        return Err(BtcError::InsufficientFunds {
            missing: target.saturating_add(fee_for(&[])?),
        });
    }

    // Sort by value descending (largest first); ties keep request order.
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*b].cmp(&values[*a]));

    let mut selected: Vec<usize> = Vec::with_capacity(order.len());
    let mut total: u64 = 0;
    let mut fee = 0;
    for idx in order {
        selected.push(idx);
        total = total
            .checked_add(values[idx])
            .ok_or_else(|| BtcError::InvalidAmount("input total overflows".into()))?;

        let mut sorted = selected.clone();
        sorted.sort_unstable();
        fee = fee_for(&sorted)?;
        if total >= target.saturating_add(fee) {
            return Ok(sorted);
        }
    }

    Err(BtcError::InsufficientFunds {
        missing: target.saturating_add(fee) - total,
    })
}
