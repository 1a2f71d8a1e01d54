//! Fee split arithmetic.

use alloy::primitives::U256;

/// Result of splitting a payment between the facilitator and the publisher.
/// Invariant: `fee + publisher == value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub fee: U256,
    pub publisher: U256,
}

/// Split `value` by `fee_bps` basis points. The fee truncates toward zero
/// and the publisher keeps the remainder, so the parts always sum back to
/// `value`.
///
/// Computed as `value/10000 * bps + (value%10000) * bps / 10000` to avoid
/// overflowing the intermediate product for values near `U256::MAX`.
pub fn split_fee(value: U256, fee_bps: u32) -> FeeSplit {
    debug_assert!(fee_bps <= 5_000, "fee capped at 50%");
    let bps = U256::from(fee_bps);
    let denom = U256::from(10_000u64);

    let fee = (value / denom) * bps + (value % denom) * bps / denom;
    FeeSplit {
        fee,
        publisher: value - fee,
    }
}
