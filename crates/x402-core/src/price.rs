//! Price ↔ smallest-unit conversion.
//!
//! Human prices ("$0.01") become smallest-unit decimal strings ("10000")
//! and back. No floating point anywhere in the pipeline; all arithmetic is
//! `U256` over decimal strings so amounts survive JSON round-trips intact.

use alloy::primitives::U256;

use crate::error::CoreError;
use crate::network::USDC_DECIMALS;

/// Default fractional digits for display formatting.
pub const DEFAULT_DISPLAY_DECIMALS: u32 = 2;

/// Minimum accepted price in smallest units (0.001 USDC).
pub const MIN_PRICE_UNITS: u64 = 1_000;

/// Parse a human-readable price ("$0.01", "0.01", "1") into a smallest-unit
/// decimal string.
///
/// Strips one leading `$`, multiplies by 10^6, and rounds half-up on the
/// seventh fractional digit. Rejects empty, negative, and non-numeric input.
pub fn parse_price(price: &str) -> Result<String, CoreError> {
    let trimmed = price.trim();
    let cleaned = trimmed.strip_prefix('$').unwrap_or(trimmed);

    if cleaned.is_empty() {
        return Err(CoreError::InvalidPrice(format!(
            "invalid price '{price}': no numeric content"
        )));
    }
    if cleaned.starts_with('-') {
        return Err(CoreError::InvalidPrice(format!(
            "invalid price '{price}': negative amounts not allowed"
        )));
    }

    let (whole_str, frac_str) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned, ""),
    };

    if whole_str.is_empty() && frac_str.is_empty() {
        return Err(CoreError::InvalidPrice(format!(
            "invalid price '{price}': no digits"
        )));
    }
    if !whole_str.chars().all(|c| c.is_ascii_digit())
        || !frac_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(CoreError::InvalidPrice(format!(
            "invalid price '{price}': not a number"
        )));
    }

    let whole: U256 = if whole_str.is_empty() {
        U256::ZERO
    } else {
        whole_str
            .parse()
            .map_err(|e| CoreError::InvalidPrice(format!("invalid price '{price}': {e}")))?
    };

    let decimals = USDC_DECIMALS as usize;
    let mut frac = U256::ZERO;
    if !frac_str.is_empty() {
        let kept = &frac_str[..frac_str.len().min(decimals)];
        if !kept.is_empty() {
            frac = kept
                .parse()
                .map_err(|e| CoreError::InvalidPrice(format!("invalid price '{price}': {e}")))?;
        }
        // Scale up when fewer than 6 fractional digits were given.
        if kept.len() < decimals {
            frac *= U256::from(10u64).pow(U256::from((decimals - kept.len()) as u64));
        }
        // Round half-up on the first dropped digit.
        if let Some(next) = frac_str.as_bytes().get(decimals) {
            if *next >= b'5' {
                frac += U256::ONE;
            }
        }
    }

    let multiplier = U256::from(10u64).pow(U256::from(USDC_DECIMALS as u64));
    let amount = whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| CoreError::InvalidPrice(format!("invalid price '{price}': overflow")))?;

    Ok(amount.to_string())
}

/// Format a smallest-unit decimal string back into a human price.
///
/// `decimals` is the displayed fractional width, capped at 6. With
/// `symbol`, the result carries a leading `$`.
pub fn format_price(amount: &str, decimals: u32, symbol: bool) -> Result<String, CoreError> {
    let value: U256 = amount
        .parse()
        .map_err(|e| CoreError::InvalidPrice(format!("invalid amount '{amount}': {e}")))?;

    let decimals = decimals.min(USDC_DECIMALS) as usize;
    let divisor = U256::from(10u64).pow(U256::from(USDC_DECIMALS as u64));
    let whole = value / divisor;
    let frac = value % divisor;

    let rendered = if decimals == 0 {
        whole.to_string()
    } else {
        let frac_full = format!("{frac:0>width$}", width = USDC_DECIMALS as usize);
        format!("{whole}.{}", &frac_full[..decimals])
    };

    Ok(if symbol {
        format!("${rendered}")
    } else {
        rendered
    })
}

/// Parse a price and additionally enforce the protocol floor of 0.001 units.
pub fn validate_price(price: &str) -> Result<String, CoreError> {
    let amount = parse_price(price)?;
    let value: U256 = amount
        .parse()
        .map_err(|e| CoreError::InvalidPrice(format!("invalid amount '{amount}': {e}")))?;
    if value < U256::from(MIN_PRICE_UNITS) {
        return Err(CoreError::InvalidPrice(format!(
            "price '{price}' below minimum of 0.001"
        )));
    }
    Ok(amount)
}
