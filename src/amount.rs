//! Decimal strings to smallest-unit integers.

use crate::error::{Error, Result};

const DEFAULT_DECIMALS: u32 = 18;

/// Decimals of assets the flows use out of the box.
pub fn known_decimals(asset_id: &str) -> Option<u32> {
    match asset_id {
        "nep141:wrap.near" => Some(24),
        "nep141:eth.omft.near" | "nep141:arb.omft.near" => Some(18),
        _ => None,
    }
}

/// `parse_units("0.001", 24) == 10^21`. Rejects signs, exponents, empty parts
/// and more fractional digits than `decimals`.
pub fn parse_units(amount: &str, decimals: u32) -> Result<u128> {
    let invalid = || Error::InvalidAmount(amount.to_string());

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > decimals as usize {
        return Err(Error::InvalidAmount(format!(
            "{amount} has more than {decimals} fractional digits"
        )));
    }

    let scale = 10u128.checked_pow(decimals).ok_or_else(invalid)?;
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        let padding = 10u128.pow(decimals - fraction.len() as u32);
        fraction.parse::<u128>().map_err(|_| invalid())? * padding
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(invalid)
}

/// [`parse_units`] with the asset's known decimals, 18 otherwise.
pub fn to_units(amount: &str, asset_id: &str) -> Result<u128> {
    parse_units(amount, known_decimals(asset_id).unwrap_or(DEFAULT_DECIMALS))
}
