//! Conversion of display-currency amounts into transaction value.

use crate::error::ConversionError;
use alloy_primitives::{
    U256,
    utils::{ParseUnits, Unit},
};

/// Converts `amount` of the display currency into wei, given the value of one currency unit in
/// ether.
///
/// Both numbers are taken in 18-decimal fixed point, so the division is exact up to the last wei
/// (the remainder is truncated).
///
/// # Example
///
/// ```
/// use alloy_primitives::U256;
/// use order_console::convert::to_wei;
///
/// // 10 CAD at 0.00032 ETH/CAD
/// let ether = U256::from(10u64).pow(U256::from(18));
/// assert_eq!(to_wei(10.0, 0.00032)?, U256::from(31_250u64) * ether);
/// # Ok::<_, order_console::error::ConversionError>(())
/// ```
pub fn to_wei(amount: f64, rate: f64) -> Result<U256, ConversionError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ConversionError::InvalidRate(rate.to_string()));
    }
    if !amount.is_finite() || amount < 0.0 {
        return Err(ConversionError::InvalidAmount(amount.to_string()));
    }

    let amount = fixed_point(amount, ConversionError::InvalidAmount)?;
    let rate = fixed_point(rate, ConversionError::InvalidRate)?;
    if rate.is_zero() {
        // rates below one wei per unit cannot be represented
        return Err(ConversionError::InvalidRate(rate.to_string()));
    }

    let scaled = amount.checked_mul(Unit::ETHER.wei()).ok_or(ConversionError::Overflow)?;
    Ok(scaled / rate)
}

/// Formats a wei value as ether, trimming trailing zeros.
pub fn format_ether(wei: U256) -> String {
    let formatted = ParseUnits::U256(wei).format_units(Unit::ETHER);
    match formatted.split_once('.') {
        Some((int, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() { int.to_string() } else { format!("{int}.{frac}") }
        }
        None => formatted,
    }
}

/// Parses a non-negative float into 18-decimal fixed point through its shortest decimal form.
fn fixed_point(value: f64, err: fn(String) -> ConversionError) -> Result<U256, ConversionError> {
    let repr = value.to_string();
    ParseUnits::parse_units(&repr, Unit::ETHER).map(ParseUnits::get_absolute).map_err(|_| err(repr))
}
