//! Fixed-point arithmetic and mathematical utilities.
//!
//! Amounts are `u128` values in 18-decimal fixed point. Products of two such
//! values do not fit in `u128`, so multiply-then-divide goes through a
//! 256-bit intermediate. All divisions truncate toward zero.

use primitive_types::U256;

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, DSC_DECIMALS};

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(Error::Underflow {
        operation: format!("{} - {}", a, b),
    })
}

/// Computes `(a * b) / c` with a 256-bit intermediate, truncating
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    // (2^128 - 1)^2 < 2^256, so the product cannot overflow
    let result = U256::from(a) * U256::from(b) / U256::from(c);
    if result > U256::from(u128::MAX) {
        return Err(Error::Overflow {
            operation: format!("({} * {}) / {}", a, b, c),
        });
    }
    Ok(result.low_u128())
}

/// Same as [`mul_div`] but saturates at `u128::MAX` instead of failing
pub fn mul_div_saturating(a: u128, b: u128, c: u128) -> Result<u128> {
    match mul_div(a, b, c) {
        Err(Error::Overflow { .. }) => Ok(u128::MAX),
        other => other,
    }
}

/// Portion of `amount` given in basis points, truncating
pub fn apply_bps(amount: u128, bps: u128) -> Result<u128> {
    mul_div(amount, bps, BPS_DIVISOR)
}

/// `10^decimals` as u128
pub fn pow10(decimals: u8) -> Result<u128> {
    10u128.checked_pow(decimals as u32).ok_or(Error::Overflow {
        operation: format!("10^{}", decimals),
    })
}

/// Rescale a value from `from_decimals` to `to_decimals`, truncating when
/// scaling down
pub fn rescale(value: u128, from_decimals: u8, to_decimals: u8) -> Result<u128> {
    if from_decimals == to_decimals {
        return Ok(value);
    }
    if from_decimals < to_decimals {
        let factor = pow10(to_decimals - from_decimals)?;
        value.checked_mul(factor).ok_or(Error::Overflow {
            operation: format!("rescale {} by 10^{}", value, to_decimals - from_decimals),
        })
    } else {
        Ok(value / pow10(from_decimals - to_decimals)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECIMAL STRINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Format a fixed-point value with the given decimals, trimming trailing zeros
pub fn format_units(value: u128, decimals: u8) -> String {
    let unit = match pow10(decimals) {
        Ok(unit) => unit,
        Err(_) => return value.to_string(),
    };
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Format an 18-decimal value
pub fn format_wad(value: u128) -> String {
    format_units(value, DSC_DECIMALS)
}

/// Parse a decimal string such as `"10.5"` into fixed point with `decimals`
pub fn parse_units(input: &str, decimals: u8) -> Result<u128> {
    let invalid = |reason: &str| Error::InvalidParameter {
        name: "amount".into(),
        reason: format!("{:?}: {}", input, reason),
    };

    let input = input.trim();
    let (whole, frac) = match input.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (input, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("empty"));
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("not a decimal number"));
    }
    if frac.len() > decimals as usize {
        return Err(invalid("too many decimal places"));
    }

    let unit = pow10(decimals)?;
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("integer part out of range"))?
    };
    let frac_value: u128 = if frac.is_empty() {
        0
    } else {
        let digits: u128 = frac.parse().map_err(|_| invalid("fraction out of range"))?;
        digits * pow10(decimals - frac.len() as u8)?
    };

    whole
        .checked_mul(unit)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| invalid("value out of range"))
}

/// Parse an 18-decimal value
pub fn parse_wad(input: &str) -> Result<u128> {
    parse_units(input, DSC_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::PRECISION;

    #[test]
    fn test_safe_arithmetic() {
        assert!(safe_add(1, 2).is_ok());
        assert!(safe_add(u128::MAX, 1).is_err());

        assert_eq!(safe_sub(5, 3).unwrap(), 2);
        assert!(matches!(safe_sub(3, 5), Err(Error::Underflow { .. })));
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // 2000 USD price (18 dec) times 1e9 tokens would overflow u128 directly
        let price = 2_000 * PRECISION;
        let amount = 1_000_000_000 * PRECISION;
        let value = mul_div(price, amount, PRECISION).unwrap();
        assert_eq!(value, 2_000_000_000_000 * PRECISION);
    }

    #[test]
    fn test_mul_div_truncates() {
        assert_eq!(mul_div(10, 1, 3).unwrap(), 3);
        assert_eq!(mul_div(2, 1, 3).unwrap(), 0);
    }

    #[test]
    fn test_mul_div_errors() {
        assert!(matches!(mul_div(1, 1, 0), Err(Error::InvalidParameter { .. })));
        assert!(matches!(mul_div(u128::MAX, 2, 1), Err(Error::Overflow { .. })));
        assert_eq!(mul_div_saturating(u128::MAX, 2, 1).unwrap(), u128::MAX);
    }

    #[test]
    fn test_apply_bps() {
        assert_eq!(apply_bps(1_000, 1_000).unwrap(), 100);
        assert_eq!(apply_bps(9, 1_000).unwrap(), 0);
    }

    #[test]
    fn test_rescale() {
        assert_eq!(rescale(2_000_00000000, 8, 18).unwrap(), 2_000 * PRECISION);
        assert_eq!(rescale(2_000 * PRECISION, 18, 8).unwrap(), 2_000_00000000);
        assert_eq!(rescale(7, 18, 18).unwrap(), 7);
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_wad(PRECISION), "1");
        assert_eq!(format_wad(PRECISION / 2), "0.5");
        assert_eq!(format_wad(999_999_999_999_999_999), "0.999999999999999999");
        assert_eq!(format_units(123_45, 2), "123.45");
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_wad("10").unwrap(), 10 * PRECISION);
        assert_eq!(parse_wad("0.05").unwrap(), PRECISION / 20);
        assert_eq!(parse_wad(".5").unwrap(), PRECISION / 2);
        assert_eq!(parse_units("2000", 8).unwrap(), 2_000_00000000);

        assert!(parse_wad("").is_err());
        assert!(parse_wad("1.2.3").is_err());
        assert!(parse_wad("-1").is_err());
        assert!(parse_units("1.123", 2).is_err());
    }
}
