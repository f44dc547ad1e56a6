//! Input validation utilities for the DSC engine.
//!
//! These checks run before any state change, so a validation failure never
//! leaves anything to roll back.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::constants::{BPS_DIVISOR, LIQUIDATION_PRECISION};

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: u128) -> Result<()> {
    if amount == 0 {
        return Err(Error::InvalidAmount);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate the collateral whitelist against its price feeds
pub fn validate_whitelist(assets: &[Address], feed_count: usize) -> Result<()> {
    if assets.len() != feed_count {
        return Err(Error::LengthMismatch {
            tokens: assets.len(),
            feeds: feed_count,
        });
    }

    if assets.is_empty() {
        return Err(Error::InvalidParameter {
            name: "collateral_tokens".into(),
            reason: "whitelist cannot be empty".into(),
        });
    }

    let mut seen = BTreeSet::new();
    for asset in assets {
        if !seen.insert(*asset) {
            return Err(Error::InvalidParameter {
                name: "collateral_tokens".into(),
                reason: format!("duplicate asset {}", asset),
            });
        }
    }

    Ok(())
}

/// Validate the liquidation threshold percentage
pub fn validate_threshold_pct(pct: u128) -> Result<()> {
    if pct == 0 || pct > LIQUIDATION_PRECISION {
        return Err(Error::InvalidParameter {
            name: "liquidation_threshold_pct".into(),
            reason: format!("must be in 1..={}, got {}", LIQUIDATION_PRECISION, pct),
        });
    }
    Ok(())
}

/// Validate the liquidation bonus in basis points
pub fn validate_bonus_bps(bps: u128) -> Result<()> {
    if bps >= BPS_DIVISOR {
        return Err(Error::InvalidParameter {
            name: "liquidation_bonus_bps".into(),
            reason: format!("must be below {}, got {}", BPS_DIVISOR, bps),
        });
    }
    Ok(())
}
