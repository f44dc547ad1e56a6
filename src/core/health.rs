//! Health factor math.
//!
//! The health factor is the risk-adjusted collateral value divided by the
//! debt, scaled so that `1.0` sits exactly on the liquidation boundary. It is
//! derived on demand and never stored.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::utils::constants::{LIQUIDATION_PRECISION, PRECISION};
use crate::utils::math::{format_wad, mul_div, mul_div_saturating};

// ═══════════════════════════════════════════════════════════════════════════════
// HEALTH FACTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Health factor in 18-decimal fixed point
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HealthFactor(u128);

impl HealthFactor {
    /// Zero (no collateral backing any debt)
    pub const ZERO: Self = Self(0);

    /// The liquidation boundary (1.0)
    pub const ONE: Self = Self(PRECISION);

    /// Health factor of an account without debt
    pub const MAX: Self = Self(u128::MAX);

    /// Create from a raw scaled value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Raw scaled value
    pub fn raw(&self) -> u128 {
        self.0
    }

    /// True for accounts without debt
    pub fn is_infinite(&self) -> bool {
        self.0 == u128::MAX
    }

    /// True if at or above `minimum`
    pub fn is_healthy(&self, minimum: HealthFactor) -> bool {
        *self >= minimum
    }
}

impl fmt::Display for HealthFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{}", format_wad(self.0))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALCULATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral value counted toward solvency: `collateral_usd * threshold / 100`
pub fn adjusted_collateral(collateral_value_usd: u128, threshold_pct: u128) -> Result<u128> {
    mul_div(collateral_value_usd, threshold_pct, LIQUIDATION_PRECISION)
}

/// Calculate the health factor for a debt and collateral value
///
/// `debt == 0` yields [`HealthFactor::MAX`]. Values that do not fit in
/// `u128` saturate to `MAX` as well.
pub fn calculate_health_factor(
    total_debt: u128,
    collateral_value_usd: u128,
    threshold_pct: u128,
) -> Result<HealthFactor> {
    if total_debt == 0 {
        return Ok(HealthFactor::MAX);
    }
    let adjusted = adjusted_collateral(collateral_value_usd, threshold_pct)?;
    let raw = mul_div_saturating(adjusted, PRECISION, total_debt)?;
    Ok(HealthFactor(raw))
}
