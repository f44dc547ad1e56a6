//! Risk parameters.
//!
//! Fixed at engine construction. The defaults are the baseline system: a
//! 50% liquidation threshold (200% overcollateralization), a 10% liquidation
//! bonus, a minimum health factor of 1.0 and no price staleness check.

use serde::{Deserialize, Serialize};

use crate::core::health::HealthFactor;
use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::validation::{validate_bonus_bps, validate_threshold_pct};

// ═══════════════════════════════════════════════════════════════════════════════
// RISK PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine risk parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParams {
    /// Percentage of collateral value counted toward solvency
    pub liquidation_threshold_pct: u128,

    /// Bonus paid to liquidators in basis points of the seized amount
    pub liquidation_bonus_bps: u128,

    /// Health factor below which an account is liquidatable (1e18 = 1.0)
    pub min_health_factor: u128,

    /// Reject prices older than this many seconds; `None` disables the check
    pub max_price_age_secs: Option<u64>,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            liquidation_threshold_pct: LIQUIDATION_THRESHOLD_PCT,
            liquidation_bonus_bps: LIQUIDATION_BONUS_BPS,
            min_health_factor: MIN_HEALTH_FACTOR,
            max_price_age_secs: None,
        }
    }
}

impl RiskParams {
    /// Custom liquidation threshold
    pub fn with_threshold_pct(mut self, pct: u128) -> Self {
        self.liquidation_threshold_pct = pct;
        self
    }

    /// Custom liquidation bonus
    pub fn with_bonus_bps(mut self, bps: u128) -> Self {
        self.liquidation_bonus_bps = bps;
        self
    }

    /// Custom minimum health factor
    pub fn with_min_health_factor(mut self, min: u128) -> Self {
        self.min_health_factor = min;
        self
    }

    /// Enable the staleness check
    pub fn with_max_price_age(mut self, secs: u64) -> Self {
        self.max_price_age_secs = Some(secs);
        self
    }

    /// Minimum health factor as a typed value
    pub fn min_health_factor(&self) -> HealthFactor {
        HealthFactor::from_raw(self.min_health_factor)
    }

    /// Check that parameters are usable
    pub fn validate(&self) -> Result<()> {
        validate_threshold_pct(self.liquidation_threshold_pct)?;
        validate_bonus_bps(self.liquidation_bonus_bps)?;
        if self.min_health_factor == 0 {
            return Err(Error::InvalidParameter {
                name: "min_health_factor".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_price_age_secs == Some(0) {
            return Err(Error::InvalidParameter {
                name: "max_price_age_secs".into(),
                reason: "must be greater than zero when set".into(),
            });
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE PARAMETERS VIEW
// ═══════════════════════════════════════════════════════════════════════════════

/// Constants an integrator needs to reproduce the engine's math
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineParams {
    /// Fixed-point scale of amounts and health factors
    pub precision: u128,
    /// Liquidation threshold in percent
    pub liquidation_threshold_pct: u128,
    /// Scale of `liquidation_threshold_pct`
    pub liquidation_precision: u128,
    /// Liquidation bonus in basis points
    pub liquidation_bonus_bps: u128,
    /// Minimum health factor
    pub min_health_factor: HealthFactor,
}

impl From<&RiskParams> for EngineParams {
    fn from(params: &RiskParams) -> Self {
        Self {
            precision: PRECISION,
            liquidation_threshold_pct: params.liquidation_threshold_pct,
            liquidation_precision: LIQUIDATION_PRECISION,
            liquidation_bonus_bps: params.liquidation_bonus_bps,
            min_health_factor: params.min_health_factor(),
        }
    }
}
