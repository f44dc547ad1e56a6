//! Engine constants and policy values.
//!
//! All protocol-wide constants are defined here for easy auditing. Risk
//! policy values are only defaults: `RiskParams` carries the values an engine
//! instance actually uses.

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED-POINT CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Ledger decimals (DSC and collateral amounts)
pub const DSC_DECIMALS: u8 = 18;

/// Fixed-point unit: 1.0 in ledger scale (10^18)
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Default price feed decimals (USD pairs report 8 decimals)
pub const DEFAULT_FEED_DECIMALS: u8 = 8;

// ═══════════════════════════════════════════════════════════════════════════════
// RISK POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// Share of collateral value counted toward the health factor - 50%
/// ($2 of collateral per $1 of debt sits exactly at the boundary)
pub const LIQUIDATION_THRESHOLD_PCT: u128 = 50;

/// Divisor for the liquidation threshold percentage
pub const LIQUIDATION_PRECISION: u128 = 100;

/// Liquidation bonus - 10% (1000 basis points)
pub const LIQUIDATION_BONUS_BPS: u128 = 1000;

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u128 = 10_000;

/// Minimum health factor (1.0 scaled)
pub const MIN_HEALTH_FACTOR: u128 = PRECISION;

// ═══════════════════════════════════════════════════════════════════════════════
// BOOKKEEPING
// ═══════════════════════════════════════════════════════════════════════════════

/// Events kept in memory by the engine event log
pub const MAX_EVENTS: usize = 1000;

/// Length of an address in bytes
pub const ADDRESS_LENGTH: usize = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_constants() {
        assert_eq!(PRECISION, 10u128.pow(DSC_DECIMALS as u32));
        assert!(DEFAULT_FEED_DECIMALS < DSC_DECIMALS);
    }

    #[test]
    fn test_risk_constants() {
        assert!(LIQUIDATION_THRESHOLD_PCT > 0 && LIQUIDATION_THRESHOLD_PCT <= LIQUIDATION_PRECISION);
        assert!(LIQUIDATION_BONUS_BPS < BPS_DIVISOR);
        assert_eq!(MIN_HEALTH_FACTOR, PRECISION);
    }
}
