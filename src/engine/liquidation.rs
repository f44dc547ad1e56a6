//! Liquidation of unhealthy accounts.
//!
//! Any caller may cover part of an account's debt once its health factor
//! drops below the minimum. The caller pays with their own synthetic units
//! and receives the equivalent collateral plus a bonus. Three parties are
//! involved: the victim's ledgers shrink, the liquidator pays and receives,
//! and the engine burns the repaid units.

use serde::{Deserialize, Serialize};

use crate::core::health::HealthFactor;
use crate::engine::dsc_engine::DscEngine;
use crate::engine::events::EngineEvent;
use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::math::{apply_bps, safe_add};
use crate::utils::validation::validate_non_zero;

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Amounts a liquidation would move at current prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationQuote {
    /// Account being liquidated
    pub user: Address,
    /// Collateral asset seized
    pub asset: Address,
    /// Debt the liquidator repays
    pub debt_to_cover: u128,
    /// Collateral worth `debt_to_cover`
    pub collateral_for_debt: u128,
    /// Bonus on top of `collateral_for_debt`
    pub bonus: u128,
    /// Collateral sent to the liquidator
    pub total_collateral: u128,
    /// The user's health factor before liquidation
    pub starting_health_factor: HealthFactor,
}

/// Result of a committed liquidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    /// Amounts moved
    pub quote: LiquidationQuote,
    /// The user's health factor afterwards
    pub ending_health_factor: HealthFactor,
    /// The liquidator's health factor afterwards
    pub liquidator_health_factor: HealthFactor,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION
// ═══════════════════════════════════════════════════════════════════════════════

impl DscEngine {
    /// Compute a liquidation without executing it
    ///
    /// Fails with `HealthFactorOk` when `user` is not liquidatable.
    pub fn quote_liquidation(
        &self,
        collateral_asset: &Address,
        user: &Address,
        debt_to_cover: u128,
    ) -> Result<LiquidationQuote> {
        validate_non_zero(debt_to_cover)?;
        self.collateral_token(collateral_asset)?;

        let starting_health_factor = self.get_health_factor(user)?;
        if starting_health_factor.is_healthy(self.risk_params().min_health_factor()) {
            return Err(Error::HealthFactorOk {
                health_factor: starting_health_factor,
            });
        }

        let collateral_for_debt = self.get_token_amount_from_usd(collateral_asset, debt_to_cover)?;
        let bonus = apply_bps(collateral_for_debt, self.risk_params().liquidation_bonus_bps)?;
        let total_collateral = safe_add(collateral_for_debt, bonus)?;

        Ok(LiquidationQuote {
            user: *user,
            asset: *collateral_asset,
            debt_to_cover,
            collateral_for_debt,
            bonus,
            total_collateral,
            starting_health_factor,
        })
    }

    /// Repay `debt_to_cover` of `user`'s debt with `caller`'s units and seize
    /// the equivalent `collateral_asset` plus the liquidation bonus
    ///
    /// The user's health factor must end strictly higher than it started,
    /// and the liquidator must stay healthy.
    pub fn liquidate(
        &self,
        caller: &Address,
        collateral_asset: &Address,
        user: &Address,
        debt_to_cover: u128,
    ) -> Result<LiquidationOutcome> {
        let outcome = self.execute("liquidate", |tx| {
            let quote = self.quote_liquidation(collateral_asset, user, debt_to_cover)?;
            let token = self.collateral_token(collateral_asset)?;

            // Seized collateral leaves the user's deposit for the liquidator
            tx.withdraw_collateral(user, collateral_asset, quote.total_collateral)?;
            tx.decrease_debt(user, debt_to_cover)?;

            let ending_health_factor = self.get_health_factor(user)?;
            if ending_health_factor <= quote.starting_health_factor {
                return Err(Error::HealthFactorNotImproved {
                    starting: quote.starting_health_factor,
                    ending: ending_health_factor,
                });
            }
            let liquidator_health_factor = self.revert_if_health_factor_is_broken(caller)?;

            self.settle_burn(tx, caller, debt_to_cover)?;
            tx.push_out(&token, caller, quote.total_collateral)?;

            tx.emit(EngineEvent::CollateralRedeemed {
                from: *user,
                to: *caller,
                asset: *collateral_asset,
                amount: quote.total_collateral,
            });
            tx.emit(EngineEvent::DscBurned {
                on_behalf_of: *user,
                payer: *caller,
                amount: debt_to_cover,
            });
            tx.emit(EngineEvent::Liquidated {
                user: *user,
                liquidator: *caller,
                asset: *collateral_asset,
                debt_covered: debt_to_cover,
                collateral_seized: quote.total_collateral,
                bonus: quote.bonus,
            });

            Ok(LiquidationOutcome {
                quote,
                ending_health_factor,
                liquidator_health_factor,
            })
        })?;

        tracing::info!(
            user = %user,
            liquidator = %caller,
            asset = %collateral_asset,
            debt_covered = %debt_to_cover,
            collateral_seized = %outcome.quote.total_collateral,
            starting = %outcome.quote.starting_health_factor,
            ending = %outcome.ending_health_factor,
            "Account liquidated"
        );
        Ok(outcome)
    }
}
