//! Collateral ledger.
//!
//! Tracks how much of each whitelisted asset every account has deposited,
//! and values those deposits in USD through a [`PriceOracle`]. The ledger is
//! pure bookkeeping: moving real token balances is the engine's job.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::oracle::registry::PriceOracle;
use crate::utils::address::Address;
use crate::utils::math::safe_add;
use crate::utils::validation::validate_non_zero;

/// Per-account, per-asset deposited amounts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralLedger {
    /// Whitelisted assets, in configuration order
    assets: Vec<Address>,
    /// account -> asset -> amount
    balances: BTreeMap<Address, BTreeMap<Address, u128>>,
    /// asset -> sum over all accounts
    totals: BTreeMap<Address, u128>,
}

impl CollateralLedger {
    /// Create an empty ledger for a fixed whitelist
    pub fn new(assets: Vec<Address>) -> Self {
        let totals = assets.iter().map(|asset| (*asset, 0)).collect();
        Self {
            assets,
            balances: BTreeMap::new(),
            totals,
        }
    }

    /// Whitelisted assets, in configuration order
    pub fn assets(&self) -> &[Address] {
        &self.assets
    }

    /// True if `asset` is whitelisted
    pub fn is_allowed(&self, asset: &Address) -> bool {
        self.totals.contains_key(asset)
    }

    /// Fail with `AssetNotAllowed` unless `asset` is whitelisted
    pub fn ensure_allowed(&self, asset: &Address) -> Result<()> {
        if !self.is_allowed(asset) {
            return Err(Error::AssetNotAllowed(*asset));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEPOSIT/WITHDRAW
    // ═══════════════════════════════════════════════════════════════════════════

    /// Credit `amount` of `asset` to `account`
    pub fn deposit(&mut self, account: &Address, asset: &Address, amount: u128) -> Result<()> {
        validate_non_zero(amount)?;
        self.ensure_allowed(asset)?;

        let current = self.balance(account, asset);
        let new_amount = current.checked_add(amount).ok_or(Error::Overflow {
            operation: "deposit collateral".into(),
        })?;
        let total = safe_add(self.total_deposited(asset), amount)?;

        self.balances
            .entry(*account)
            .or_default()
            .insert(*asset, new_amount);
        self.totals.insert(*asset, total);
        Ok(())
    }

    /// Debit `amount` of `asset` from `account`
    pub fn withdraw(&mut self, account: &Address, asset: &Address, amount: u128) -> Result<()> {
        validate_non_zero(amount)?;
        self.ensure_allowed(asset)?;

        let current = self.balance(account, asset);
        let new_amount = current.checked_sub(amount).ok_or(Error::InsufficientBalance {
            required: amount,
            available: current,
        })?;

        // Entries are zeroed, never removed
        self.balances
            .entry(*account)
            .or_default()
            .insert(*asset, new_amount);
        let total = self.total_deposited(asset).saturating_sub(amount);
        self.totals.insert(*asset, total);
        Ok(())
    }

    /// Raw entry for `(account, asset)`; `None` if never written
    pub(crate) fn entry(&self, account: &Address, asset: &Address) -> Option<u128> {
        self.balances.get(account).and_then(|assets| assets.get(asset)).copied()
    }

    /// Put an entry back to a previously read value, keeping totals in step
    pub(crate) fn restore(&mut self, account: &Address, asset: &Address, previous: Option<u128>) {
        let current = self.balance(account, asset);
        let total = self.total_deposited(asset) - current + previous.unwrap_or(0);
        self.totals.insert(*asset, total);

        match previous {
            Some(amount) => {
                self.balances.entry(*account).or_default().insert(*asset, amount);
            }
            None => {
                if let Some(assets) = self.balances.get_mut(account) {
                    assets.remove(asset);
                    if assets.is_empty() {
                        self.balances.remove(account);
                    }
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Amount of `asset` deposited by `account`
    pub fn balance(&self, account: &Address, asset: &Address) -> u128 {
        self.balances
            .get(account)
            .and_then(|assets| assets.get(asset))
            .copied()
            .unwrap_or(0)
    }

    /// Every whitelisted asset with `account`'s deposit, in whitelist order
    pub fn balances_of(&self, account: &Address) -> Vec<(Address, u128)> {
        self.assets
            .iter()
            .map(|asset| (*asset, self.balance(account, asset)))
            .collect()
    }

    /// Amount of `asset` deposited across all accounts
    pub fn total_deposited(&self, asset: &Address) -> u128 {
        self.totals.get(asset).copied().unwrap_or(0)
    }

    /// Number of accounts that ever deposited
    pub fn account_count(&self) -> usize {
        self.balances.len()
    }

    /// Check that per-asset totals equal the sum of account balances
    pub fn verify_invariant(&self) -> bool {
        self.assets.iter().all(|asset| {
            let sum: u128 = self
                .balances
                .values()
                .filter_map(|assets| assets.get(asset))
                .sum();
            sum == self.total_deposited(asset)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VALUATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// USD value of `amount` of `asset`
    pub fn value_of_amount(
        &self,
        asset: &Address,
        amount: u128,
        oracle: &dyn PriceOracle,
    ) -> Result<u128> {
        self.ensure_allowed(asset)?;
        oracle.latest_price(asset)?.value_of(amount)
    }

    /// Amount of `asset` worth `usd_value`
    pub fn amount_for_usd_value(
        &self,
        asset: &Address,
        usd_value: u128,
        oracle: &dyn PriceOracle,
    ) -> Result<u128> {
        self.ensure_allowed(asset)?;
        oracle.latest_price(asset)?.amount_for(usd_value)
    }

    /// USD value of everything `account` deposited
    pub fn value_in_usd(&self, account: &Address, oracle: &dyn PriceOracle) -> Result<u128> {
        let mut total = 0u128;
        for (asset, amount) in self.balances_of(account) {
            total = safe_add(total, self.value_of_amount(&asset, amount, oracle)?)?;
        }
        Ok(total)
    }
}
