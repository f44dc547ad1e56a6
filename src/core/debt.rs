//! Debt ledger: synthetic units minted per account.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::utils::address::Address;
use crate::utils::math::{safe_add, safe_sub};
use crate::utils::validation::validate_non_zero;

/// Per-account minted debt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtLedger {
    debts: BTreeMap<Address, u128>,
    total: u128,
}

impl DebtLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to `account`'s debt
    pub fn increase(&mut self, account: &Address, amount: u128) -> Result<()> {
        validate_non_zero(amount)?;
        let debt = safe_add(self.balance_of(account), amount)?;
        let total = safe_add(self.total, amount)?;
        self.debts.insert(*account, debt);
        self.total = total;
        Ok(())
    }

    /// Remove `amount` from `account`'s debt; underflow is an arithmetic error
    pub fn decrease(&mut self, account: &Address, amount: u128) -> Result<()> {
        validate_non_zero(amount)?;
        let debt = safe_sub(self.balance_of(account), amount)?;
        self.debts.insert(*account, debt);
        self.total = self.total.saturating_sub(amount);
        Ok(())
    }

    /// Debt of `account`
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.debts.get(account).copied().unwrap_or(0)
    }

    /// Debt across all accounts
    pub fn total_debt(&self) -> u128 {
        self.total
    }

    /// Raw entry for `account`; `None` if never written
    pub(crate) fn entry(&self, account: &Address) -> Option<u128> {
        self.debts.get(account).copied()
    }

    /// Put an entry back to a previously read value, keeping the total in step
    pub(crate) fn restore(&mut self, account: &Address, previous: Option<u128>) {
        self.total = self.total - self.balance_of(account) + previous.unwrap_or(0);
        match previous {
            Some(amount) => {
                self.debts.insert(*account, amount);
            }
            None => {
                self.debts.remove(account);
            }
        }
    }

    /// Accounts with a ledger entry (including zeroed ones)
    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.debts.keys()
    }
}
