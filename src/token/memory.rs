//! In-memory token ledger.
//!
//! Used for collateral tokens and for the synthetic unit in tests and the
//! simulator. Balances live behind a `RefCell` so the token can be shared by
//! `Rc` between the engine and the accounts that hold it.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::token::{FungibleToken, MintableToken};
use crate::utils::address::Address;
use crate::utils::constants::DSC_DECIMALS;
use crate::utils::math::{format_units, safe_add};

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Balances, allowances and supply of one token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenState {
    /// Total supply
    pub total_supply: u128,
    /// Balances by owner
    pub balances: BTreeMap<Address, u128>,
    /// Allowances by (owner, spender)
    pub allowances: BTreeMap<(Address, Address), u128>,
}

impl TokenState {
    fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    fn credit(&mut self, owner: &Address, amount: u128) -> Result<()> {
        let balance = safe_add(self.balance_of(owner), amount)?;
        self.balances.insert(*owner, balance);
        Ok(())
    }

    fn debit(&mut self, owner: &Address, amount: u128) -> Result<()> {
        let available = self.balance_of(owner);
        let balance = available.checked_sub(amount).ok_or(Error::InsufficientBalance {
            required: amount,
            available,
        })?;
        if balance == 0 {
            self.balances.remove(owner);
        } else {
            self.balances.insert(*owner, balance);
        }
        Ok(())
    }

    fn move_balance(&mut self, from: &Address, to: &Address, amount: u128) -> Result<()> {
        if from == to {
            if self.balance_of(from) < amount {
                return Err(Error::InsufficientBalance {
                    required: amount,
                    available: self.balance_of(from),
                });
            }
            return Ok(());
        }
        self.debit(from, amount)?;
        self.credit(to, amount)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// Token ledger kept in memory
#[derive(Debug)]
pub struct InMemoryToken {
    address: Address,
    symbol: String,
    decimals: u8,
    minter: Option<Address>,
    paused: Cell<bool>,
    state: RefCell<TokenState>,
}

impl InMemoryToken {
    /// Create a token without a minter (collateral tokens)
    pub fn new(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            address: Address::derive(&format!("token:{}", symbol)),
            symbol,
            decimals: DSC_DECIMALS,
            minter: None,
            paused: Cell::new(false),
            state: RefCell::new(TokenState::default()),
        }
    }

    /// Create a token whose supply only `minter` may change
    pub fn with_minter(symbol: impl Into<String>, minter: Address) -> Self {
        Self {
            minter: Some(minter),
            ..Self::new(symbol)
        }
    }

    /// Decimals of the token
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// The configured minter
    pub fn minter(&self) -> Option<Address> {
        self.minter
    }

    /// Credit `amount` to `to` out of thin air (test and simulator funding)
    pub fn faucet(&self, to: &Address, amount: u128) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let supply = safe_add(state.total_supply, amount)?;
        state.credit(to, amount)?;
        state.total_supply = supply;
        Ok(())
    }

    /// Make every state-changing call fail until resumed
    pub fn pause(&self) {
        self.paused.set(true);
    }

    /// Undo [`pause`](Self::pause)
    pub fn resume(&self) {
        self.paused.set(false);
    }

    /// True while paused
    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }

    /// Copy of the full token state
    pub fn snapshot(&self) -> TokenState {
        self.state.borrow().clone()
    }

    /// Verify total supply equals the sum of balances
    pub fn verify_supply_invariant(&self) -> bool {
        let state = self.state.borrow();
        let sum: u128 = state.balances.values().sum();
        sum == state.total_supply
    }

    /// Balance formatted with the token's decimals
    pub fn format_balance(&self, owner: &Address) -> String {
        format!(
            "{} {}",
            format_units(self.balance_of(owner), self.decimals),
            self.symbol
        )
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    fn ensure_active(&self) -> Result<()> {
        if self.paused.get() {
            return Err(Error::Internal(format!("{} is paused", self.symbol)));
        }
        Ok(())
    }

    fn ensure_minter(&self, caller: &Address) -> Result<()> {
        match self.minter {
            Some(minter) if minter == *caller => Ok(()),
            _ => Err(Error::InvalidParameter {
                name: "caller".into(),
                reason: format!("{} is not the minter of {}", caller, self.symbol),
            }),
        }
    }

    fn try_transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()> {
        self.ensure_active()?;
        let mut state = self.state.borrow_mut();
        let allowance = state.allowance(from, spender);
        if spender != from && allowance < amount {
            return Err(Error::InsufficientBalance {
                required: amount,
                available: allowance,
            });
        }
        state.move_balance(from, to, amount)?;
        if spender != from {
            state.allowances.insert((*from, *spender), allowance - amount);
        }
        Ok(())
    }

    fn try_mint(&self, caller: &Address, to: &Address, amount: u128) -> Result<()> {
        self.ensure_active()?;
        self.ensure_minter(caller)?;
        let mut state = self.state.borrow_mut();
        let supply = safe_add(state.total_supply, amount)?;
        state.credit(to, amount)?;
        state.total_supply = supply;
        Ok(())
    }

    fn try_burn(&self, caller: &Address, amount: u128) -> Result<()> {
        self.ensure_active()?;
        self.ensure_minter(caller)?;
        let mut state = self.state.borrow_mut();
        state.debit(caller, amount)?;
        state.total_supply = state.total_supply.saturating_sub(amount);
        Ok(())
    }

    fn report(&self, operation: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(token = %self.symbol, operation, error = %e, "Token call rejected");
                false
            }
        }
    }
}

impl FungibleToken for InMemoryToken {
    fn address(&self) -> Address {
        self.address
    }

    fn symbol(&self) -> String {
        self.symbol.clone()
    }

    fn total_supply(&self) -> u128 {
        self.state.borrow().total_supply
    }

    fn balance_of(&self, owner: &Address) -> u128 {
        self.state.borrow().balance_of(owner)
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> bool {
        let result = self
            .ensure_active()
            .and_then(|_| self.state.borrow_mut().move_balance(from, to, amount));
        self.report("transfer", result)
    }

    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> bool {
        let result = self.try_transfer_from(spender, from, to, amount);
        self.report("transfer_from", result)
    }

    fn approve(&self, owner: &Address, spender: &Address, amount: u128) -> bool {
        let result = self.ensure_active().map(|_| {
            self.state
                .borrow_mut()
                .allowances
                .insert((*owner, *spender), amount);
        });
        self.report("approve", result)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.state.borrow().allowance(owner, spender)
    }
}

impl MintableToken for InMemoryToken {
    fn mint(&self, caller: &Address, to: &Address, amount: u128) -> bool {
        let result = self.try_mint(caller, to, amount);
        self.report("mint", result)
    }

    fn burn(&self, caller: &Address, amount: u128) -> bool {
        let result = self.try_burn(caller, amount);
        self.report("burn", result)
    }
}
