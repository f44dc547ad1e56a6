//! Token collaborators.
//!
//! The engine moves collateral and the synthetic unit through these traits.
//! Calls report success as a boolean, the way external token ledgers do;
//! the engine turns a `false` into the matching error and reverts.
//!
//! - `FungibleToken`: balances, transfers and allowances
//! - `MintableToken`: supply changes, restricted to the minter
//! - `InMemoryToken`: reference implementation for tests and the simulator

pub mod memory;

pub use memory::*;

use crate::utils::address::Address;

/// A fungible token ledger
pub trait FungibleToken {
    /// Address of the token contract
    fn address(&self) -> Address;

    /// Ticker symbol
    fn symbol(&self) -> String;

    /// Total units in existence
    fn total_supply(&self) -> u128;

    /// Balance of `owner`
    fn balance_of(&self, owner: &Address) -> u128;

    /// Move `amount` from `from` to `to`, authorized by `from`
    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> bool;

    /// Move `amount` from `from` to `to` using `spender`'s allowance
    fn transfer_from(&self, spender: &Address, from: &Address, to: &Address, amount: u128)
        -> bool;

    /// Set `spender`'s allowance over `owner`'s balance
    fn approve(&self, owner: &Address, spender: &Address, amount: u128) -> bool;

    /// Remaining allowance of `spender` over `owner`'s balance
    fn allowance(&self, owner: &Address, spender: &Address) -> u128;
}

/// A token whose supply a single minter controls
pub trait MintableToken: FungibleToken {
    /// Create `amount` units for `to`; only the minter may call
    fn mint(&self, caller: &Address, to: &Address, amount: u128) -> bool;

    /// Destroy `amount` units from `caller`'s own balance; only the minter may call
    fn burn(&self, caller: &Address, amount: u128) -> bool;
}
