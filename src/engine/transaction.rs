//! Atomic engine transactions.
//!
//! A [`Transaction`] applies ledger changes in place and journals how to
//! undo each one. Token interactions go through it as well, so that on
//! failure the reversible ones that already completed are compensated:
//!
//! | Interaction       | Reversible | Compensation               |
//! |-------------------|------------|----------------------------|
//! | pull-in transfer  | yes        | transfer back to the payer |
//! | burn              | yes        | mint back into custody     |
//! | push-out transfer | no         | run last                   |
//! | mint              | no         | run last                   |
//!
//! Operations stage every ledger change and health check before the first
//! token interaction, and leave irreversible interactions for the end. A
//! failing irreversible interaction is then the last step, so nothing after
//! it needs undoing.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use crate::core::ledgers::Ledgers;
use crate::engine::events::EngineEvent;
use crate::error::{Error, Result};
use crate::token::{FungibleToken, MintableToken};
use crate::utils::address::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// JOURNAL
// ═══════════════════════════════════════════════════════════════════════════════

/// Value of a ledger entry before the transaction first touched it
#[derive(Debug, Clone, PartialEq, Eq)]
enum LedgerEntry {
    Collateral {
        account: Address,
        asset: Address,
        previous: Option<u128>,
    },
    Debt {
        account: Address,
        previous: Option<u128>,
    },
}

/// A token whose balances the engine moves
#[derive(Clone)]
pub enum TokenHandle {
    /// A whitelisted collateral token
    Collateral(Rc<dyn FungibleToken>),
    /// The synthetic unit
    Dsc(Rc<dyn MintableToken>),
}

impl TokenHandle {
    fn address(&self) -> Address {
        match self {
            Self::Collateral(token) => token.address(),
            Self::Dsc(token) => token.address(),
        }
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> bool {
        match self {
            Self::Collateral(token) => token.transfer(from, to, amount),
            Self::Dsc(token) => token.transfer(from, to, amount),
        }
    }

    fn transfer_from(&self, spender: &Address, from: &Address, to: &Address, amount: u128) -> bool {
        match self {
            Self::Collateral(token) => token.transfer_from(spender, from, to, amount),
            Self::Dsc(token) => token.transfer_from(spender, from, to, amount),
        }
    }
}

enum Interaction {
    PulledIn {
        token: TokenHandle,
        from: Address,
        amount: u128,
    },
    Burned {
        token: Rc<dyn MintableToken>,
        amount: u128,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// One in-flight engine operation
pub struct Transaction<'e> {
    operation: &'static str,
    engine: Address,
    ledgers: &'e RefCell<Ledgers>,
    journal: Vec<LedgerEntry>,
    interactions: Vec<Interaction>,
    events: Vec<EngineEvent>,
}

impl<'e> Transaction<'e> {
    /// Start a transaction on behalf of the engine at `engine`
    pub fn begin(operation: &'static str, engine: Address, ledgers: &'e RefCell<Ledgers>) -> Self {
        Self {
            operation,
            engine,
            ledgers,
            journal: Vec::new(),
            interactions: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Name of the operation
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Ledgers are read-borrowed while a query values collateral; a nested
    /// operation started from a price feed lands here and is refused
    fn ledgers_mut(&self) -> Result<RefMut<'e, Ledgers>> {
        self.ledgers.try_borrow_mut().map_err(|_| {
            tracing::warn!(operation = self.operation, "Ledgers busy, nested call rejected");
            Error::Reentrancy
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LEDGER CHANGES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Credit collateral to `account`
    pub fn deposit_collateral(
        &mut self,
        account: &Address,
        asset: &Address,
        amount: u128,
    ) -> Result<()> {
        let mut ledgers = self.ledgers_mut()?;
        let previous = ledgers.collateral.entry(account, asset);
        ledgers.collateral.deposit(account, asset, amount)?;
        self.journal.push(LedgerEntry::Collateral {
            account: *account,
            asset: *asset,
            previous,
        });
        Ok(())
    }

    /// Debit collateral from `account`
    pub fn withdraw_collateral(
        &mut self,
        account: &Address,
        asset: &Address,
        amount: u128,
    ) -> Result<()> {
        let mut ledgers = self.ledgers_mut()?;
        let previous = ledgers.collateral.entry(account, asset);
        ledgers.collateral.withdraw(account, asset, amount)?;
        self.journal.push(LedgerEntry::Collateral {
            account: *account,
            asset: *asset,
            previous,
        });
        Ok(())
    }

    /// Add debt to `account`
    pub fn increase_debt(&mut self, account: &Address, amount: u128) -> Result<()> {
        let mut ledgers = self.ledgers_mut()?;
        let previous = ledgers.debt.entry(account);
        ledgers.debt.increase(account, amount)?;
        self.journal.push(LedgerEntry::Debt {
            account: *account,
            previous,
        });
        Ok(())
    }

    /// Remove debt from `account`
    pub fn decrease_debt(&mut self, account: &Address, amount: u128) -> Result<()> {
        let mut ledgers = self.ledgers_mut()?;
        let previous = ledgers.debt.entry(account);
        ledgers.debt.decrease(account, amount)?;
        self.journal.push(LedgerEntry::Debt {
            account: *account,
            previous,
        });
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TOKEN INTERACTIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Pull `amount` from `from` into engine custody (reversible)
    pub fn pull_in(&mut self, token: &TokenHandle, from: &Address, amount: u128) -> Result<()> {
        if !token.transfer_from(&self.engine, from, &self.engine, amount) {
            return Err(Error::TransferFailed {
                token: token.address(),
                from: *from,
                to: self.engine,
                amount,
            });
        }
        self.interactions.push(Interaction::PulledIn {
            token: token.clone(),
            from: *from,
            amount,
        });
        Ok(())
    }

    /// Burn `amount` held in engine custody (reversible)
    pub fn burn(&mut self, token: &Rc<dyn MintableToken>, amount: u128) -> Result<()> {
        if !token.burn(&self.engine, amount) {
            return Err(Error::BurnFailed { amount });
        }
        self.interactions.push(Interaction::Burned {
            token: Rc::clone(token),
            amount,
        });
        Ok(())
    }

    /// Send `amount` from engine custody to `to` (irreversible)
    pub fn push_out(&mut self, token: &TokenHandle, to: &Address, amount: u128) -> Result<()> {
        if !token.transfer(&self.engine, to, amount) {
            return Err(Error::TransferFailed {
                token: token.address(),
                from: self.engine,
                to: *to,
                amount,
            });
        }
        Ok(())
    }

    /// Mint `amount` to `to` (irreversible)
    pub fn mint(
        &mut self,
        token: &Rc<dyn MintableToken>,
        to: &Address,
        amount: u128,
    ) -> Result<()> {
        if !token.mint(&self.engine, to, amount) {
            return Err(Error::MintFailed { to: *to, amount });
        }
        Ok(())
    }

    /// Stage an event for commit
    pub fn emit(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMPLETION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Keep all changes and hand back the staged events
    pub fn commit(self) -> Vec<EngineEvent> {
        self.events
    }

    /// Undo every ledger change, then compensate completed interactions,
    /// newest first
    pub fn rollback(self) {
        let Transaction {
            operation,
            engine,
            ledgers,
            journal,
            interactions,
            ..
        } = self;

        if !journal.is_empty() {
            let mut ledgers = ledgers.borrow_mut();
            for entry in journal.into_iter().rev() {
                match entry {
                    LedgerEntry::Collateral {
                        account,
                        asset,
                        previous,
                    } => ledgers.collateral.restore(&account, &asset, previous),
                    LedgerEntry::Debt { account, previous } => {
                        ledgers.debt.restore(&account, previous)
                    }
                }
            }
        }

        for interaction in interactions.into_iter().rev() {
            match interaction {
                Interaction::PulledIn { token, from, amount } => {
                    if !token.transfer(&engine, &from, amount) {
                        tracing::error!(
                            operation,
                            token = %token.address(),
                            to = %from,
                            amount = %amount,
                            "Refund transfer failed"
                        );
                    }
                }
                Interaction::Burned { token, amount } => {
                    if !token.mint(&engine, &engine, amount) {
                        tracing::error!(operation, amount = %amount, "Re-mint after failed burn failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collateral::CollateralLedger;
    use crate::token::InMemoryToken;

    fn setup() -> (Address, Address, Address, RefCell<Ledgers>) {
        let engine = Address::derive("engine");
        let weth = Address::derive("token:WETH");
        let alice = Address::derive("alice");
        let ledgers = RefCell::new(Ledgers::new(CollateralLedger::new(vec![weth])));
        (engine, weth, alice, ledgers)
    }

    #[test]
    fn test_rollback_restores_ledgers() {
        let (engine, weth, alice, ledgers) = setup();
        ledgers.borrow_mut().collateral.deposit(&alice, &weth, 50).unwrap();
        ledgers.borrow_mut().debt.increase(&alice, 5).unwrap();
        let bob = Address::derive("bob");
        let before = ledgers.borrow().clone();

        let mut tx = Transaction::begin("test", engine, &ledgers);
        tx.deposit_collateral(&alice, &weth, 10).unwrap();
        tx.withdraw_collateral(&alice, &weth, 30).unwrap();
        tx.increase_debt(&alice, 7).unwrap();
        tx.decrease_debt(&alice, 12).unwrap();
        tx.deposit_collateral(&bob, &weth, 3).unwrap();
        tx.increase_debt(&bob, 1).unwrap();
        tx.rollback();

        assert_eq!(*ledgers.borrow(), before);
    }

    #[test]
    fn test_commit_keeps_changes_and_events() {
        let (engine, weth, alice, ledgers) = setup();

        let mut tx = Transaction::begin("test", engine, &ledgers);
        tx.deposit_collateral(&alice, &weth, 10).unwrap();
        tx.emit(EngineEvent::CollateralDeposited {
            account: alice,
            asset: weth,
            amount: 10,
        });
        let events = tx.commit();

        assert_eq!(events.len(), 1);
        assert_eq!(ledgers.borrow().collateral.balance(&alice, &weth), 10);
    }

    #[test]
    fn test_rollback_refunds_pull_in() {
        let (engine, _, alice, ledgers) = setup();
        let weth = Rc::new(InMemoryToken::new("WETH"));
        weth.faucet(&alice, 100).unwrap();
        weth.approve(&alice, &engine, 100);
        let token = TokenHandle::Collateral(weth.clone());

        let mut tx = Transaction::begin("test", engine, &ledgers);
        tx.pull_in(&token, &alice, 60).unwrap();
        assert_eq!(weth.balance_of(&engine), 60);
        tx.rollback();

        assert_eq!(weth.balance_of(&alice), 100);
        assert_eq!(weth.balance_of(&engine), 0);
    }

    #[test]
    fn test_rollback_remints_burn() {
        let (engine, _, _, ledgers) = setup();
        let dsc = Rc::new(InMemoryToken::with_minter("DSC", engine));
        assert!(dsc.mint(&engine, &engine, 40));
        let token: Rc<dyn MintableToken> = dsc.clone();

        let mut tx = Transaction::begin("test", engine, &ledgers);
        tx.burn(&token, 40).unwrap();
        assert_eq!(dsc.total_supply(), 0);
        tx.rollback();

        assert_eq!(dsc.balance_of(&engine), 40);
        assert_eq!(dsc.total_supply(), 40);
    }

    #[test]
    fn test_failed_interactions_map_to_errors() {
        let (engine, _, alice, ledgers) = setup();
        let weth = TokenHandle::Collateral(Rc::new(InMemoryToken::new("WETH")));
        let dsc: Rc<dyn MintableToken> = Rc::new(InMemoryToken::with_minter("DSC", alice));

        let mut tx = Transaction::begin("test", engine, &ledgers);
        assert!(matches!(tx.pull_in(&weth, &alice, 1), Err(Error::TransferFailed { .. })));
        assert!(matches!(tx.push_out(&weth, &alice, 1), Err(Error::TransferFailed { .. })));
        assert_eq!(tx.mint(&dsc, &alice, 1), Err(Error::MintFailed { to: alice, amount: 1 }));
        assert_eq!(tx.burn(&dsc, 1), Err(Error::BurnFailed { amount: 1 }));
        tx.rollback();
    }
}
