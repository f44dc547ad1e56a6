//! DSC engine - collateral, debt and solvency orchestration.
//!
//! Every mutating operation runs as one guarded, atomic [`Transaction`]:
//! ledger changes first, then the health checks, then the token
//! interactions. On any failure the ledgers are restored and the completed
//! reversible interactions compensated, so callers never observe a partial
//! effect.
//!
//! After every successful mutating call, the health factor of each account
//! whose position the caller touched is at or above the minimum.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::collateral::CollateralLedger;
use crate::core::config::{EngineParams, RiskParams};
use crate::core::health::{calculate_health_factor, HealthFactor};
use crate::core::ledgers::Ledgers;
use crate::engine::events::{EngineEvent, EventLog, EventRecord};
use crate::engine::guard::ReentrancyLock;
use crate::engine::transaction::{TokenHandle, Transaction};
use crate::error::{Error, Result};
use crate::oracle::price_feed::PriceFeed;
use crate::oracle::registry::{FeedRegistry, FreshnessGuard, PriceOracle};
use crate::token::{FungibleToken, MintableToken};
use crate::utils::address::Address;
use crate::utils::validation::{validate_non_zero, validate_whitelist};

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Block height and timestamp stamped on committed events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    /// Block height
    pub height: u64,
    /// Unix timestamp
    pub timestamp: u64,
}

/// An account's debt and collateral value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInformation {
    /// Synthetic units minted by the account
    pub total_dsc_minted: u128,
    /// USD value of all the account's collateral
    pub collateral_value_in_usd: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Over-collateralized debt engine
pub struct DscEngine {
    address: Address,
    dsc: Rc<dyn MintableToken>,
    collateral_tokens: BTreeMap<Address, Rc<dyn FungibleToken>>,
    feeds: FeedRegistry,
    params: RiskParams,
    ledgers: RefCell<Ledgers>,
    events: RefCell<EventLog>,
    block: Cell<BlockContext>,
    lock: ReentrancyLock,
}

impl DscEngine {
    /// Create an engine
    ///
    /// `collateral_tokens[i]` is priced by `price_feeds[i]`. The whitelist and
    /// the parameters cannot change afterwards.
    pub fn new(
        address: Address,
        collateral_tokens: Vec<Rc<dyn FungibleToken>>,
        price_feeds: Vec<Rc<dyn PriceFeed>>,
        dsc: Rc<dyn MintableToken>,
        params: RiskParams,
    ) -> Result<Self> {
        let assets: Vec<Address> = collateral_tokens.iter().map(|t| t.address()).collect();
        validate_whitelist(&assets, price_feeds.len())?;
        params.validate()?;

        let feeds = FeedRegistry::new(assets.iter().copied().zip(price_feeds));
        let collateral_tokens = assets.iter().copied().zip(collateral_tokens).collect();

        tracing::info!(
            engine = %address,
            dsc = %dsc.address(),
            assets = assets.len(),
            threshold_pct = %params.liquidation_threshold_pct,
            bonus_bps = %params.liquidation_bonus_bps,
            "DSC engine created"
        );

        Ok(Self {
            address,
            dsc,
            collateral_tokens,
            feeds,
            params,
            ledgers: RefCell::new(Ledgers::new(CollateralLedger::new(assets))),
            events: RefCell::new(EventLog::new()),
            block: Cell::new(BlockContext::default()),
            lock: ReentrancyLock::new(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BLOCK PROCESSING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Begin a new block; also the clock for the optional staleness check
    pub fn begin_block(&self, height: u64, timestamp: u64) {
        self.block.set(BlockContext { height, timestamp });
    }

    /// Current block context
    pub fn block(&self) -> BlockContext {
        self.block.get()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COLLATERAL OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit `amount` of `asset` from `caller` as collateral
    ///
    /// The engine pulls the tokens with `transfer_from`, so `caller` must
    /// have approved the engine first.
    pub fn deposit_collateral(
        &self,
        caller: &Address,
        asset: &Address,
        amount: u128,
    ) -> Result<()> {
        self.execute("deposit_collateral", |tx| {
            validate_non_zero(amount)?;
            let token = self.collateral_token(asset)?;

            tx.deposit_collateral(caller, asset, amount)?;
            self.revert_if_health_factor_is_broken(caller)?;

            tx.pull_in(&token, caller, amount)?;
            tx.emit(EngineEvent::CollateralDeposited {
                account: *caller,
                asset: *asset,
                amount,
            });
            Ok(())
        })?;

        tracing::info!(account = %caller, asset = %asset, amount = %amount, "Collateral deposited");
        Ok(())
    }

    /// Return `amount` of `caller`'s `asset` collateral to `caller`
    pub fn redeem_collateral(&self, caller: &Address, asset: &Address, amount: u128) -> Result<()> {
        let health_factor = self.execute("redeem_collateral", |tx| {
            validate_non_zero(amount)?;
            let token = self.collateral_token(asset)?;

            tx.withdraw_collateral(caller, asset, amount)?;
            let health_factor = self.revert_if_health_factor_is_broken(caller)?;

            tx.push_out(&token, caller, amount)?;
            tx.emit(EngineEvent::CollateralRedeemed {
                from: *caller,
                to: *caller,
                asset: *asset,
                amount,
            });
            Ok(health_factor)
        })?;

        tracing::info!(
            account = %caller,
            asset = %asset,
            amount = %amount,
            health_factor = %health_factor,
            "Collateral redeemed"
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEBT OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Mint `amount` synthetic units to `caller` against their collateral
    pub fn mint_dsc(&self, caller: &Address, amount: u128) -> Result<()> {
        let health_factor = self.execute("mint_dsc", |tx| {
            validate_non_zero(amount)?;

            tx.increase_debt(caller, amount)?;
            let health_factor = self.revert_if_health_factor_is_broken(caller)?;

            tx.mint(&self.dsc, caller, amount)?;
            tx.emit(EngineEvent::DscMinted {
                account: *caller,
                amount,
            });
            Ok(health_factor)
        })?;

        tracing::info!(
            account = %caller,
            amount = %amount,
            health_factor = %health_factor,
            "DSC minted"
        );
        Ok(())
    }

    /// Repay `amount` of `caller`'s debt with `caller`'s synthetic units
    ///
    /// The engine pulls the units with `transfer_from` and burns them, so
    /// `caller` must have approved the engine first.
    pub fn burn_dsc(&self, caller: &Address, amount: u128) -> Result<()> {
        self.execute("burn_dsc", |tx| {
            validate_non_zero(amount)?;

            tx.decrease_debt(caller, amount)?;
            self.revert_if_health_factor_is_broken(caller)?;

            self.settle_burn(tx, caller, amount)?;
            tx.emit(EngineEvent::DscBurned {
                on_behalf_of: *caller,
                payer: *caller,
                amount,
            });
            Ok(())
        })?;

        tracing::info!(account = %caller, amount = %amount, "DSC burned");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMPOSED OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit collateral and mint against it in one atomic step
    pub fn deposit_collateral_and_mint_dsc(
        &self,
        caller: &Address,
        asset: &Address,
        collateral_amount: u128,
        dsc_amount: u128,
    ) -> Result<()> {
        let health_factor = self.execute("deposit_collateral_and_mint_dsc", |tx| {
            validate_non_zero(collateral_amount)?;
            validate_non_zero(dsc_amount)?;
            let token = self.collateral_token(asset)?;

            tx.deposit_collateral(caller, asset, collateral_amount)?;
            tx.increase_debt(caller, dsc_amount)?;
            let health_factor = self.revert_if_health_factor_is_broken(caller)?;

            tx.pull_in(&token, caller, collateral_amount)?;
            tx.mint(&self.dsc, caller, dsc_amount)?;

            tx.emit(EngineEvent::CollateralDeposited {
                account: *caller,
                asset: *asset,
                amount: collateral_amount,
            });
            tx.emit(EngineEvent::DscMinted {
                account: *caller,
                amount: dsc_amount,
            });
            Ok(health_factor)
        })?;

        tracing::info!(
            account = %caller,
            asset = %asset,
            collateral = %collateral_amount,
            dsc = %dsc_amount,
            health_factor = %health_factor,
            "Collateral deposited and DSC minted"
        );
        Ok(())
    }

    /// Burn synthetic units and redeem collateral in one atomic step
    pub fn redeem_collateral_for_dsc(
        &self,
        caller: &Address,
        asset: &Address,
        collateral_amount: u128,
        dsc_to_burn: u128,
    ) -> Result<()> {
        let health_factor = self.execute("redeem_collateral_for_dsc", |tx| {
            validate_non_zero(collateral_amount)?;
            validate_non_zero(dsc_to_burn)?;
            let token = self.collateral_token(asset)?;

            tx.decrease_debt(caller, dsc_to_burn)?;
            tx.withdraw_collateral(caller, asset, collateral_amount)?;
            let health_factor = self.revert_if_health_factor_is_broken(caller)?;

            self.settle_burn(tx, caller, dsc_to_burn)?;
            tx.push_out(&token, caller, collateral_amount)?;

            tx.emit(EngineEvent::DscBurned {
                on_behalf_of: *caller,
                payer: *caller,
                amount: dsc_to_burn,
            });
            tx.emit(EngineEvent::CollateralRedeemed {
                from: *caller,
                to: *caller,
                asset: *asset,
                amount: collateral_amount,
            });
            Ok(health_factor)
        })?;

        tracing::info!(
            account = %caller,
            asset = %asset,
            collateral = %collateral_amount,
            dsc = %dsc_to_burn,
            health_factor = %health_factor,
            "DSC burned and collateral redeemed"
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Debt and collateral value of `account`
    pub fn get_account_information(&self, account: &Address) -> Result<AccountInformation> {
        let total_dsc_minted = self.ledgers.borrow().debt.balance_of(account);
        let collateral_value_in_usd = self.get_account_collateral_value(account)?;
        Ok(AccountInformation {
            total_dsc_minted,
            collateral_value_in_usd,
        })
    }

    /// USD value of all of `account`'s collateral
    pub fn get_account_collateral_value(&self, account: &Address) -> Result<u128> {
        self.with_oracle(|oracle| self.ledgers.borrow().collateral.value_in_usd(account, oracle))
    }

    /// Current health factor of `account`
    pub fn get_health_factor(&self, account: &Address) -> Result<HealthFactor> {
        let info = self.get_account_information(account)?;
        self.calculate_health_factor(info.total_dsc_minted, info.collateral_value_in_usd)
    }

    /// Health factor for an arbitrary debt and collateral value
    pub fn calculate_health_factor(
        &self,
        total_dsc_minted: u128,
        collateral_value_in_usd: u128,
    ) -> Result<HealthFactor> {
        calculate_health_factor(
            total_dsc_minted,
            collateral_value_in_usd,
            self.params.liquidation_threshold_pct,
        )
    }

    /// Amount of `asset` deposited by `account`
    pub fn get_collateral_balance(&self, account: &Address, asset: &Address) -> u128 {
        self.ledgers.borrow().collateral.balance(account, asset)
    }

    /// Whitelisted collateral assets, in configuration order
    pub fn get_collateral_tokens(&self) -> Vec<Address> {
        self.ledgers.borrow().collateral.assets().to_vec()
    }

    /// USD value of `amount` of `asset`
    pub fn get_usd_value(&self, asset: &Address, amount: u128) -> Result<u128> {
        self.with_oracle(|oracle| {
            self.ledgers
                .borrow()
                .collateral
                .value_of_amount(asset, amount, oracle)
        })
    }

    /// Amount of `asset` worth `usd_amount`
    pub fn get_token_amount_from_usd(&self, asset: &Address, usd_amount: u128) -> Result<u128> {
        self.with_oracle(|oracle| {
            self.ledgers
                .borrow()
                .collateral
                .amount_for_usd_value(asset, usd_amount, oracle)
        })
    }

    /// Price feed of a whitelisted asset
    pub fn get_collateral_token_price_feed(&self, asset: &Address) -> Option<Rc<dyn PriceFeed>> {
        self.feeds.feed(asset).cloned()
    }

    /// Debt across all accounts
    pub fn total_debt(&self) -> u128 {
        self.ledgers.borrow().debt.total_debt()
    }

    /// The synthetic unit token
    pub fn dsc(&self) -> Rc<dyn MintableToken> {
        Rc::clone(&self.dsc)
    }

    /// The engine's own address (custody account and minter)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Constants of the engine's math
    pub fn params(&self) -> EngineParams {
        EngineParams::from(&self.params)
    }

    /// Risk parameters the engine was created with
    pub fn risk_params(&self) -> &RiskParams {
        &self.params
    }

    /// Retained committed events, oldest first
    pub fn recent_events(&self) -> Vec<EventRecord> {
        self.events.borrow().records().cloned().collect()
    }

    /// Remove and return retained committed events
    pub fn drain_events(&self) -> Vec<EventRecord> {
        self.events.borrow_mut().drain()
    }

    /// Copy of the ledgers
    pub fn snapshot(&self) -> Ledgers {
        self.ledgers.borrow().clone()
    }

    /// SHA-256 over the serialized ledgers
    pub fn state_hash(&self) -> Result<[u8; 32]> {
        self.ledgers.borrow().state_hash()
    }

    /// Hex-encoded [`Self::state_hash`]
    pub fn state_hash_hex(&self) -> Result<String> {
        self.ledgers.borrow().state_hash_hex()
    }

    /// Number of mutating operations that entered the engine
    pub fn operation_count(&self) -> u64 {
        self.lock.operation_count()
    }

    /// Number of nested calls turned away by the reentrancy lock
    pub fn rejected_reentry_count(&self) -> u64 {
        self.lock.rejected_count()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run `body` as one guarded transaction
    pub(crate) fn execute<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce(&mut Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let _guard = self.lock.enter(operation)?;
        let mut tx = Transaction::begin(operation, self.address, &self.ledgers);

        match body(&mut tx) {
            Ok(value) => {
                let block = self.block.get();
                let mut log = self.events.borrow_mut();
                for event in tx.commit() {
                    log.push(EventRecord {
                        block_height: block.height,
                        timestamp: block.timestamp,
                        event,
                    });
                }
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(operation, code = e.code(), error = %e, "Operation reverted");
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Fail with `HealthFactorBroken` if `account` is below the minimum
    pub(crate) fn revert_if_health_factor_is_broken(
        &self,
        account: &Address,
    ) -> Result<HealthFactor> {
        let health_factor = self.get_health_factor(account)?;
        let minimum = self.params.min_health_factor();
        tracing::debug!(
            account = %account,
            health_factor = %health_factor,
            minimum = %minimum,
            "Health check"
        );
        if !health_factor.is_healthy(minimum) {
            return Err(Error::HealthFactorBroken { health_factor });
        }
        Ok(health_factor)
    }

    /// Pull `amount` synthetic units from `payer` and burn them
    pub(crate) fn settle_burn(
        &self,
        tx: &mut Transaction<'_>,
        payer: &Address,
        amount: u128,
    ) -> Result<()> {
        tx.pull_in(&TokenHandle::Dsc(Rc::clone(&self.dsc)), payer, amount)?;
        tx.burn(&self.dsc, amount)
    }

    pub(crate) fn collateral_token(&self, asset: &Address) -> Result<TokenHandle> {
        self.collateral_tokens
            .get(asset)
            .map(|token| TokenHandle::Collateral(Rc::clone(token)))
            .ok_or(Error::AssetNotAllowed(*asset))
    }

    fn with_oracle<T>(&self, f: impl FnOnce(&dyn PriceOracle) -> Result<T>) -> Result<T> {
        match self.params.max_price_age_secs {
            Some(max_age) => {
                let guard = FreshnessGuard::new(&self.feeds, self.block.get().timestamp, max_age);
                f(&guard)
            }
            None => f(&self.feeds),
        }
    }
}

impl fmt::Debug for DscEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DscEngine")
            .field("address", &self.address)
            .field("dsc", &self.dsc.address())
            .field("feeds", &self.feeds)
            .field("params", &self.params)
            .field("block", &self.block.get())
            .finish()
    }
}
