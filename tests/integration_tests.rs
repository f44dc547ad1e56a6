//! Integration tests for the DSC engine.
//!
//! These tests drive the engine through its public API with in-memory
//! tokens and manual price feeds, including hostile token collaborators.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use dsc_engine::prelude::*;
use dsc_engine::utils::math::format_wad;

const WAD: u128 = PRECISION;

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

struct World {
    engine: DscEngine,
    weth: Rc<InMemoryToken>,
    wbtc: Rc<InMemoryToken>,
    dsc: Rc<InMemoryToken>,
    eth_usd: Rc<ManualPriceFeed>,
}

impl World {
    fn new() -> Self {
        Self::with_params(RiskParams::default())
    }

    fn with_params(params: RiskParams) -> Self {
        let address = Address::derive("engine");
        let weth = Rc::new(InMemoryToken::new("WETH"));
        let wbtc = Rc::new(InMemoryToken::new("WBTC"));
        let dsc = Rc::new(InMemoryToken::with_minter("DSC", address));
        let eth_usd = Rc::new(ManualPriceFeed::with_price("ETH / USD", 8, 2_000_00000000, 0));
        let btc_usd = Rc::new(ManualPriceFeed::with_price("BTC / USD", 8, 30_000_00000000, 0));

        let engine = DscEngine::new(
            address,
            vec![
                weth.clone() as Rc<dyn FungibleToken>,
                wbtc.clone() as Rc<dyn FungibleToken>,
            ],
            vec![
                eth_usd.clone() as Rc<dyn PriceFeed>,
                btc_usd as Rc<dyn PriceFeed>,
            ],
            dsc.clone(),
            params,
        )
        .unwrap();

        Self {
            engine,
            weth,
            wbtc,
            dsc,
            eth_usd,
        }
    }

    /// Fund `label` with WETH and approve the engine on every token
    fn user(&self, label: &str, weth: u128) -> Address {
        let account = Address::derive(label);
        let engine = self.engine.address();
        self.weth.faucet(&account, weth).unwrap();
        self.weth.approve(&account, &engine, u128::MAX);
        self.wbtc.approve(&account, &engine, u128::MAX);
        self.dsc.approve(&account, &engine, u128::MAX);
        account
    }

    fn open(&self, label: &str, weth: u128, dsc: u128) -> Address {
        let account = self.user(label, weth);
        self.engine
            .deposit_collateral_and_mint_dsc(&account, &self.weth.address(), weth, dsc)
            .unwrap();
        account
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUATION SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_fifteen_eth_is_worth_thirty_thousand() {
    let w = World::new();
    assert_eq!(
        w.engine.get_usd_value(&w.weth.address(), 15 * WAD).unwrap(),
        30_000 * WAD
    );

    let alice = w.user("alice", 15 * WAD);
    w.engine
        .deposit_collateral(&alice, &w.weth.address(), 15 * WAD)
        .unwrap();
    assert_eq!(w.engine.get_account_collateral_value(&alice).unwrap(), 30_000 * WAD);
}

#[test]
fn test_usd_to_token_round_trip() {
    let w = World::new();
    let amount = w
        .engine
        .get_token_amount_from_usd(&w.weth.address(), 100 * WAD)
        .unwrap();
    assert_eq!(amount, WAD / 20);
    assert_eq!(w.engine.get_usd_value(&w.weth.address(), amount).unwrap(), 100 * WAD);
}

#[test]
fn test_multi_collateral_health() {
    let w = World::new();
    let alice = w.user("alice", 10 * WAD);
    w.wbtc.faucet(&alice, WAD).unwrap();

    w.engine.deposit_collateral(&alice, &w.weth.address(), 10 * WAD).unwrap();
    w.engine.deposit_collateral(&alice, &w.wbtc.address(), WAD).unwrap();
    assert_eq!(w.engine.get_account_collateral_value(&alice).unwrap(), 50_000 * WAD);

    w.engine.mint_dsc(&alice, 25_000 * WAD).unwrap();
    assert_eq!(w.engine.get_health_factor(&alice).unwrap(), HealthFactor::ONE);
    assert!(matches!(
        w.engine.mint_dsc(&alice, 1),
        Err(Error::HealthFactorBroken { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════════════════
// MINT BOUNDARY
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_mint_at_boundary() {
    let w = World::new();
    let alice = w.open("alice", 10 * WAD, 10_000 * WAD);
    assert_eq!(w.engine.get_health_factor(&alice).unwrap(), HealthFactor::ONE);

    let before = w.engine.snapshot();
    let err = w.engine.mint_dsc(&alice, 1).unwrap_err();
    assert_eq!(
        err,
        Error::HealthFactorBroken {
            health_factor: HealthFactor::from_raw(999_999_999_999_999_999)
        }
    );
    assert_eq!(w.engine.snapshot(), before);
    assert_eq!(w.dsc.balance_of(&alice), 10_000 * WAD);
}

#[test]
fn test_first_mint_above_boundary_reverts_whole_composition() {
    let w = World::new();
    let alice = w.user("alice", 10 * WAD);

    let err = w
        .engine
        .deposit_collateral_and_mint_dsc(&alice, &w.weth.address(), 10 * WAD, 10_001 * WAD)
        .unwrap_err();
    assert!(matches!(err, Error::HealthFactorBroken { .. }));
    assert_eq!(w.weth.balance_of(&alice), 10 * WAD);
    assert_eq!(w.engine.get_collateral_balance(&alice, &w.weth.address()), 0);
    assert_eq!(w.dsc.total_supply(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_liquidation_after_price_drop() {
    let w = World::new();
    let alice = w.open("alice", 10 * WAD, 10_000 * WAD);
    let bob = w.open("bob", 20 * WAD, 1_000 * WAD);

    w.eth_usd.set_price(1_800_00000000, 10).unwrap();
    let expected_seize = w
        .engine
        .get_token_amount_from_usd(&w.weth.address(), 1_000 * WAD)
        .unwrap();
    let expected_total = expected_seize + expected_seize / 10;

    let outcome = w
        .engine
        .liquidate(&bob, &w.weth.address(), &alice, 1_000 * WAD)
        .unwrap();

    assert_eq!(outcome.quote.total_collateral, expected_total);
    assert_eq!(w.weth.balance_of(&bob), expected_total);
    assert_eq!(
        w.engine.get_account_information(&alice).unwrap().total_dsc_minted,
        9_000 * WAD
    );
    assert_eq!(
        w.engine.get_collateral_balance(&alice, &w.weth.address()),
        10 * WAD - expected_total
    );
    assert!(outcome.ending_health_factor > outcome.quote.starting_health_factor);
    assert_eq!(format_wad(outcome.quote.starting_health_factor.raw()), "0.9");

    let liquidations: Vec<_> = w
        .engine
        .recent_events()
        .into_iter()
        .filter(|r| r.event.event_type() == "Liquidated")
        .collect();
    assert_eq!(liquidations.len(), 1);
    assert!(liquidations[0].event.involves(&alice));
    assert!(liquidations[0].event.involves(&bob));
}

#[test]
fn test_deep_underwater_liquidation_does_not_improve() {
    let w = World::new();
    let alice = w.open("alice", 10 * WAD, 10_000 * WAD);
    let bob = w.open("bob", 20 * WAD, 1_000 * WAD);

    w.eth_usd.set_price(1_000_00000000, 10).unwrap();
    let before = w.engine.snapshot();

    let err = w
        .engine
        .liquidate(&bob, &w.weth.address(), &alice, 1_000 * WAD)
        .unwrap_err();
    assert!(matches!(err, Error::HealthFactorNotImproved { .. }));
    assert_eq!(w.engine.snapshot(), before);
    assert_eq!(w.dsc.balance_of(&bob), 1_000 * WAD);
}

#[test]
fn test_healthy_account_cannot_be_liquidated() {
    let w = World::new();
    let alice = w.open("alice", 10 * WAD, 5_000 * WAD);
    let bob = w.open("bob", 20 * WAD, 1_000 * WAD);
    let before = w.engine.snapshot();

    let err = w
        .engine
        .liquidate(&bob, &w.weth.address(), &alice, 100 * WAD)
        .unwrap_err();
    assert_eq!(err.kind(), dsc_engine::error::ErrorKind::Precondition);
    assert_eq!(w.engine.snapshot(), before);
    assert_eq!(w.weth.balance_of(&bob), 0);
    assert_eq!(w.dsc.balance_of(&bob), 1_000 * WAD);
    assert_eq!(w.dsc.balance_of(&alice), 5_000 * WAD);
}

#[test]
fn test_oversized_liquidation_is_rejected() {
    let w = World::new();
    let alice = w.open("alice", 10 * WAD, 10_000 * WAD);
    let bob = w.open("bob", 100 * WAD, 10_000 * WAD);

    // Covering all debt at $1000 needs 10 ETH plus a 1 ETH bonus
    w.eth_usd.set_price(1_000_00000000, 10).unwrap();
    let err = w
        .engine
        .liquidate(&bob, &w.weth.address(), &alice, 10_000 * WAD)
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATOMICITY
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_full_lifecycle() {
    let w = World::new();
    let alice = w.open("alice", 10 * WAD, 5_000 * WAD);

    w.engine.burn_dsc(&alice, 1_000 * WAD).unwrap();
    w.engine
        .redeem_collateral_for_dsc(&alice, &w.weth.address(), 2 * WAD, 1_000 * WAD)
        .unwrap();
    w.engine.burn_dsc(&alice, 3_000 * WAD).unwrap();
    w.engine
        .redeem_collateral(&alice, &w.weth.address(), 8 * WAD)
        .unwrap();

    assert_eq!(w.weth.balance_of(&alice), 10 * WAD);
    assert_eq!(w.dsc.balance_of(&alice), 0);
    assert_eq!(w.dsc.total_supply(), 0);
    assert_eq!(w.engine.total_debt(), 0);
    assert_eq!(w.engine.get_health_factor(&alice).unwrap(), HealthFactor::MAX);

    let events = w.engine.drain_events();
    let count = |kind: &str| events.iter().filter(|r| r.event.event_type() == kind).count();
    assert_eq!(count("CollateralDeposited"), 1);
    assert_eq!(count("DscMinted"), 1);
    assert_eq!(count("DscBurned"), 3);
    assert_eq!(count("CollateralRedeemed"), 2);
}

#[test]
fn test_missing_allowance_leaves_no_trace() {
    let w = World::new();
    let alice = w.open("alice", 10 * WAD, 1_000 * WAD);
    w.dsc.approve(&alice, &w.engine.address(), 0);
    let before = w.engine.snapshot();
    let events = w.engine.recent_events().len();

    let err = w.engine.burn_dsc(&alice, 500 * WAD).unwrap_err();
    assert!(matches!(err, Error::TransferFailed { .. }));
    assert_eq!(w.engine.snapshot(), before);
    assert_eq!(w.dsc.balance_of(&alice), 1_000 * WAD);
    assert_eq!(w.engine.recent_events().len(), events);
}

#[test]
fn test_paused_collateral_refunds_burn() {
    let w = World::new();
    let alice = w.open("alice", 10 * WAD, 1_000 * WAD);
    let hash = w.engine.state_hash().unwrap();

    w.weth.pause();
    let err = w
        .engine
        .redeem_collateral_for_dsc(&alice, &w.weth.address(), WAD, 500 * WAD)
        .unwrap_err();
    w.weth.resume();

    assert!(matches!(err, Error::TransferFailed { .. }));
    assert_eq!(w.engine.state_hash().unwrap(), hash);
    assert_eq!(w.dsc.balance_of(&alice), 1_000 * WAD);
    assert_eq!(w.dsc.total_supply(), 1_000 * WAD);
    assert!(w.dsc.verify_supply_invariant());
}

#[test]
fn test_snapshot_survives_serialization() {
    let w = World::new();
    w.open("alice", 10 * WAD, 1_000 * WAD);
    w.open("bob", 3 * WAD, 2_000 * WAD);

    let snapshot = w.engine.snapshot();
    let bytes = snapshot.to_bytes().unwrap();
    let restored = Ledgers::from_bytes(&bytes).unwrap();

    assert_eq!(restored, snapshot);
    assert_eq!(restored.state_hash().unwrap(), w.engine.state_hash().unwrap());
    assert!(restored.collateral.verify_invariant());
    assert_eq!(restored.debt.total_debt(), 3_000 * WAD);
}

#[test]
fn test_stale_price_rejected_when_enabled() {
    let w = World::with_params(RiskParams::default().with_max_price_age(3_600));
    let alice = w.user("alice", 10 * WAD);

    w.engine.begin_block(1, 100);
    w.engine
        .deposit_collateral_and_mint_dsc(&alice, &w.weth.address(), 10 * WAD, 1_000 * WAD)
        .unwrap();

    w.engine.begin_block(2, 10_000);
    assert!(matches!(
        w.engine.mint_dsc(&alice, WAD),
        Err(Error::StalePrice { max_age: 3_600, .. })
    ));

    w.eth_usd.set_price(2_000_00000000, 9_999).unwrap();
    w.engine.mint_dsc(&alice, WAD).unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// REENTRANCY
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral token that calls back into the engine from `transfer_from`
struct ReentrantToken {
    inner: InMemoryToken,
    engine: RefCell<Weak<DscEngine>>,
    attempts: RefCell<Vec<Error>>,
    fail_after_reentry: bool,
}

impl ReentrantToken {
    fn new(fail_after_reentry: bool) -> Self {
        Self {
            inner: InMemoryToken::new("EVIL"),
            engine: RefCell::new(Weak::new()),
            attempts: RefCell::new(Vec::new()),
            fail_after_reentry,
        }
    }
}

impl FungibleToken for ReentrantToken {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn symbol(&self) -> String {
        self.inner.symbol()
    }

    fn total_supply(&self) -> u128 {
        self.inner.total_supply()
    }

    fn balance_of(&self, owner: &Address) -> u128 {
        self.inner.balance_of(owner)
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> bool {
        self.inner.transfer(from, to, amount)
    }

    fn transfer_from(&self, spender: &Address, from: &Address, to: &Address, amount: u128) -> bool {
        let engine = self.engine.borrow().upgrade();
        if let Some(engine) = engine {
            let nested = engine.deposit_collateral(from, &self.address(), amount);
            if let Err(e) = nested {
                self.attempts.borrow_mut().push(e);
            }
        }
        if self.fail_after_reentry {
            return false;
        }
        self.inner.transfer_from(spender, from, to, amount)
    }

    fn approve(&self, owner: &Address, spender: &Address, amount: u128) -> bool {
        self.inner.approve(owner, spender, amount)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.inner.allowance(owner, spender)
    }
}

fn reentrant_world(fail_after_reentry: bool) -> (Rc<DscEngine>, Rc<ReentrantToken>, Address) {
    let address = Address::derive("engine");
    let evil = Rc::new(ReentrantToken::new(fail_after_reentry));
    let feed = Rc::new(ManualPriceFeed::with_price("EVIL / USD", 8, 1_00000000, 0));
    let dsc = Rc::new(InMemoryToken::with_minter("DSC", address));

    let engine = Rc::new(
        DscEngine::new(
            address,
            vec![evil.clone() as Rc<dyn FungibleToken>],
            vec![feed as Rc<dyn PriceFeed>],
            dsc,
            RiskParams::default(),
        )
        .unwrap(),
    );
    *evil.engine.borrow_mut() = Rc::downgrade(&engine);

    let mallory = Address::derive("mallory");
    evil.inner.faucet(&mallory, 100 * WAD).unwrap();
    evil.approve(&mallory, &address, u128::MAX);
    (engine, evil, mallory)
}

#[test]
fn test_reentrant_call_is_rejected() {
    let (engine, evil, mallory) = reentrant_world(false);

    engine
        .deposit_collateral(&mallory, &evil.address(), 10 * WAD)
        .unwrap();

    assert_eq!(evil.attempts.borrow().as_slice(), &[Error::Reentrancy]);
    assert_eq!(engine.rejected_reentry_count(), 1);
    assert_eq!(engine.operation_count(), 1);
    assert_eq!(engine.get_collateral_balance(&mallory, &evil.address()), 10 * WAD);
    assert_eq!(evil.balance_of(&engine.address()), 10 * WAD);
    assert_eq!(engine.recent_events().len(), 1);
}

#[test]
fn test_reentrant_token_failure_rolls_back() {
    let (engine, evil, mallory) = reentrant_world(true);
    let before = engine.snapshot();

    let err = engine
        .deposit_collateral(&mallory, &evil.address(), 10 * WAD)
        .unwrap_err();

    assert!(matches!(err, Error::TransferFailed { .. }));
    assert_eq!(evil.attempts.borrow().as_slice(), &[Error::Reentrancy]);
    assert_eq!(engine.snapshot(), before);
    assert_eq!(evil.balance_of(&mallory), 100 * WAD);
    assert!(engine.recent_events().is_empty());

    // The lock is released after the failed call
    *evil.engine.borrow_mut() = Weak::new();
    assert!(matches!(
        engine.deposit_collateral(&mallory, &evil.address(), WAD),
        Err(Error::TransferFailed { .. })
    ));
    assert_eq!(engine.operation_count(), 2);
    assert_eq!(engine.rejected_reentry_count(), 1);
}

/// Price feed that tries to deposit on `account`'s behalf whenever it is read
struct ReentrantFeed {
    inner: ManualPriceFeed,
    engine: RefCell<Weak<DscEngine>>,
    target: RefCell<Option<(Address, Address)>>,
    attempts: RefCell<Vec<Error>>,
}

impl PriceFeed for ReentrantFeed {
    fn description(&self) -> String {
        self.inner.description()
    }

    fn latest_price(&self) -> Result<PriceData> {
        let engine = self.engine.borrow().upgrade();
        let target = *self.target.borrow();
        if let (Some(engine), Some((account, asset))) = (engine, target) {
            if let Err(e) = engine.deposit_collateral(&account, &asset, WAD) {
                self.attempts.borrow_mut().push(e);
            }
        }
        self.inner.latest_price()
    }
}

#[test]
fn test_feed_reentry_during_valuation_is_rejected() {
    let address = Address::derive("engine");
    let weth = Rc::new(InMemoryToken::new("WETH"));
    let dsc = Rc::new(InMemoryToken::with_minter("DSC", address));
    let feed = Rc::new(ReentrantFeed {
        inner: ManualPriceFeed::with_price("ETH / USD", 8, 2_000_00000000, 0),
        engine: RefCell::new(Weak::new()),
        target: RefCell::new(None),
        attempts: RefCell::new(Vec::new()),
    });
    let engine = Rc::new(
        DscEngine::new(
            address,
            vec![weth.clone() as Rc<dyn FungibleToken>],
            vec![feed.clone() as Rc<dyn PriceFeed>],
            dsc,
            RiskParams::default(),
        )
        .unwrap(),
    );

    let mallory = Address::derive("mallory");
    weth.faucet(&mallory, 100 * WAD).unwrap();
    weth.approve(&mallory, &address, u128::MAX);
    engine
        .deposit_collateral(&mallory, &weth.address(), 10 * WAD)
        .unwrap();

    *feed.engine.borrow_mut() = Rc::downgrade(&engine);
    *feed.target.borrow_mut() = Some((mallory, weth.address()));
    let before = engine.snapshot();

    // Queries read the ledgers while the feed answers
    assert_eq!(engine.get_usd_value(&weth.address(), WAD).unwrap(), 2_000 * WAD);
    assert_eq!(
        engine.get_token_amount_from_usd(&weth.address(), 1_000 * WAD).unwrap(),
        WAD / 2
    );
    assert_eq!(engine.get_account_collateral_value(&mallory).unwrap(), 20_000 * WAD);
    assert_eq!(
        feed.attempts.borrow().as_slice(),
        &[Error::Reentrancy, Error::Reentrancy, Error::Reentrancy]
    );
    assert_eq!(engine.snapshot(), before);
    assert_eq!(weth.balance_of(&mallory), 90 * WAD);
    assert_eq!(engine.recent_events().len(), 1);

    // A health check inside an operation is turned away by the lock
    engine.mint_dsc(&mallory, 1_000 * WAD).unwrap();
    assert!(feed.attempts.borrow().len() > 3);
    assert!(feed.attempts.borrow().iter().all(|e| *e == Error::Reentrancy));
    assert!(engine.rejected_reentry_count() >= 1);
    assert_eq!(engine.total_debt(), 1_000 * WAD);
    assert_eq!(engine.get_collateral_balance(&mallory, &weth.address()), 10 * WAD);
}
