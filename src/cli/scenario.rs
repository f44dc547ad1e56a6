//! Scenario replay.
//!
//! A scenario is a JSON list of steps. Accounts are named by label and
//! created on first use with unlimited engine allowances on every token.
//! Assets are named by symbol. Amounts and prices are decimal strings.
//! Each step runs in its own simulated block.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use crate::cli::config::SimConfig;
use crate::cli::{CliError, CliResult};
use crate::core::health::HealthFactor;
use crate::engine::DscEngine;
use crate::error::{Error, Result};
use crate::oracle::price_feed::{ManualPriceFeed, PriceFeed};
use crate::token::{FungibleToken, InMemoryToken};
use crate::utils::address::Address;
use crate::utils::math::{format_wad, parse_units, parse_wad};

/// Default file name written by `dsc-sim init`
pub const SCENARIO_FILE: &str = "scenario.json";

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// One action against the world
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Fund an account with a collateral token
    Faucet {
        account: String,
        asset: String,
        amount: String,
    },
    /// Publish a new USD price for an asset
    SetPrice { asset: String, price: String },
    /// `deposit_collateral`
    Deposit {
        account: String,
        asset: String,
        amount: String,
    },
    /// `mint_dsc`
    Mint { account: String, amount: String },
    /// `deposit_collateral_and_mint_dsc`
    DepositAndMint {
        account: String,
        asset: String,
        collateral: String,
        dsc: String,
    },
    /// `redeem_collateral`
    Redeem {
        account: String,
        asset: String,
        amount: String,
    },
    /// `burn_dsc`
    Burn { account: String, amount: String },
    /// `redeem_collateral_for_dsc`
    RedeemForDsc {
        account: String,
        asset: String,
        collateral: String,
        dsc: String,
    },
    /// `liquidate`
    Liquidate {
        liquidator: String,
        user: String,
        asset: String,
        debt: String,
    },
    /// Make a token reject state-changing calls
    Pause { token: String },
    /// Undo `pause`
    Resume { token: String },
    /// Check an account's health factor
    ExpectHealthFactor {
        account: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at_least: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        below: Option<String>,
    },
}

impl Action {
    /// Operation name as written in scenario files
    pub fn name(&self) -> &'static str {
        match self {
            Action::Faucet { .. } => "faucet",
            Action::SetPrice { .. } => "set_price",
            Action::Deposit { .. } => "deposit",
            Action::Mint { .. } => "mint",
            Action::DepositAndMint { .. } => "deposit_and_mint",
            Action::Redeem { .. } => "redeem",
            Action::Burn { .. } => "burn",
            Action::RedeemForDsc { .. } => "redeem_for_dsc",
            Action::Liquidate { .. } => "liquidate",
            Action::Pause { .. } => "pause",
            Action::Resume { .. } => "resume",
            Action::ExpectHealthFactor { .. } => "expect_health_factor",
        }
    }
}

/// An action and the engine error it should raise, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// What to do
    #[serde(flatten)]
    pub action: Action,
    /// Expected [`Error::name`]; the step fails if the action succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_error: Option<String>,
}

impl Step {
    /// A step expected to succeed
    pub fn ok(action: Action) -> Self {
        Self {
            action,
            expect_error: None,
        }
    }

    /// A step expected to fail with `error`
    pub fn failing(action: Action, error: &str) -> Self {
        Self {
            action,
            expect_error: Some(error.into()),
        }
    }
}

/// A named list of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Steps, in order
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Load from a JSON file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CliError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> CliResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The scenario written by `dsc-sim init`: a price drop followed by a
    /// liquidation against the default config
    pub fn example() -> Self {
        let s = |v: &str| v.to_string();
        let steps = vec![
            Step::ok(Action::Faucet {
                account: s("alice"),
                asset: s("WETH"),
                amount: s("10"),
            }),
            Step::ok(Action::Faucet {
                account: s("bob"),
                asset: s("WETH"),
                amount: s("20"),
            }),
            Step::ok(Action::DepositAndMint {
                account: s("alice"),
                asset: s("WETH"),
                collateral: s("10"),
                dsc: s("10000"),
            }),
            Step::failing(
                Action::Mint {
                    account: s("alice"),
                    amount: s("1"),
                },
                "HealthFactorBroken",
            ),
            Step::ok(Action::DepositAndMint {
                account: s("bob"),
                asset: s("WETH"),
                collateral: s("20"),
                dsc: s("1000"),
            }),
            Step::failing(
                Action::Liquidate {
                    liquidator: s("bob"),
                    user: s("alice"),
                    asset: s("WETH"),
                    debt: s("1000"),
                },
                "HealthFactorOk",
            ),
            Step::ok(Action::SetPrice {
                asset: s("WETH"),
                price: s("1800"),
            }),
            Step::ok(Action::ExpectHealthFactor {
                account: s("alice"),
                at_least: None,
                below: Some(s("1")),
            }),
            Step::ok(Action::Liquidate {
                liquidator: s("bob"),
                user: s("alice"),
                asset: s("WETH"),
                debt: s("1000"),
            }),
            Step::failing(
                Action::RedeemForDsc {
                    account: s("alice"),
                    asset: s("WETH"),
                    collateral: s("1"),
                    dsc: s("1000"),
                },
                "HealthFactorBroken",
            ),
            Step::ok(Action::Burn {
                account: s("alice"),
                amount: s("9000"),
            }),
            Step::ok(Action::Redeem {
                account: s("alice"),
                asset: s("WETH"),
                amount: s("9"),
            }),
        ];

        Self {
            name: "liquidation".into(),
            description: "Price drop from $2000 to $1800 and a partial liquidation".into(),
            steps,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Step index, starting at 1
    pub step: usize,
    /// Operation name
    pub op: &'static str,
    /// Human-readable summary
    pub detail: String,
    /// Expected error that was raised, if any
    pub expected_error: Option<&'static str>,
}

/// One account's position at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountReport {
    /// Account label
    pub label: String,
    /// Account address
    pub address: Address,
    /// Deposited collateral value in USD
    pub collateral_value_usd: String,
    /// Outstanding debt
    pub debt: String,
    /// Health factor
    pub health_factor: String,
}

/// Result of a whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Per-step results
    pub steps: Vec<StepReport>,
    /// Final positions, by label
    pub accounts: Vec<AccountReport>,
    /// Debt across all accounts
    pub total_debt: String,
    /// Hex SHA-256 of the final ledgers
    pub state_hash: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATED WORLD
// ═══════════════════════════════════════════════════════════════════════════════

struct SimAsset {
    token: Rc<InMemoryToken>,
    feed: Rc<ManualPriceFeed>,
}

/// Tokens, feeds and an engine built from a [`SimConfig`]
pub struct SimWorld {
    engine: DscEngine,
    dsc: Rc<InMemoryToken>,
    dsc_symbol: String,
    assets: BTreeMap<String, SimAsset>,
    accounts: BTreeMap<String, Address>,
    block_time_secs: u64,
    height: u64,
}

impl std::fmt::Debug for SimWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimWorld")
            .field("engine", &self.engine)
            .field("assets", &self.assets.keys().collect::<Vec<_>>())
            .field("accounts", &self.accounts)
            .field("height", &self.height)
            .finish()
    }
}

impl SimWorld {
    /// Build a fresh world
    pub fn build(config: &SimConfig) -> CliResult<Self> {
        config.validate()?;

        let engine_address = Address::derive("engine");
        let dsc = Rc::new(InMemoryToken::with_minter(&config.dsc_symbol, engine_address));

        let mut assets = BTreeMap::new();
        let mut tokens: Vec<Rc<dyn FungibleToken>> = Vec::new();
        let mut feeds: Vec<Rc<dyn PriceFeed>> = Vec::new();
        for spec in &config.assets {
            let token = Rc::new(InMemoryToken::new(&spec.symbol));
            let feed = Rc::new(ManualPriceFeed::with_price(
                spec.feed_description(),
                spec.feed_decimals,
                spec.initial_answer()?,
                0,
            ));
            tokens.push(token.clone());
            feeds.push(feed.clone());
            assets.insert(spec.symbol.clone(), SimAsset { token, feed });
        }

        let engine = DscEngine::new(
            engine_address,
            tokens,
            feeds,
            dsc.clone(),
            config.risk.clone(),
        )?;

        Ok(Self {
            engine,
            dsc,
            dsc_symbol: config.dsc_symbol.clone(),
            assets,
            accounts: BTreeMap::new(),
            block_time_secs: config.block_time_secs,
            height: 0,
        })
    }

    /// The engine under simulation
    pub fn engine(&self) -> &DscEngine {
        &self.engine
    }

    /// The synthetic unit token
    pub fn dsc(&self) -> &InMemoryToken {
        &self.dsc
    }

    /// A collateral token by symbol
    pub fn token(&self, symbol: &str) -> Option<&InMemoryToken> {
        self.assets.get(symbol).map(|a| a.token.as_ref())
    }

    /// Address of a known account label
    pub fn address_of(&self, label: &str) -> Option<Address> {
        self.accounts.get(label).copied()
    }

    /// Current simulated block height
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Run every step, stopping at the first failure
    pub fn run(&mut self, scenario: &Scenario) -> CliResult<ScenarioReport> {
        tracing::info!(
            scenario = %scenario.name,
            steps = scenario.steps.len(),
            "Running scenario"
        );

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (i, step) in scenario.steps.iter().enumerate() {
            steps.push(self.run_step(i + 1, step)?);
        }

        Ok(ScenarioReport {
            name: scenario.name.clone(),
            steps,
            accounts: self.account_reports()?,
            total_debt: format_wad(self.engine.total_debt()),
            state_hash: self.engine.state_hash_hex()?,
        })
    }

    /// Run one step in a new block
    pub fn run_step(&mut self, index: usize, step: &Step) -> CliResult<StepReport> {
        self.height += 1;
        let timestamp = self.height * self.block_time_secs;
        self.engine.begin_block(self.height, timestamp);

        let op = step.action.name();
        let outcome = self.apply(index, &step.action, timestamp)?;

        let expected_error = match (outcome, &step.expect_error) {
            (Ok(detail), None) => {
                return Ok(StepReport {
                    step: index,
                    op,
                    detail,
                    expected_error: None,
                })
            }
            (Ok(_), Some(expected)) => {
                return Err(CliError::UnexpectedSuccess {
                    step: index,
                    op,
                    expected: expected.clone(),
                })
            }
            (Err(source), None) => {
                return Err(CliError::StepFailed {
                    step: index,
                    op,
                    source,
                })
            }
            (Err(error), Some(expected)) if error.name() != expected.as_str() => {
                return Err(CliError::WrongError {
                    step: index,
                    op,
                    expected: expected.clone(),
                    actual: error.name(),
                })
            }
            (Err(error), Some(_)) => error,
        };

        Ok(StepReport {
            step: index,
            op,
            detail: expected_error.to_string(),
            expected_error: Some(expected_error.name()),
        })
    }

    /// Final positions of every account seen so far
    pub fn account_reports(&self) -> CliResult<Vec<AccountReport>> {
        self.accounts
            .iter()
            .map(|(label, address)| {
                let info = self.engine.get_account_information(address)?;
                Ok(AccountReport {
                    label: label.clone(),
                    address: *address,
                    collateral_value_usd: format_wad(info.collateral_value_in_usd),
                    debt: format_wad(info.total_dsc_minted),
                    health_factor: self.engine.get_health_factor(address)?.to_string(),
                })
            })
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STEP EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Outer error: the step itself is malformed. Inner error: the engine
    /// (or a token) rejected the action.
    fn apply(
        &mut self,
        index: usize,
        action: &Action,
        timestamp: u64,
    ) -> CliResult<Result<String>> {
        let op = action.name();
        let wad = |value: &str| {
            parse_wad(value).map_err(|source| CliError::StepFailed {
                step: index,
                op,
                source,
            })
        };

        let outcome = match action {
            Action::Faucet {
                account,
                asset,
                amount,
            } => {
                let who = self.account(account);
                let token = &self.asset(index, asset)?.token;
                let amount = wad(amount)?;
                token.faucet(&who, amount).map(|_| {
                    format!(
                        "{} received {} {}, now holds {}",
                        account,
                        format_wad(amount),
                        asset,
                        token.format_balance(&who)
                    )
                })
            }
            Action::SetPrice { asset, price } => {
                let feed = &self.asset(index, asset)?.feed;
                let answer = parse_units(price, feed.decimals()).map_err(|source| {
                    CliError::StepFailed {
                        step: index,
                        op,
                        source,
                    }
                })?;
                feed.set_price(answer, timestamp)
                    .map(|_| format!("{} now ${}", asset, price))
            }
            Action::Deposit {
                account,
                asset,
                amount,
            } => {
                let who = self.account(account);
                let token = self.asset(index, asset)?.token.address();
                let amount = wad(amount)?;
                self.engine
                    .deposit_collateral(&who, &token, amount)
                    .map(|_| format!("{} deposited {} {}", account, format_wad(amount), asset))
            }
            Action::Mint { account, amount } => {
                let who = self.account(account);
                let amount = wad(amount)?;
                self.engine.mint_dsc(&who, amount).map(|_| {
                    format!("{} minted {} {}", account, format_wad(amount), self.dsc_symbol)
                })
            }
            Action::DepositAndMint {
                account,
                asset,
                collateral,
                dsc,
            } => {
                let who = self.account(account);
                let token = self.asset(index, asset)?.token.address();
                let (collateral, dsc) = (wad(collateral)?, wad(dsc)?);
                self.engine
                    .deposit_collateral_and_mint_dsc(&who, &token, collateral, dsc)
                    .map(|_| {
                        format!(
                            "{} deposited {} {} and minted {} {}",
                            account,
                            format_wad(collateral),
                            asset,
                            format_wad(dsc),
                            self.dsc_symbol
                        )
                    })
            }
            Action::Redeem {
                account,
                asset,
                amount,
            } => {
                let who = self.account(account);
                let token = self.asset(index, asset)?.token.address();
                let amount = wad(amount)?;
                self.engine
                    .redeem_collateral(&who, &token, amount)
                    .map(|_| format!("{} redeemed {} {}", account, format_wad(amount), asset))
            }
            Action::Burn { account, amount } => {
                let who = self.account(account);
                let amount = wad(amount)?;
                self.engine.burn_dsc(&who, amount).map(|_| {
                    format!("{} burned {} {}", account, format_wad(amount), self.dsc_symbol)
                })
            }
            Action::RedeemForDsc {
                account,
                asset,
                collateral,
                dsc,
            } => {
                let who = self.account(account);
                let token = self.asset(index, asset)?.token.address();
                let (collateral, dsc) = (wad(collateral)?, wad(dsc)?);
                self.engine
                    .redeem_collateral_for_dsc(&who, &token, collateral, dsc)
                    .map(|_| {
                        format!(
                            "{} burned {} {} and redeemed {} {}",
                            account,
                            format_wad(dsc),
                            self.dsc_symbol,
                            format_wad(collateral),
                            asset
                        )
                    })
            }
            Action::Liquidate {
                liquidator,
                user,
                asset,
                debt,
            } => {
                let caller = self.account(liquidator);
                let victim = self.account(user);
                let token = self.asset(index, asset)?.token.address();
                let debt = wad(debt)?;
                self.engine
                    .liquidate(&caller, &token, &victim, debt)
                    .map(|outcome| {
                        format!(
                            "{} covered {} {} of {}, seized {} {} (health {} -> {})",
                            liquidator,
                            format_wad(debt),
                            self.dsc_symbol,
                            user,
                            format_wad(outcome.quote.total_collateral),
                            asset,
                            outcome.quote.starting_health_factor,
                            outcome.ending_health_factor
                        )
                    })
            }
            Action::Pause { token } => {
                self.any_token(index, token)?.pause();
                Ok(format!("{} paused", token))
            }
            Action::Resume { token } => {
                self.any_token(index, token)?.resume();
                Ok(format!("{} resumed", token))
            }
            Action::ExpectHealthFactor {
                account,
                at_least,
                below,
            } => {
                let who = self.account(account);
                let actual = self.engine.get_health_factor(&who);
                let actual = match actual {
                    Ok(actual) => actual,
                    Err(error) => return Ok(Err(error)),
                };
                if let Some(min) = at_least {
                    let min = HealthFactor::from_raw(wad(min)?);
                    if actual < min {
                        return Err(CliError::Expectation {
                            step: index,
                            reason: format!(
                                "{} health factor {} is below {}",
                                account, actual, min
                            ),
                        });
                    }
                }
                if let Some(max) = below {
                    let max = HealthFactor::from_raw(wad(max)?);
                    if actual >= max {
                        return Err(CliError::Expectation {
                            step: index,
                            reason: format!(
                                "{} health factor {} is not below {}",
                                account, actual, max
                            ),
                        });
                    }
                }
                Ok(format!("{} health factor {}", account, actual))
            }
        };

        match &outcome {
            Ok(detail) => tracing::debug!(step = index, op, detail = %detail, "Step applied"),
            Err(error) => tracing::debug!(step = index, op, error = %error, "Step rejected"),
        }
        Ok(outcome)
    }

    fn asset(&self, index: usize, symbol: &str) -> CliResult<&SimAsset> {
        self.assets.get(symbol).ok_or_else(|| CliError::UnknownAsset {
            step: index,
            symbol: symbol.into(),
        })
    }

    fn any_token(&self, index: usize, symbol: &str) -> CliResult<&InMemoryToken> {
        if symbol == self.dsc_symbol {
            return Ok(&self.dsc);
        }
        self.asset(index, symbol).map(|a| a.token.as_ref())
    }

    /// Resolve a label, creating the account with engine allowances on first use
    fn account(&mut self, label: &str) -> Address {
        if let Some(address) = self.accounts.get(label) {
            return *address;
        }

        let address = Address::derive(label);
        let engine = self.engine.address();
        for asset in self.assets.values() {
            asset.token.approve(&address, &engine, u128::MAX);
        }
        self.dsc.approve(&address, &engine, u128::MAX);
        self.accounts.insert(label.to_string(), address);
        address
    }
}
