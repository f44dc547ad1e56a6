//! # dsc-engine
//!
//! An over-collateralized debt engine for a USD-pegged synthetic unit.
//!
//! ## Architecture
//!
//! - **Core**: collateral and debt ledgers, health-factor math, risk params
//! - **Oracle**: per-asset price feeds behind a registry
//! - **Token**: fungible and mintable token traits plus an in-memory ledger
//! - **Engine**: guarded atomic operations, liquidation and the event log
//! - **Cli**: scenario simulator behind the `dsc-sim` binary
//!
//! Every operation either fully applies or leaves ledgers and token balances
//! untouched, and no committed operation leaves an account below the
//! minimum health factor.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dsc_engine::prelude::*;
//!
//! let engine = DscEngine::new(address, vec![weth], vec![eth_usd], dsc, RiskParams::default())?;
//! engine.deposit_collateral_and_mint_dsc(&alice, &weth_address, 10 * PRECISION, 5_000 * PRECISION)?;
//! assert!(engine.get_health_factor(&alice)? >= HealthFactor::ONE);
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod token;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        collateral::CollateralLedger,
        config::{EngineParams, RiskParams},
        debt::DebtLedger,
        health::HealthFactor,
        ledgers::Ledgers,
    };
    pub use crate::engine::{
        dsc_engine::{AccountInformation, DscEngine},
        events::{EngineEvent, EventRecord},
        liquidation::{LiquidationOutcome, LiquidationQuote},
    };
    pub use crate::error::{Error, Result};
    pub use crate::oracle::{
        price_feed::{ManualPriceFeed, PriceData, PriceFeed},
        registry::{FeedRegistry, PriceOracle},
    };
    pub use crate::token::{FungibleToken, InMemoryToken, MintableToken};
    pub use crate::utils::{address::Address, constants::PRECISION};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
