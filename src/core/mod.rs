//! Core accounting for the DSC engine.
//!
//! This module contains the fundamental building blocks:
//! - Risk parameters
//! - Collateral and debt ledgers
//! - Health factor math
//! - Ledger snapshots

pub mod collateral;
pub mod config;
pub mod debt;
pub mod health;
pub mod ledgers;

pub use collateral::*;
pub use config::*;
pub use debt::*;
pub use health::*;
pub use ledgers::*;
