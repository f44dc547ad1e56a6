//! The DSC engine.
//!
//! This module orchestrates the core ledgers into guarded atomic operations:
//! - Deposit, mint, burn and redeem, alone or composed
//! - Liquidation of unhealthy accounts
//! - Transaction journal with rollback and compensation
//! - Reentrancy lock
//! - Committed event log

pub mod dsc_engine;
pub mod events;
pub mod guard;
pub mod liquidation;
pub mod transaction;

pub use dsc_engine::*;
pub use events::*;
pub use guard::*;
pub use liquidation::*;
pub use transaction::*;
