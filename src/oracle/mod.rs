//! Oracle module for price feeds.
//!
//! This module provides price lookup for collateral valuation:
//! - Price feed trait and an in-memory feed
//! - Per-asset feed registry
//! - Optional staleness guard

pub mod price_feed;
pub mod registry;

pub use price_feed::*;
pub use registry::*;
