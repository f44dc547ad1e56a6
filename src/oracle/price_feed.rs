//! Price feed implementation.
//!
//! This module provides the price feed collaborator:
//! - `PriceData`, a single feed answer with its own decimals
//! - the `PriceFeed` trait the engine reads from
//! - `ManualPriceFeed`, an in-memory feed used by tests and the simulator

use serde::{Deserialize, Serialize};
use std::cell::RefCell;

use crate::error::{Error, Result};
use crate::utils::constants::{DSC_DECIMALS, PRECISION};
use crate::utils::math::{format_units, mul_div, rescale};

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// A single price answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceData {
    /// USD price in feed units (e.g. 2000_00000000 = $2000 with 8 decimals)
    pub price: u128,
    /// Decimals of `price`
    pub decimals: u8,
    /// Unix timestamp of the answer
    pub updated_at: u64,
}

impl PriceData {
    /// Create a new price answer
    pub fn new(price: u128, decimals: u8, updated_at: u64) -> Self {
        Self {
            price,
            decimals,
            updated_at,
        }
    }

    /// Price scaled to ledger precision (18 decimals)
    pub fn normalized(&self) -> Result<u128> {
        rescale(self.price, self.decimals, DSC_DECIMALS)
    }

    /// USD value of a token amount: `price * amount / 1e18`, truncating
    pub fn value_of(&self, amount: u128) -> Result<u128> {
        mul_div(self.normalized()?, amount, PRECISION)
    }

    /// Token amount worth `usd_value`: `usd * 1e18 / price`, truncating
    pub fn amount_for(&self, usd_value: u128) -> Result<u128> {
        let price = self.normalized()?;
        if price == 0 {
            return Err(Error::InvalidParameter {
                name: "price".into(),
                reason: "division by zero".into(),
            });
        }
        mul_div(usd_value, PRECISION, price)
    }

    /// Check if price is fresh
    pub fn is_fresh(&self, current_time: u64, max_age: u64) -> bool {
        self.age(current_time) <= max_age
    }

    /// Get age of price in seconds
    pub fn age(&self, current_time: u64) -> u64 {
        current_time.saturating_sub(self.updated_at)
    }

    /// Format price for display
    pub fn format_price(&self) -> String {
        format!("${}", format_units(self.price, self.decimals))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of USD prices for one asset
pub trait PriceFeed {
    /// Human-readable pair name, e.g. `"ETH / USD"`
    fn description(&self) -> String;

    /// Latest answer
    fn latest_price(&self) -> Result<PriceData>;
}

/// In-memory price feed updated by hand
#[derive(Debug)]
pub struct ManualPriceFeed {
    description: String,
    decimals: u8,
    current: RefCell<Option<PriceData>>,
}

impl ManualPriceFeed {
    /// Create a feed without an answer
    pub fn new(description: impl Into<String>, decimals: u8) -> Self {
        Self {
            description: description.into(),
            decimals,
            current: RefCell::new(None),
        }
    }

    /// Create a feed with an initial answer
    pub fn with_price(
        description: impl Into<String>,
        decimals: u8,
        price: u128,
        updated_at: u64,
    ) -> Self {
        let feed = Self::new(description, decimals);
        feed.force_update(PriceData::new(price, decimals, updated_at));
        feed
    }

    /// Decimals of this feed's answers
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PRICE UPDATES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Publish a new answer with the feed's decimals
    pub fn set_price(&self, price: u128, updated_at: u64) -> Result<()> {
        self.update(PriceData::new(price, self.decimals, updated_at))
    }

    /// Publish a new answer with validation
    pub fn update(&self, price: PriceData) -> Result<()> {
        if price.decimals != self.decimals {
            return Err(Error::InvalidParameter {
                name: "decimals".into(),
                reason: format!("feed reports {} decimals, got {}", self.decimals, price.decimals),
            });
        }

        let current = *self.current.borrow();
        if let Some(current) = current {
            if price.updated_at < current.updated_at {
                return Err(Error::InvalidParameter {
                    name: "updated_at".into(),
                    reason: "price timestamp is older than current".into(),
                });
            }
        }

        self.force_update(price);
        Ok(())
    }

    /// Publish without validation
    pub fn force_update(&self, price: PriceData) {
        *self.current.borrow_mut() = Some(price);
    }
}

impl PriceFeed for ManualPriceFeed {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn latest_price(&self) -> Result<PriceData> {
        self.current
            .borrow()
            .ok_or_else(|| Error::PriceUnavailable(self.description.clone()))
    }
}
