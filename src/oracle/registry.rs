//! Per-asset price lookup.
//!
//! The engine values collateral through the [`PriceOracle`] trait. The
//! [`FeedRegistry`] answers it from the whitelist's price feeds as given, with
//! no sanity or staleness check. [`FreshnessGuard`] wraps any oracle and
//! rejects answers older than a maximum age.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::oracle::price_feed::{PriceData, PriceFeed};
use crate::utils::address::Address;

/// Maps an asset to its current USD price
pub trait PriceOracle {
    /// Latest answer for `asset`
    fn latest_price(&self, asset: &Address) -> Result<PriceData>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEED REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// One price feed per whitelisted asset, fixed at construction
#[derive(Clone, Default)]
pub struct FeedRegistry {
    feeds: BTreeMap<Address, Rc<dyn PriceFeed>>,
}

impl FeedRegistry {
    /// Build from `(asset, feed)` pairs; later duplicates replace earlier ones
    pub fn new(entries: impl IntoIterator<Item = (Address, Rc<dyn PriceFeed>)>) -> Self {
        Self {
            feeds: entries.into_iter().collect(),
        }
    }

    /// Feed registered for `asset`
    pub fn feed(&self, asset: &Address) -> Option<&Rc<dyn PriceFeed>> {
        self.feeds.get(asset)
    }

    /// Number of registered feeds
    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    /// True if no feed is registered
    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

impl PriceOracle for FeedRegistry {
    fn latest_price(&self, asset: &Address) -> Result<PriceData> {
        self.feeds
            .get(asset)
            .ok_or(Error::AssetNotAllowed(*asset))?
            .latest_price()
    }
}

impl fmt::Debug for FeedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.feeds.iter().map(|(asset, feed)| (asset, feed.description())))
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRESHNESS GUARD
// ═══════════════════════════════════════════════════════════════════════════════

/// Rejects answers older than `max_age` seconds at `now`
pub struct FreshnessGuard<'a> {
    inner: &'a dyn PriceOracle,
    now: u64,
    max_age: u64,
}

impl<'a> FreshnessGuard<'a> {
    /// Wrap an oracle
    pub fn new(inner: &'a dyn PriceOracle, now: u64, max_age: u64) -> Self {
        Self { inner, now, max_age }
    }
}

impl PriceOracle for FreshnessGuard<'_> {
    fn latest_price(&self, asset: &Address) -> Result<PriceData> {
        let price = self.inner.latest_price(asset)?;
        if !price.is_fresh(self.now, self.max_age) {
            return Err(Error::StalePrice {
                age: price.age(self.now),
                max_age: self.max_age,
            });
        }
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::price_feed::ManualPriceFeed;

    fn registry() -> (Address, Rc<ManualPriceFeed>, FeedRegistry) {
        let weth = Address::derive("weth");
        let feed = Rc::new(ManualPriceFeed::with_price("ETH / USD", 8, 2000_00000000, 1_000));
        let registry = FeedRegistry::new([(weth, feed.clone() as Rc<dyn PriceFeed>)]);
        (weth, feed, registry)
    }

    #[test]
    fn test_lookup() {
        let (weth, _, registry) = registry();
        assert_eq!(registry.latest_price(&weth).unwrap().price, 2000_00000000);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_asset() {
        let (_, _, registry) = registry();
        let other = Address::derive("other");
        assert_eq!(registry.latest_price(&other), Err(Error::AssetNotAllowed(other)));
    }

    #[test]
    fn test_price_changes_are_visible() {
        let (weth, feed, registry) = registry();
        feed.set_price(1000_00000000, 2_000).unwrap();
        assert_eq!(registry.latest_price(&weth).unwrap().price, 1000_00000000);
    }

    #[test]
    fn test_freshness_guard() {
        let (weth, _, registry) = registry();

        let fresh = FreshnessGuard::new(&registry, 1_000 + 3_600, 3_600);
        assert!(fresh.latest_price(&weth).is_ok());

        let stale = FreshnessGuard::new(&registry, 1_000 + 3_601, 3_600);
        assert_eq!(
            stale.latest_price(&weth),
            Err(Error::StalePrice { age: 3_601, max_age: 3_600 })
        );
    }
}
