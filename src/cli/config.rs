//! Simulator configuration.
//!
//! Describes the world a scenario runs in. Stored as pretty JSON; every
//! field has a default so partial files are accepted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::cli::{CliError, CliResult};
use crate::core::config::RiskParams;
use crate::utils::constants::DEFAULT_FEED_DECIMALS;
use crate::utils::math::parse_units;

/// Environment variable overriding [`SimConfig::log_filter`]
pub const LOG_ENV: &str = "DSC_SIM_LOG";

/// Default file name written by `dsc-sim init`
pub const CONFIG_FILE: &str = "sim.json";

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET SPEC
// ═══════════════════════════════════════════════════════════════════════════════

/// One collateral asset and its price feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Token symbol, also the name scenarios use for the asset
    pub symbol: String,
    /// Decimals of the feed's answers
    #[serde(default = "default_feed_decimals")]
    pub feed_decimals: u8,
    /// Opening USD price as a decimal string
    pub initial_price: String,
}

fn default_feed_decimals() -> u8 {
    DEFAULT_FEED_DECIMALS
}

impl AssetSpec {
    /// Create an asset spec with the default feed decimals
    pub fn new(symbol: impl Into<String>, initial_price: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            feed_decimals: DEFAULT_FEED_DECIMALS,
            initial_price: initial_price.into(),
        }
    }

    /// Opening price scaled to the feed's decimals
    pub fn initial_answer(&self) -> CliResult<u128> {
        Ok(parse_units(&self.initial_price, self.feed_decimals)?)
    }

    /// Feed description, e.g. `"WETH / USD"`
    pub fn feed_description(&self) -> String {
        format!("{} / USD", self.symbol)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATOR CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Engine risk parameters
    pub risk: RiskParams,
    /// Collateral whitelist, in order
    pub assets: Vec<AssetSpec>,
    /// Symbol of the synthetic unit
    pub dsc_symbol: String,
    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
    /// Seconds between simulated blocks
    pub block_time_secs: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            risk: RiskParams::default(),
            assets: vec![AssetSpec::new("WETH", "2000"), AssetSpec::new("WBTC", "30000")],
            dsc_symbol: "DSC".into(),
            log_filter: "info".into(),
            block_time_secs: 12,
        }
    }
}

impl SimConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|source| CliError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> CliResult<()> {
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CliError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(path, content).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_log_filter_override(std::env::var(LOG_ENV).ok())
    }

    /// Replace the log filter when `filter` is set and non-empty
    pub fn with_log_filter_override(mut self, filter: Option<String>) -> Self {
        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            self.log_filter = filter;
        }
        self
    }

    /// Check that the world can be built
    pub fn validate(&self) -> CliResult<()> {
        self.risk.validate()?;

        if self.assets.is_empty() {
            return Err(CliError::Config("at least one collateral asset is required".into()));
        }
        if self.dsc_symbol.trim().is_empty() {
            return Err(CliError::Config("dsc_symbol cannot be empty".into()));
        }

        let mut seen = BTreeSet::new();
        for asset in &self.assets {
            if !seen.insert(asset.symbol.as_str()) || asset.symbol == self.dsc_symbol {
                return Err(CliError::Config(format!("duplicate symbol {}", asset.symbol)));
            }
            if asset.initial_answer()? == 0 {
                return Err(CliError::Config(format!("{} has a zero initial price", asset.symbol)));
            }
        }
        Ok(())
    }

    /// Look up an asset by symbol
    pub fn asset(&self, symbol: &str) -> Option<&AssetSpec> {
        self.assets.iter().find(|a| a.symbol == symbol)
    }
}
