//! Simulator support for the `dsc-sim` binary.
//!
//! A simulation is a [`SimConfig`] describing the world (collateral assets,
//! their feeds, risk parameters) plus a [`Scenario`] of steps replayed
//! against a fresh in-memory engine.

pub mod config;
pub mod output;
pub mod scenario;

pub use config::*;
pub use output::*;
pub use scenario::*;

use std::path::PathBuf;

use crate::error::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// CLI ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Result type alias for simulator operations
pub type CliResult<T> = std::result::Result<T, CliError>;

/// Errors raised while loading or replaying a simulation
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Reading or writing a file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A config or scenario file is not valid JSON for its type
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The configuration is unusable
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A step names an asset the world does not have
    #[error("Step {step}: unknown asset {symbol}")]
    UnknownAsset {
        /// Step index, starting at 1
        step: usize,
        /// Symbol used in the step
        symbol: String,
    },

    /// A step failed with an error the scenario did not expect
    #[error("Step {step} ({op}) failed: {source}")]
    StepFailed {
        /// Step index, starting at 1
        step: usize,
        /// Step operation
        op: &'static str,
        /// Engine error
        #[source]
        source: Error,
    },

    /// A step expected to fail succeeded
    #[error("Step {step} ({op}) succeeded, expected {expected}")]
    UnexpectedSuccess {
        /// Step index, starting at 1
        step: usize,
        /// Step operation
        op: &'static str,
        /// Expected error name
        expected: String,
    },

    /// A step failed with a different error than expected
    #[error("Step {step} ({op}) failed with {actual}, expected {expected}")]
    WrongError {
        /// Step index, starting at 1
        step: usize,
        /// Step operation
        op: &'static str,
        /// Expected error name
        expected: String,
        /// Actual error name
        actual: &'static str,
    },

    /// A health factor check did not hold
    #[error("Step {step}: {reason}")]
    Expectation {
        /// Step index, starting at 1
        step: usize,
        /// What was checked
        reason: String,
    },

    /// Engine error outside a step
    #[error(transparent)]
    Engine(#[from] Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Io { .. } | CliError::Parse { .. } | CliError::Serialize(_) => 2,
            CliError::Config(_) | CliError::Engine(_) => 3,
            _ => 1,
        }
    }
}
