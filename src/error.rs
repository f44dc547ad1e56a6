//! Error types for the DSC engine.
//!
//! Every error aborts the operation that raised it. Nothing is retried and
//! no partial effect is persisted, so callers re-submit with corrected
//! inputs.

use thiserror::Error;

use crate::core::health::HealthFactor;
use crate::utils::address::Address;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any state change (zero amount, unknown asset, bad config)
    Validation,
    /// Withdrawal exceeding a stored balance
    InsufficientFunds,
    /// Health factor below minimum after a mutation
    InvariantViolation,
    /// A token collaborator reported failure
    ExternalCallFailure,
    /// Liquidation preconditions not met
    Precondition,
    /// Checked arithmetic failed
    Arithmetic,
    /// Lock, serialization or bookkeeping failure
    Internal,
}

/// Main error type for the DSC engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Amount must be greater than zero
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    /// Asset is not on the collateral whitelist
    #[error("Asset {0} is not allowed as collateral")]
    AssetNotAllowed(Address),

    /// Token and price feed lists differ in length
    #[error("Collateral configuration mismatch: {tokens} tokens, {feeds} price feeds")]
    LengthMismatch {
        /// Number of collateral tokens supplied
        tokens: usize,
        /// Number of price feeds supplied
        feeds: usize,
    },

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Funds Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Withdrawal exceeds the deposited balance
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Requested amount
        required: u128,
        /// Stored balance
        available: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Solvency Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Health factor fell below the minimum
    #[error("Health factor broken: {health_factor}")]
    HealthFactorBroken {
        /// Health factor the operation would have left behind
        health_factor: HealthFactor,
    },

    /// Target account is healthy and cannot be liquidated
    #[error("Health factor is ok: {health_factor}")]
    HealthFactorOk {
        /// Current health factor of the target
        health_factor: HealthFactor,
    },

    /// Liquidation did not improve the target's health factor
    #[error("Health factor not improved: {starting} -> {ending}")]
    HealthFactorNotImproved {
        /// Health factor before liquidation
        starting: HealthFactor,
        /// Health factor after liquidation
        ending: HealthFactor,
    },

    // ═══════════════════════════════════════════════════════════════════
    // External Call Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Token transfer reported failure
    #[error("Transfer of {amount} {token} from {from} to {to} failed")]
    TransferFailed {
        /// Token address
        token: Address,
        /// Sender
        from: Address,
        /// Recipient
        to: Address,
        /// Amount
        amount: u128,
    },

    /// Synthetic unit mint reported failure
    #[error("Mint of {amount} to {to} failed")]
    MintFailed {
        /// Recipient
        to: Address,
        /// Amount
        amount: u128,
    },

    /// Synthetic unit burn reported failure
    #[error("Burn of {amount} failed")]
    BurnFailed {
        /// Amount
        amount: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Price is older than the configured maximum age
    #[error("Price is stale: last update {age}s ago, max allowed {max_age}s")]
    StalePrice {
        /// Seconds since the feed last updated
        age: u64,
        /// Maximum allowed age in seconds
        max_age: u64,
    },

    /// Feed has never reported a price
    #[error("No price available from feed {0}")]
    PriceUnavailable(String),

    // ═══════════════════════════════════════════════════════════════════
    // Arithmetic Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// A guarded operation was entered while another was in progress
    #[error("Reentrant call rejected")]
    Reentrancy,

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAmount
            | Error::AssetNotAllowed(_)
            | Error::LengthMismatch { .. }
            | Error::InvalidParameter { .. }
            | Error::StalePrice { .. }
            | Error::PriceUnavailable(_) => ErrorKind::Validation,
            Error::InsufficientBalance { .. } => ErrorKind::InsufficientFunds,
            Error::HealthFactorBroken { .. } => ErrorKind::InvariantViolation,
            Error::HealthFactorOk { .. } | Error::HealthFactorNotImproved { .. } => {
                ErrorKind::Precondition
            }
            Error::TransferFailed { .. } | Error::MintFailed { .. } | Error::BurnFailed { .. } => {
                ErrorKind::ExternalCallFailure
            }
            Error::Overflow { .. } | Error::Underflow { .. } => ErrorKind::Arithmetic,
            Error::Reentrancy
            | Error::Serialization(_)
            | Error::Deserialization(_)
            | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if re-submitting with different inputs or after a price
    /// update can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBalance { .. }
                | Error::HealthFactorBroken { .. }
                | Error::HealthFactorOk { .. }
                | Error::HealthFactorNotImproved { .. }
                | Error::StalePrice { .. }
                | Error::TransferFailed { .. }
        )
    }

    /// Stable variant name, used by scenario scripts to match expected failures
    pub fn name(&self) -> &'static str {
        match self {
            Error::InvalidAmount => "InvalidAmount",
            Error::AssetNotAllowed(_) => "AssetNotAllowed",
            Error::LengthMismatch { .. } => "LengthMismatch",
            Error::InvalidParameter { .. } => "InvalidParameter",
            Error::InsufficientBalance { .. } => "InsufficientBalance",
            Error::HealthFactorBroken { .. } => "HealthFactorBroken",
            Error::HealthFactorOk { .. } => "HealthFactorOk",
            Error::HealthFactorNotImproved { .. } => "HealthFactorNotImproved",
            Error::TransferFailed { .. } => "TransferFailed",
            Error::MintFailed { .. } => "MintFailed",
            Error::BurnFailed { .. } => "BurnFailed",
            Error::StalePrice { .. } => "StalePrice",
            Error::PriceUnavailable(_) => "PriceUnavailable",
            Error::Overflow { .. } => "Overflow",
            Error::Underflow { .. } => "Underflow",
            Error::Reentrancy => "Reentrancy",
            Error::Serialization(_) => "Serialization",
            Error::Deserialization(_) => "Deserialization",
            Error::Internal(_) => "Internal",
        }
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Validation errors: 1xxx
            Error::InvalidAmount => 1001,
            Error::AssetNotAllowed(_) => 1002,
            Error::LengthMismatch { .. } => 1003,
            Error::InvalidParameter { .. } => 1004,

            // Funds errors: 2xxx
            Error::InsufficientBalance { .. } => 2001,

            // Solvency errors: 3xxx
            Error::HealthFactorBroken { .. } => 3001,
            Error::HealthFactorOk { .. } => 3002,
            Error::HealthFactorNotImproved { .. } => 3003,

            // External call errors: 4xxx
            Error::TransferFailed { .. } => 4001,
            Error::MintFailed { .. } => 4002,
            Error::BurnFailed { .. } => 4003,

            // Oracle errors: 5xxx
            Error::StalePrice { .. } => 5001,
            Error::PriceUnavailable(_) => 5002,

            // Arithmetic errors: 6xxx
            Error::Overflow { .. } => 6001,
            Error::Underflow { .. } => 6002,

            // Internal errors: 9xxx
            Error::Reentrancy => 9001,
            Error::Serialization(_) => 9002,
            Error::Deserialization(_) => 9003,
            Error::Internal(_) => 9004,
        }
    }
}
