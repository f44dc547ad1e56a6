//! Engine events.
//!
//! Committed operations append events to a bounded log. Reverted operations
//! emit nothing: events are staged in the transaction and only land here on
//! commit.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::utils::address::Address;
use crate::utils::constants::MAX_EVENTS;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// State changes reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Collateral credited to an account
    CollateralDeposited {
        /// Depositing account
        account: Address,
        /// Collateral asset
        asset: Address,
        /// Amount deposited
        amount: u128,
    },
    /// Collateral debited from an account and sent out
    CollateralRedeemed {
        /// Account whose deposit decreased
        from: Address,
        /// Recipient of the tokens
        to: Address,
        /// Collateral asset
        asset: Address,
        /// Amount redeemed
        amount: u128,
    },
    /// Synthetic units minted against an account's collateral
    DscMinted {
        /// Minting account
        account: Address,
        /// Amount minted
        amount: u128,
    },
    /// Debt repaid and the repaid units burned
    DscBurned {
        /// Account whose debt decreased
        on_behalf_of: Address,
        /// Account that supplied the units
        payer: Address,
        /// Amount burned
        amount: u128,
    },
    /// An unhealthy account was liquidated
    Liquidated {
        /// Liquidated account
        user: Address,
        /// Liquidating account
        liquidator: Address,
        /// Seized collateral asset
        asset: Address,
        /// Debt covered by the liquidator
        debt_covered: u128,
        /// Collateral sent to the liquidator, bonus included
        collateral_seized: u128,
        /// Bonus portion of `collateral_seized`
        bonus: u128,
    },
}

impl EngineEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CollateralDeposited { .. } => "CollateralDeposited",
            Self::CollateralRedeemed { .. } => "CollateralRedeemed",
            Self::DscMinted { .. } => "DscMinted",
            Self::DscBurned { .. } => "DscBurned",
            Self::Liquidated { .. } => "Liquidated",
        }
    }

    /// True if `account` took part in the event
    pub fn involves(&self, account: &Address) -> bool {
        match self {
            Self::CollateralDeposited { account: a, .. } | Self::DscMinted { account: a, .. } => {
                a == account
            }
            Self::CollateralRedeemed { from, to, .. } => from == account || to == account,
            Self::DscBurned {
                on_behalf_of,
                payer,
                ..
            } => on_behalf_of == account || payer == account,
            Self::Liquidated {
                user, liquidator, ..
            } => user == account || liquidator == account,
        }
    }
}

/// An event with its block context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Block height at commit
    pub block_height: u64,
    /// Block timestamp at commit
    pub timestamp: u64,
    /// The event
    pub event: EngineEvent,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded log of committed events, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    records: VecDeque<EventRecord>,
    max_events: usize,
    total_recorded: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create a log keeping the last [`MAX_EVENTS`] records
    pub fn new() -> Self {
        Self::with_capacity(MAX_EVENTS)
    }

    /// Create a log keeping the last `max_events` records
    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            records: VecDeque::new(),
            max_events: max_events.max(1),
            total_recorded: 0,
        }
    }

    /// Append a record, pruning the oldest past capacity
    pub fn push(&mut self, record: EventRecord) {
        self.records.push_back(record);
        self.total_recorded += 1;
        while self.records.len() > self.max_events {
            self.records.pop_front();
        }
    }

    /// Retained records
    pub fn records(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }

    /// Retained records of one type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&EventRecord> {
        self.records
            .iter()
            .filter(|r| r.event.event_type() == event_type)
            .collect()
    }

    /// Retained records involving `account`
    pub fn for_account(&self, account: &Address) -> Vec<&EventRecord> {
        self.records
            .iter()
            .filter(|r| r.event.involves(account))
            .collect()
    }

    /// Remove and return all retained records
    pub fn drain(&mut self) -> Vec<EventRecord> {
        self.records.drain(..).collect()
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ever appended, including pruned ones
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }
}
