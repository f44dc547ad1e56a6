//! Ledger snapshots.
//!
//! [`Ledgers`] bundles the collateral and debt ledgers so the engine can
//! export its full accounting state. Both ledgers use ordered maps, so the
//! bincode encoding and its SHA-256 hash are deterministic.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::collateral::CollateralLedger;
use crate::core::debt::DebtLedger;
use crate::error::{Error, Result};

/// Collateral and debt ledgers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledgers {
    /// Deposited collateral
    pub collateral: CollateralLedger,
    /// Minted debt
    pub debt: DebtLedger,
}

impl Ledgers {
    /// Empty ledgers for a whitelist
    pub fn new(collateral: CollateralLedger) -> Self {
        Self {
            collateral,
            debt: DebtLedger::new(),
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize ledgers: {}", e)))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| Error::Deserialization(format!("Failed to deserialize ledgers: {}", e)))
    }

    /// SHA-256 over the serialized ledgers
    pub fn state_hash(&self) -> Result<[u8; 32]> {
        let bytes = self.to_bytes()?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hasher.finalize().into())
    }

    /// Hex-encoded state hash
    pub fn state_hash_hex(&self) -> Result<String> {
        Ok(hex::encode(self.state_hash()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::address::Address;

    fn sample() -> Ledgers {
        let weth = Address::derive("weth");
        let alice = Address::derive("alice");
        let mut ledgers = Ledgers::new(CollateralLedger::new(vec![weth]));
        ledgers.collateral.deposit(&alice, &weth, 10).unwrap();
        ledgers.debt.increase(&alice, 4).unwrap();
        ledgers
    }

    #[test]
    fn test_bytes_roundtrip() {
        let ledgers = sample();
        let bytes = ledgers.to_bytes().unwrap();
        assert_eq!(Ledgers::from_bytes(&bytes).unwrap(), ledgers);
    }

    #[test]
    fn test_state_hash_tracks_changes() {
        let mut ledgers = sample();
        let before = ledgers.state_hash().unwrap();
        assert_eq!(before, sample().state_hash().unwrap());

        ledgers.debt.increase(&Address::derive("alice"), 1).unwrap();
        assert_ne!(before, ledgers.state_hash().unwrap());
        assert_eq!(ledgers.state_hash_hex().unwrap().len(), 64);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(matches!(
            Ledgers::from_bytes(&[0xff, 0x01]),
            Err(Error::Deserialization(_))
        ));
    }
}
