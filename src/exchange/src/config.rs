//! Deployment parameters of an exchange

use crate::error::{ExchangeError, Result};
use serde::{Deserialize, Serialize};
use summoner_core::{Address, ResourceId};

/// Exchange configuration, fixed for the lifetime of an [`Exchange`](crate::Exchange)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Account the exchange acts as; offerors and buyers grant it allowances
    pub operator: Address,
    /// Address of the identity-token registry
    pub identity_registry: Address,
    /// Minimum identity-token level required to open or fill a trade
    #[serde(default = "default_min_tier")]
    pub min_identity_tier: u32,
    /// The gold ledger every trade is priced in
    pub gold: ResourceId,
}

fn default_min_tier() -> u32 {
    1
}

impl ExchangeConfig {
    pub fn new(
        operator: impl Into<Address>,
        identity_registry: impl Into<Address>,
        min_identity_tier: u32,
        gold: impl Into<ResourceId>,
    ) -> Self {
        Self {
            operator: operator.into(),
            identity_registry: identity_registry.into(),
            min_identity_tier,
            gold: gold.into(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.operator.is_empty() {
            return Err(ExchangeError::Configuration(
                "operator address must not be empty".to_string(),
            ));
        }
        if self.identity_registry.is_empty() {
            return Err(ExchangeError::Configuration(
                "identity registry address must not be empty".to_string(),
            ));
        }
        if self.gold.is_empty() {
            return Err(ExchangeError::Configuration(
                "gold ledger id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
