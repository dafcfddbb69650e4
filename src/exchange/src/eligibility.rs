//! Identity-token eligibility gate
//!
//! A caller qualifies with a summoner when the registry reports the caller
//! as controlling it (owner, approved address or operator) and the
//! summoner's level reaches the configured tier. The registry is queried on
//! every check; nothing is cached, so a transferred summoner stops
//! qualifying its previous owner immediately.

use crate::error::{ExchangeError, Result};
use summoner_core::{Address, IdentityId, IdentityRegistry};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct EligibilityGate {
    min_tier: u32,
}

impl EligibilityGate {
    pub fn new(min_tier: u32) -> Self {
        Self { min_tier }
    }

    pub fn min_tier(&self) -> u32 {
        self.min_tier
    }

    /// Passes iff `caller` controls `identity` and it is at least `min_tier`
    pub async fn check(
        &self,
        registry: &dyn IdentityRegistry,
        caller: &Address,
        identity: IdentityId,
    ) -> Result<()> {
        let ineligible = || ExchangeError::IneligibleCaller {
            caller: caller.clone(),
            identity,
        };

        if !registry.is_authorized(caller, identity).await? {
            debug!(caller = %caller, summoner = %identity, "caller does not control summoner");
            return Err(ineligible());
        }

        let level = registry.level(identity).await?.unwrap_or(0);
        if level < self.min_tier {
            debug!(
                caller = %caller,
                summoner = %identity,
                level,
                min_tier = self.min_tier,
                "summoner below required tier"
            );
            return Err(ineligible());
        }

        Ok(())
    }
}
