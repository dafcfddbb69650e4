//! Identity registry trait

use crate::error::Result;
use crate::types::{Address, IdentityId};
use async_trait::async_trait;

/// Read-only view of the identity-token ("summoner") registry
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    /// Current owner of an identity token, `None` if it was never minted
    async fn owner_of(&self, id: IdentityId) -> Result<Option<Address>>;

    /// Whether `operator` controls `id`: it owns the token, is its approved
    /// address, or is an approved-for-all operator of the owner
    async fn is_authorized(&self, operator: &Address, id: IdentityId) -> Result<bool>;

    /// Tier of an identity token, `None` if it was never minted
    async fn level(&self, id: IdentityId) -> Result<Option<u32>>;
}
