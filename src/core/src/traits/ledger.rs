//! Fungible resource ledger trait

use crate::error::{LedgerError, Result};
use crate::types::{Address, Amount, ResourceId};
use async_trait::async_trait;

/// Amount taken out of an owner's balance by a spender and parked until the
/// spender either releases it to a recipient or refunds it.
///
/// Holds are not `Clone`. A refund consumes the hold; a release borrows it
/// and the caller drops it once the release succeeds.
#[derive(Debug, PartialEq, Eq)]
pub struct EscrowHold {
    pub id: u64,
    pub resource: ResourceId,
    pub owner: Address,
    pub spender: Address,
    pub amount: Amount,
}

impl EscrowHold {
    pub fn new(id: u64, resource: ResourceId, owner: Address, spender: Address, amount: Amount) -> Self {
        Self {
            id,
            resource,
            owner,
            spender,
            amount,
        }
    }
}

/// Fungible ledger supporting owner-authorized transfer on behalf
#[async_trait]
pub trait ResourceLedger: Send + Sync {
    /// Identifier of this ledger
    fn resource_id(&self) -> &ResourceId;

    /// Spendable balance of `owner` (held amounts excluded)
    async fn balance_of(&self, owner: &Address) -> Result<Amount>;

    /// Amount `spender` may still move out of `owner`'s balance
    async fn allowance(&self, owner: &Address, spender: &Address) -> Result<Amount>;

    /// Move `amount` from `from` into a pending hold, consuming `spender`'s
    /// allowance. Leaves the ledger untouched on failure.
    async fn escrow_from(
        &self,
        spender: &Address,
        from: &Address,
        amount: Amount,
    ) -> std::result::Result<EscrowHold, LedgerError>;

    /// Credit a held amount to `to`. On failure the hold stays pending and
    /// the caller keeps it, so it can still be refunded or released again.
    async fn release(&self, hold: &EscrowHold, to: &Address) -> std::result::Result<(), LedgerError>;

    /// Return a held amount to its owner and restore the spender's allowance
    async fn refund(&self, hold: EscrowHold) -> std::result::Result<(), LedgerError>;
}
