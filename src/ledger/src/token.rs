//! In-memory fungible resource ledger
//!
//! Balances and allowances keyed by address, plus a table of pending
//! escrow holds. A hold has already left the owner's balance and consumed
//! the spender's allowance; releasing credits the recipient, refunding puts
//! both back.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use summoner_core::{
    Address, Amount, CoreError, EscrowHold, LedgerError, ResourceId, ResourceLedger, Result,
};
use tracing::debug;

#[derive(Debug, Clone)]
struct PendingHold {
    owner: Address,
    spender: Address,
    amount: Amount,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    holds: HashMap<u64, PendingHold>,
    next_hold_id: u64,
    total_supply: Amount,
}

impl LedgerState {
    fn balance(&self, owner: &Address) -> Amount {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn credit(&mut self, to: &Address, amount: Amount) -> std::result::Result<(), LedgerError> {
        let current = self.balance(to);
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(to.to_string()))?;
        self.balances.insert(to.clone(), updated);
        Ok(())
    }
}

/// Fungible ledger held entirely in memory
pub struct InMemoryLedger {
    resource_id: ResourceId,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// Create an empty ledger
    pub fn new(resource_id: impl Into<ResourceId>) -> Self {
        Self {
            resource_id: resource_id.into(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Create new units and credit them to `to`
    pub fn mint(&self, to: &Address, amount: Amount) -> Result<()> {
        let mut state = self.state.lock();
        let supply = state
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| CoreError::invalid("total supply overflow"))?;
        state.credit(to, amount)?;
        state.total_supply = supply;
        debug!(resource = %self.resource_id, to = %to, amount = %amount, "minted");
        Ok(())
    }

    /// Set the amount `spender` may move out of `owner`'s balance.
    /// Overwrites any previous allowance.
    pub fn approve(&self, owner: &Address, spender: &Address, amount: Amount) {
        let mut state = self.state.lock();
        if amount == 0 {
            state.allowances.remove(&(owner.clone(), spender.clone()));
        } else {
            state
                .allowances
                .insert((owner.clone(), spender.clone()), amount);
        }
        debug!(
            resource = %self.resource_id,
            owner = %owner,
            spender = %spender,
            amount = %amount,
            "allowance set"
        );
    }

    /// Owner-initiated transfer
    pub fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> std::result::Result<(), LedgerError> {
        let mut state = self.state.lock();
        let have = state.balance(from);
        if have < amount {
            return Err(LedgerError::InsufficientBalance { have, need: amount });
        }
        if from == to {
            return Ok(());
        }
        // Check the credit side before touching the debit side
        state
            .balance(to)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(to.to_string()))?;
        state.balances.insert(from.clone(), have - amount);
        state.credit(to, amount)
    }

    /// Total units ever minted
    pub fn total_supply(&self) -> Amount {
        self.state.lock().total_supply
    }

    /// Number of holds not yet released or refunded
    pub fn pending_holds(&self) -> usize {
        self.state.lock().holds.len()
    }

    /// Sum of all pending holds
    pub fn held_amount(&self) -> Amount {
        self.state.lock().holds.values().map(|h| h.amount).sum()
    }

    fn check_hold(&self, hold: &EscrowHold) -> std::result::Result<(), LedgerError> {
        if hold.resource != self.resource_id {
            return Err(LedgerError::ResourceMismatch {
                expected: self.resource_id.to_string(),
                actual: hold.resource.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceLedger for InMemoryLedger {
    fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    async fn balance_of(&self, owner: &Address) -> Result<Amount> {
        Ok(self.state.lock().balance(owner))
    }

    async fn allowance(&self, owner: &Address, spender: &Address) -> Result<Amount> {
        Ok(self.state.lock().allowance(owner, spender))
    }

    async fn escrow_from(
        &self,
        spender: &Address,
        from: &Address,
        amount: Amount,
    ) -> std::result::Result<EscrowHold, LedgerError> {
        let mut state = self.state.lock();

        let allowed = state.allowance(from, spender);
        if allowed < amount {
            return Err(LedgerError::InsufficientAllowance {
                have: allowed,
                need: amount,
            });
        }

        let balance = state.balance(from);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                have: balance,
                need: amount,
            });
        }

        state
            .allowances
            .insert((from.clone(), spender.clone()), allowed - amount);
        state.balances.insert(from.clone(), balance - amount);

        state.next_hold_id += 1;
        let id = state.next_hold_id;
        state.holds.insert(
            id,
            PendingHold {
                owner: from.clone(),
                spender: spender.clone(),
                amount,
            },
        );

        debug!(resource = %self.resource_id, hold = id, from = %from, amount = %amount, "escrow hold placed");
        Ok(EscrowHold::new(
            id,
            self.resource_id.clone(),
            from.clone(),
            spender.clone(),
            amount,
        ))
    }

    async fn release(&self, hold: &EscrowHold, to: &Address) -> std::result::Result<(), LedgerError> {
        self.check_hold(hold)?;
        let mut state = self.state.lock();
        let pending = state
            .holds
            .get(&hold.id)
            .cloned()
            .ok_or(LedgerError::UnknownHold(hold.id))?;

        state.credit(to, pending.amount)?;
        state.holds.remove(&hold.id);

        debug!(resource = %self.resource_id, hold = hold.id, to = %to, amount = %pending.amount, "escrow hold released");
        Ok(())
    }

    async fn refund(&self, hold: EscrowHold) -> std::result::Result<(), LedgerError> {
        self.check_hold(&hold)?;
        let mut state = self.state.lock();
        let pending = state
            .holds
            .remove(&hold.id)
            .ok_or(LedgerError::UnknownHold(hold.id))?;

        // The amount left this balance moments ago, so it fits back in
        let balance = state.balance(&pending.owner);
        state
            .balances
            .insert(pending.owner.clone(), balance.saturating_add(pending.amount));

        let allowed = state.allowance(&pending.owner, &pending.spender);
        state.allowances.insert(
            (pending.owner.clone(), pending.spender.clone()),
            allowed.saturating_add(pending.amount),
        );

        debug!(resource = %self.resource_id, hold = hold.id, owner = %pending.owner, "escrow hold refunded");
        Ok(())
    }
}
