//! In-memory identity-token ("summoner") registry
//!
//! Ownership follows the usual non-fungible token rules: the owner or an
//! approved-for-all operator may approve a single address per token, and
//! any authorized party may transfer it. Transfers clear the single
//! approval.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use summoner_core::{Address, CoreError, IdentityId, IdentityRegistry, Result};
use tracing::{debug, info};

/// A minted identity token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summoner {
    pub id: IdentityId,
    pub owner: Address,
    pub class: u32,
    pub level: u32,
}

#[derive(Debug, Default)]
struct RegistryState {
    summoners: Vec<Summoner>,
    approvals: HashMap<IdentityId, Address>,
    operators: HashSet<(Address, Address)>,
}

impl RegistryState {
    fn get(&self, id: IdentityId) -> Result<&Summoner> {
        usize::try_from(id.value())
            .ok()
            .and_then(|idx| self.summoners.get(idx))
            .ok_or_else(|| CoreError::registry(format!("summoner {} does not exist", id)))
    }

    fn get_mut(&mut self, id: IdentityId) -> Result<&mut Summoner> {
        usize::try_from(id.value())
            .ok()
            .and_then(|idx| self.summoners.get_mut(idx))
            .ok_or_else(|| CoreError::registry(format!("summoner {} does not exist", id)))
    }

    fn authorized(&self, operator: &Address, summoner: &Summoner) -> bool {
        &summoner.owner == operator
            || self.approvals.get(&summoner.id) == Some(operator)
            || self
                .operators
                .contains(&(summoner.owner.clone(), operator.clone()))
    }
}

/// Identity registry held entirely in memory
#[derive(Default)]
pub struct InMemoryIdentityRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new level-1 summoner for `owner`. Ids start at 0.
    pub fn summon(&self, owner: &Address, class: u32) -> IdentityId {
        let mut state = self.state.write();
        let id = IdentityId::new(state.summoners.len() as u64);
        state.summoners.push(Summoner {
            id,
            owner: owner.clone(),
            class,
            level: 1,
        });
        info!(summoner = %id, owner = %owner, class, "summoned");
        id
    }

    /// Raise a summoner's level by one; the caller must control it
    pub fn level_up(&self, caller: &Address, id: IdentityId) -> Result<u32> {
        let mut state = self.state.write();
        let summoner = state.get(id)?;
        if !state.authorized(caller, summoner) {
            return Err(CoreError::registry(format!(
                "{} does not control summoner {}",
                caller, id
            )));
        }
        let summoner = state.get_mut(id)?;
        summoner.level += 1;
        debug!(summoner = %id, level = summoner.level, "level up");
        Ok(summoner.level)
    }

    /// Force a summoner's level, bypassing ownership checks
    pub fn set_level(&self, id: IdentityId, level: u32) -> Result<()> {
        let mut state = self.state.write();
        state.get_mut(id)?.level = level;
        Ok(())
    }

    /// Approve `to` for a single summoner. Only the owner or one of its
    /// operators may approve.
    pub fn approve(&self, caller: &Address, to: &Address, id: IdentityId) -> Result<()> {
        let mut state = self.state.write();
        let owner = state.get(id)?.owner.clone();
        if &owner != caller && !state.operators.contains(&(owner.clone(), caller.clone())) {
            return Err(CoreError::registry(format!(
                "{} may not approve summoner {}",
                caller, id
            )));
        }
        state.approvals.insert(id, to.clone());
        debug!(summoner = %id, approved = %to, "approval set");
        Ok(())
    }

    /// Grant or revoke `operator` control over every summoner of `owner`
    pub fn set_approval_for_all(&self, owner: &Address, operator: &Address, approved: bool) {
        let mut state = self.state.write();
        let key = (owner.clone(), operator.clone());
        if approved {
            state.operators.insert(key);
        } else {
            state.operators.remove(&key);
        }
        debug!(owner = %owner, operator = %operator, approved, "operator approval");
    }

    /// Move a summoner to a new owner
    pub fn transfer(&self, caller: &Address, to: &Address, id: IdentityId) -> Result<()> {
        let mut state = self.state.write();
        let summoner = state.get(id)?;
        if !state.authorized(caller, summoner) {
            return Err(CoreError::registry(format!(
                "{} does not control summoner {}",
                caller, id
            )));
        }
        state.approvals.remove(&id);
        let summoner = state.get_mut(id)?;
        let from = std::mem::replace(&mut summoner.owner, to.clone());
        info!(summoner = %id, from = %from, to = %to, "summoner transferred");
        Ok(())
    }

    /// Snapshot of a summoner
    pub fn summoner(&self, id: IdentityId) -> Result<Summoner> {
        self.state.read().get(id).cloned()
    }

    /// Number of summoners ever minted
    pub fn count(&self) -> usize {
        self.state.read().summoners.len()
    }
}

#[async_trait]
impl IdentityRegistry for InMemoryIdentityRegistry {
    async fn owner_of(&self, id: IdentityId) -> Result<Option<Address>> {
        Ok(self.state.read().get(id).ok().map(|s| s.owner.clone()))
    }

    async fn is_authorized(&self, operator: &Address, id: IdentityId) -> Result<bool> {
        let state = self.state.read();
        Ok(state
            .get(id)
            .map(|s| state.authorized(operator, s))
            .unwrap_or(false))
    }

    async fn level(&self, id: IdentityId) -> Result<Option<u32>> {
        Ok(self.state.read().get(id).ok().map(|s| s.level))
    }
}
