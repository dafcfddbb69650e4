//! Trade store
//!
//! Arena of every trade ever opened, indexed by `trade_id` (its position
//! plus one), and a key index pointing each `(resource, offeror)` pair at
//! its latest trade. Records are never removed.
//!
//! The book itself has no locking. [`Exchange`](crate::Exchange) keeps it
//! behind the lock that serializes every operation.

use crate::error::{ExchangeError, Result};
use crate::trade::{Trade, TradeKey};
use std::collections::HashMap;
use summoner_core::{Address, Amount, EscrowHold, IdentityId, ResourceId};

#[derive(Debug, Default)]
pub struct TradeBook {
    trades: Vec<Trade>,
    by_key: HashMap<TradeKey, u64>,
    /// Gold holds of quarantined trades, waiting to be released
    parked: HashMap<u64, EscrowHold>,
}

impl TradeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trades ever opened
    pub fn trades_count(&self) -> u64 {
        self.trades.len() as u64
    }

    /// Trade by id, active or not
    pub fn get(&self, trade_id: u64) -> Option<&Trade> {
        let idx = usize::try_from(trade_id.checked_sub(1)?).ok()?;
        self.trades.get(idx)
    }

    fn get_mut(&mut self, trade_id: u64) -> Option<&mut Trade> {
        let idx = usize::try_from(trade_id.checked_sub(1)?).ok()?;
        self.trades.get_mut(idx)
    }

    /// Latest trade for a key, active or not
    pub fn latest(&self, key: &TradeKey) -> Option<&Trade> {
        self.by_key.get(key).and_then(|id| self.get(*id))
    }

    /// Latest trade for a key, or `NoSuchTrade`
    pub fn lookup(&self, key: &TradeKey) -> Result<&Trade> {
        self.latest(key).ok_or_else(|| ExchangeError::NoSuchTrade {
            resource: key.resource.clone(),
            offeror: key.offeror.clone(),
        })
    }

    /// Latest trade for a key, provided it can still be filled or cancelled
    pub fn lookup_active(&self, key: &TradeKey) -> Result<&Trade> {
        let trade = self.lookup(key)?;
        ensure_active(trade)?;
        Ok(trade)
    }

    /// Open a new trade under `key`. Fails with `TradeAlreadyActive` while
    /// the key's latest trade is still open, and with `TradeQuarantined`
    /// while its settlement is incomplete.
    pub fn open(
        &mut self,
        key: TradeKey,
        price: Amount,
        amount: Amount,
        offer_identity_id: IdentityId,
    ) -> Result<&Trade> {
        if let Some(existing) = self.latest(&key) {
            if existing.is_active() {
                return Err(ExchangeError::TradeAlreadyActive {
                    trade_id: existing.trade_id,
                });
            }
            if existing.quarantined {
                return Err(ExchangeError::TradeQuarantined {
                    trade_id: existing.trade_id,
                });
            }
        }

        let trade_id = self.trades_count() + 1;
        self.by_key.insert(key.clone(), trade_id);
        self.trades
            .push(Trade::open(trade_id, key, price, amount, offer_identity_id));

        Ok(&self.trades[self.trades.len() - 1])
    }

    /// Mark an active or quarantined trade as filled by `buyer`
    pub fn fulfill(&mut self, trade_id: u64, buyer: Address) -> Result<&Trade> {
        let trade = self
            .get_mut(trade_id)
            .ok_or(ExchangeError::NoSuchTradeId(trade_id))?;
        if trade.fulfilled {
            return Err(ExchangeError::TradeAlreadyFulfilled { trade_id });
        }
        if trade.cancelled {
            return Err(ExchangeError::TradeCancelled { trade_id });
        }
        trade.mark_fulfilled(buyer);
        Ok(trade)
    }

    /// Take an active trade out of circulation after its resource leg was
    /// delivered to `buyer` but its gold leg was not
    pub fn quarantine(&mut self, trade_id: u64, buyer: Address) -> Result<&Trade> {
        let trade = self
            .get_mut(trade_id)
            .ok_or(ExchangeError::NoSuchTradeId(trade_id))?;
        ensure_active(trade)?;
        trade.mark_quarantined(buyer);
        Ok(trade)
    }

    /// Keep the unreleased gold hold of a quarantined trade
    pub fn park_hold(&mut self, trade_id: u64, hold: EscrowHold) {
        self.parked.insert(trade_id, hold);
    }

    pub fn take_parked_hold(&mut self, trade_id: u64) -> Option<EscrowHold> {
        self.parked.remove(&trade_id)
    }

    /// Withdraw the active trade under `key`
    pub fn cancel(&mut self, key: &TradeKey) -> Result<&Trade> {
        let trade_id = self.lookup_active(key)?.trade_id;
        let trade = self
            .get_mut(trade_id)
            .ok_or(ExchangeError::NoSuchTradeId(trade_id))?;
        trade.mark_cancelled();
        Ok(trade)
    }

    /// Active trades offering `resource`, oldest first
    pub fn active_for(&self, resource: &ResourceId) -> Vec<Trade> {
        self.trades
            .iter()
            .filter(|t| t.is_active() && &t.offered_resource_contract == resource)
            .cloned()
            .collect()
    }
}

fn ensure_active(trade: &Trade) -> Result<()> {
    let trade_id = trade.trade_id;
    if trade.fulfilled {
        return Err(ExchangeError::TradeAlreadyFulfilled { trade_id });
    }
    if trade.cancelled {
        return Err(ExchangeError::TradeCancelled { trade_id });
    }
    if trade.quarantined {
        return Err(ExchangeError::TradeQuarantined { trade_id });
    }
    Ok(())
}
