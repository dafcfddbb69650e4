//! Trade record and its store key

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use summoner_core::{Address, Amount, IdentityId, ResourceId};

/// Key of the trade store: one active trade per resource and offeror
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeKey {
    pub resource: ResourceId,
    pub offeror: Address,
}

impl TradeKey {
    pub fn new(resource: ResourceId, offeror: Address) -> Self {
        Self { resource, offeror }
    }
}

/// An escrow offer: `amount` of the offered resource for `price` gold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Sequence number, unique and never reused
    pub trade_id: u64,
    /// Ledger of the resource being sold
    pub offered_resource_contract: ResourceId,
    /// Account that opened the trade
    pub offeror: Address,
    /// Gold requested, in the gold ledger's smallest unit
    #[serde(with = "summoner_core::types::amount")]
    pub price: Amount,
    /// Offered resource, in its ledger's smallest unit
    #[serde(with = "summoner_core::types::amount")]
    pub amount: Amount,
    /// Summoner the offeror qualified with
    pub offer_identity_id: IdentityId,
    /// Set exactly once by a successful fill
    pub fulfilled: bool,
    /// Set exactly once when the offeror withdraws the trade
    pub cancelled: bool,
    /// Resource delivered to `buyer` but gold not yet released to the
    /// offeror. Cleared when the settlement completes.
    #[serde(default)]
    pub quarantined: bool,
    /// Account that filled the trade
    pub buyer: Option<Address>,
    pub created_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Trade {
    pub(crate) fn open(
        trade_id: u64,
        key: TradeKey,
        price: Amount,
        amount: Amount,
        offer_identity_id: IdentityId,
    ) -> Self {
        Self {
            trade_id,
            offered_resource_contract: key.resource,
            offeror: key.offeror,
            price,
            amount,
            offer_identity_id,
            fulfilled: false,
            cancelled: false,
            quarantined: false,
            buyer: None,
            created_at: Utc::now(),
            filled_at: None,
            cancelled_at: None,
        }
    }

    /// Open for fills and cancellation
    pub fn is_active(&self) -> bool {
        !self.fulfilled && !self.cancelled && !self.quarantined
    }

    pub fn key(&self) -> TradeKey {
        TradeKey::new(self.offered_resource_contract.clone(), self.offeror.clone())
    }

    pub(crate) fn mark_fulfilled(&mut self, buyer: Address) {
        self.fulfilled = true;
        self.quarantined = false;
        self.buyer = Some(buyer);
        self.filled_at = Some(Utc::now());
    }

    pub(crate) fn mark_quarantined(&mut self, buyer: Address) {
        self.quarantined = true;
        self.buyer = Some(buyer);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
        self.cancelled_at = Some(Utc::now());
    }
}
