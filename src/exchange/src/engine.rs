//! Exchange engine
//!
//! Every operation runs to completion while holding the trade book lock,
//! so submits, fills and cancels are strictly ordered and never interleave.
//! A fill escrows both legs before releasing either, then releases the
//! resource leg while the gold is still held. Any failure up to that point
//! refunds both holds and leaves the trade open. If the gold release fails
//! after the resource was delivered, the trade is quarantined with its gold
//! hold parked until [`Exchange::complete_settlement`] succeeds.

use crate::book::TradeBook;
use crate::config::ExchangeConfig;
use crate::eligibility::EligibilityGate;
use crate::error::{ExchangeError, Result, SettlementSide};
use crate::events::{EventLog, ExchangeEvent};
use crate::trade::{Trade, TradeKey};
use std::collections::HashMap;
use std::sync::Arc;
use summoner_core::{
    Address, Amount, EscrowHold, IdentityId, IdentityRegistry, LedgerError, ResourceId,
    ResourceLedger,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

/// Escrow exchange between offered resources and gold
pub struct Exchange {
    config: ExchangeConfig,
    gate: EligibilityGate,
    registry: Arc<dyn IdentityRegistry>,
    gold: Arc<dyn ResourceLedger>,
    resources: HashMap<ResourceId, Arc<dyn ResourceLedger>>,
    book: Mutex<TradeBook>,
    events: EventLog,
}

/// Why a settlement stopped short
enum Settlement {
    /// Every hold was refunded; nothing moved
    RolledBack(ExchangeError),
    /// The resource reached the buyer but the gold hold could not be
    /// released to the offeror
    GoldPending {
        hold: EscrowHold,
        source: LedgerError,
    },
}

async fn refund_leg(ledger: &dyn ResourceLedger, hold: EscrowHold, trade_id: u64) {
    let resource = ledger.resource_id().clone();
    if let Err(e) = ledger.refund(hold).await {
        error!(trade_id, resource = %resource, error = %e, "refund of escrow hold failed");
    }
}

impl Exchange {
    /// Deploy an exchange. The gold ledger must match `config.gold`.
    pub fn new(
        config: ExchangeConfig,
        registry: Arc<dyn IdentityRegistry>,
        gold: Arc<dyn ResourceLedger>,
    ) -> Result<Self> {
        config.validate()?;
        if gold.resource_id() != &config.gold {
            return Err(ExchangeError::Configuration(format!(
                "gold ledger is {}, configuration expects {}",
                gold.resource_id(),
                config.gold
            )));
        }

        info!(
            operator = %config.operator,
            registry = %config.identity_registry,
            min_tier = config.min_identity_tier,
            gold = %config.gold,
            "exchange deployed"
        );

        Ok(Self {
            gate: EligibilityGate::new(config.min_identity_tier),
            config,
            registry,
            gold,
            resources: HashMap::new(),
            book: Mutex::new(TradeBook::new()),
            events: EventLog::new(),
        })
    }

    /// Make a resource ledger tradable
    pub fn register_resource(&mut self, ledger: Arc<dyn ResourceLedger>) -> Result<()> {
        let id = ledger.resource_id().clone();
        if id == self.config.gold {
            return Err(ExchangeError::Configuration(
                "gold cannot be offered for gold".to_string(),
            ));
        }
        if self.resources.contains_key(&id) {
            return Err(ExchangeError::Configuration(format!(
                "resource {} already registered",
                id
            )));
        }
        info!(resource = %id, "resource registered");
        self.resources.insert(id, ledger);
        Ok(())
    }

    /// Builder form of [`register_resource`](Self::register_resource)
    pub fn with_resource(mut self, ledger: Arc<dyn ResourceLedger>) -> Result<Self> {
        self.register_resource(ledger)?;
        Ok(self)
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    fn resource_ledger(&self, resource: &ResourceId) -> Result<&Arc<dyn ResourceLedger>> {
        self.resources
            .get(resource)
            .ok_or_else(|| ExchangeError::UnknownResource(resource.clone()))
    }

    /// Open a trade selling `amount` of `resource` for `price` gold.
    ///
    /// Nothing moves yet: the caller must separately allow the operator to
    /// spend `amount` of `resource`, which is only checked at fill time.
    pub async fn submit_trade(
        &self,
        caller: &Address,
        resource: &ResourceId,
        price: Amount,
        amount: Amount,
        offer_identity_id: IdentityId,
    ) -> Result<Trade> {
        let mut book = self.book.lock().await;

        self.gate
            .check(self.registry.as_ref(), caller, offer_identity_id)
            .await?;

        if price == 0 {
            return Err(ExchangeError::InvalidAmount("price must be positive".to_string()));
        }
        if amount == 0 {
            return Err(ExchangeError::InvalidAmount("amount must be positive".to_string()));
        }
        self.resource_ledger(resource)?;

        let key = TradeKey::new(resource.clone(), caller.clone());
        let trade = match book.open(key, price, amount, offer_identity_id) {
            Ok(trade) => trade.clone(),
            Err(e) => {
                warn!(offeror = %caller, resource = %resource, error = %e, "submit rejected");
                return Err(e);
            }
        };

        self.events.emit(ExchangeEvent::TradeOpened {
            trade_id: trade.trade_id,
            resource: resource.clone(),
            offeror: caller.clone(),
            price,
            amount,
        });

        Ok(trade)
    }

    /// Latest trade for `(resource, offeror)`, including fulfilled and
    /// cancelled ones. Callers check `fulfilled` themselves.
    pub async fn get_trade_information(
        &self,
        resource: &ResourceId,
        offeror: &Address,
    ) -> Result<Trade> {
        let book = self.book.lock().await;
        book.lookup(&TradeKey::new(resource.clone(), offeror.clone()))
            .cloned()
    }

    /// Fill the open trade of `offeror` for `resource`: `price` gold moves
    /// from the caller to the offeror and `amount` of the resource moves
    /// from the offeror to the caller, or nothing moves at all.
    ///
    /// The one exception is a gold release failing after the resource was
    /// delivered: the trade is then quarantined and `SettlementIncomplete`
    /// is returned.
    pub async fn buy_trade(
        &self,
        caller: &Address,
        resource: &ResourceId,
        offeror: &Address,
        buyer_identity_id: IdentityId,
    ) -> Result<Trade> {
        let mut book = self.book.lock().await;

        self.gate
            .check(self.registry.as_ref(), caller, buyer_identity_id)
            .await?;

        let key = TradeKey::new(resource.clone(), offeror.clone());
        let trade = book.lookup_active(&key)?.clone();
        if caller == offeror {
            return Err(ExchangeError::SelfTrade);
        }
        let material = self.resource_ledger(resource)?;

        debug!(trade_id = trade.trade_id, buyer = %caller, "escrowing both legs");
        match self.settle(&trade, caller, material.as_ref()).await {
            Ok(()) => {}
            Err(Settlement::RolledBack(e)) => return Err(e),
            Err(Settlement::GoldPending { hold, source }) => {
                book.park_hold(trade.trade_id, hold);
                book.quarantine(trade.trade_id, caller.clone())?;
                self.events.emit(ExchangeEvent::TradeQuarantined {
                    trade_id: trade.trade_id,
                    resource: resource.clone(),
                    buyer: caller.clone(),
                    offeror: offeror.clone(),
                });
                return Err(ExchangeError::SettlementIncomplete {
                    trade_id: trade.trade_id,
                    source,
                });
            }
        }

        let filled = book.fulfill(trade.trade_id, caller.clone())?.clone();
        self.emit_filled(&filled);

        Ok(filled)
    }

    fn emit_filled(&self, trade: &Trade) {
        if let Some(buyer) = &trade.buyer {
            self.events.emit(ExchangeEvent::TradeFilled {
                trade_id: trade.trade_id,
                resource: trade.offered_resource_contract.clone(),
                buyer: buyer.clone(),
                offeror: trade.offeror.clone(),
                price: trade.price,
                amount: trade.amount,
            });
        }
    }

    /// Escrow gold from the buyer and the resource from the offeror, then
    /// release the resource to the buyer and the gold to the offeror.
    ///
    /// Until the resource release succeeds every failure refunds both
    /// holds. A failed gold release after that hands the gold hold back to
    /// the caller.
    async fn settle(
        &self,
        trade: &Trade,
        buyer: &Address,
        material: &dyn ResourceLedger,
    ) -> std::result::Result<(), Settlement> {
        let operator = &self.config.operator;
        let trade_id = trade.trade_id;

        let gold_hold = self
            .gold
            .escrow_from(operator, buyer, trade.price)
            .await
            .map_err(|source| {
                warn!(trade_id, buyer = %buyer, error = %source, "buyer custody check failed");
                Settlement::RolledBack(ExchangeError::InsufficientAllowanceOrBalance {
                    side: SettlementSide::Buyer,
                    source,
                })
            })?;

        let material_hold = match material
            .escrow_from(operator, &trade.offeror, trade.amount)
            .await
        {
            Ok(hold) => hold,
            Err(source) => {
                warn!(trade_id, offeror = %trade.offeror, error = %source, "offeror custody check failed");
                refund_leg(self.gold.as_ref(), gold_hold, trade_id).await;
                return Err(Settlement::RolledBack(
                    ExchangeError::InsufficientAllowanceOrBalance {
                        side: SettlementSide::Offeror,
                        source,
                    },
                ));
            }
        };

        // Resource first: gold is still only held and can go back
        if let Err(e) = material.release(&material_hold, buyer).await {
            warn!(trade_id, error = %e, "resource release failed, refunding both legs");
            refund_leg(material, material_hold, trade_id).await;
            refund_leg(self.gold.as_ref(), gold_hold, trade_id).await;
            return Err(Settlement::RolledBack(e.into()));
        }

        if let Err(source) = self.gold.release(&gold_hold, &trade.offeror).await {
            error!(
                trade_id,
                offeror = %trade.offeror,
                error = %source,
                "gold release failed after resource delivery"
            );
            return Err(Settlement::GoldPending {
                hold: gold_hold,
                source,
            });
        }

        Ok(())
    }

    /// Retry the gold release of a quarantined trade. On success the trade
    /// becomes fulfilled and a trade-filled event is emitted.
    pub async fn complete_settlement(&self, trade_id: u64) -> Result<Trade> {
        let mut book = self.book.lock().await;
        let trade = book
            .get(trade_id)
            .cloned()
            .ok_or(ExchangeError::NoSuchTradeId(trade_id))?;
        let buyer = match (&trade.buyer, trade.quarantined) {
            (Some(buyer), true) => buyer.clone(),
            _ => return Err(ExchangeError::TradeNotQuarantined { trade_id }),
        };
        let hold = book
            .take_parked_hold(trade_id)
            .ok_or(ExchangeError::TradeNotQuarantined { trade_id })?;

        if let Err(source) = self.gold.release(&hold, &trade.offeror).await {
            warn!(trade_id, error = %source, "gold release retry failed");
            book.park_hold(trade_id, hold);
            return Err(ExchangeError::SettlementIncomplete { trade_id, source });
        }

        let filled = book.fulfill(trade_id, buyer)?.clone();
        info!(trade_id, "quarantined settlement completed");
        self.emit_filled(&filled);

        Ok(filled)
    }

    /// Withdraw the caller's open trade for `resource`
    pub async fn cancel_trade(&self, caller: &Address, resource: &ResourceId) -> Result<Trade> {
        let mut book = self.book.lock().await;
        let key = TradeKey::new(resource.clone(), caller.clone());
        let trade = book.cancel(&key)?.clone();

        self.events.emit(ExchangeEvent::TradeCancelled {
            trade_id: trade.trade_id,
            resource: resource.clone(),
            offeror: caller.clone(),
        });

        Ok(trade)
    }

    /// Number of trades ever opened
    pub async fn trades(&self) -> u64 {
        self.book.lock().await.trades_count()
    }

    /// Historical lookup by id
    pub async fn trade_by_id(&self, trade_id: u64) -> Result<Trade> {
        self.book
            .lock()
            .await
            .get(trade_id)
            .cloned()
            .ok_or(ExchangeError::NoSuchTradeId(trade_id))
    }

    /// Open trades offering `resource`, oldest first
    pub async fn active_trades(&self, resource: &ResourceId) -> Vec<Trade> {
        self.book.lock().await.active_for(resource)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.events.subscribe()
    }

    /// Every event emitted so far, in order
    pub fn events(&self) -> Vec<ExchangeEvent> {
        self.events.snapshot()
    }
}
