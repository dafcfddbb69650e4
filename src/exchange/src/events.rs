//! Observable exchange events
//!
//! Each event is logged, appended to a retained log and broadcast to live
//! subscribers. Slow or absent subscribers never fail an operation.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use summoner_core::{Address, Amount, ResourceId};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Broadcast buffer per subscriber
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExchangeEvent {
    TradeOpened {
        trade_id: u64,
        resource: ResourceId,
        offeror: Address,
        #[serde(with = "summoner_core::types::amount")]
        price: Amount,
        #[serde(with = "summoner_core::types::amount")]
        amount: Amount,
    },
    TradeFilled {
        trade_id: u64,
        resource: ResourceId,
        buyer: Address,
        offeror: Address,
        #[serde(with = "summoner_core::types::amount")]
        price: Amount,
        #[serde(with = "summoner_core::types::amount")]
        amount: Amount,
    },
    TradeCancelled {
        trade_id: u64,
        resource: ResourceId,
        offeror: Address,
    },
    /// Resource delivered, gold release pending
    TradeQuarantined {
        trade_id: u64,
        resource: ResourceId,
        buyer: Address,
        offeror: Address,
    },
}

impl ExchangeEvent {
    pub fn trade_id(&self) -> u64 {
        match self {
            ExchangeEvent::TradeOpened { trade_id, .. }
            | ExchangeEvent::TradeFilled { trade_id, .. }
            | ExchangeEvent::TradeCancelled { trade_id, .. }
            | ExchangeEvent::TradeQuarantined { trade_id, .. } => *trade_id,
        }
    }
}

pub struct EventLog {
    log: Mutex<Vec<ExchangeEvent>>,
    sender: broadcast::Sender<ExchangeEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            log: Mutex::new(Vec::new()),
            sender,
        }
    }

    pub fn emit(&self, event: ExchangeEvent) {
        match &event {
            ExchangeEvent::TradeOpened {
                trade_id,
                resource,
                offeror,
                price,
                amount,
            } => info!(
                trade_id,
                resource = %resource,
                offeror = %offeror,
                price = %price,
                amount = %amount,
                "trade opened"
            ),
            ExchangeEvent::TradeFilled {
                trade_id,
                resource,
                buyer,
                offeror,
                price,
                amount,
            } => info!(
                trade_id,
                resource = %resource,
                buyer = %buyer,
                offeror = %offeror,
                price = %price,
                amount = %amount,
                "trade filled"
            ),
            ExchangeEvent::TradeCancelled {
                trade_id,
                resource,
                offeror,
            } => info!(trade_id, resource = %resource, offeror = %offeror, "trade cancelled"),
            ExchangeEvent::TradeQuarantined {
                trade_id,
                resource,
                buyer,
                offeror,
            } => warn!(
                trade_id,
                resource = %resource,
                buyer = %buyer,
                offeror = %offeror,
                "trade quarantined"
            ),
        }

        self.log.lock().push(event.clone());
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> Vec<ExchangeEvent> {
        self.log.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
