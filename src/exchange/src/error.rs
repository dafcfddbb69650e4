//! Error types for the exchange module
//!
//! Every error aborts the operation that raised it with no state change.

use serde::{Deserialize, Serialize};
use std::fmt;
use summoner_core::{Address, CoreError, IdentityId, LedgerError, ResourceId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Which leg of a fill failed its custody check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementSide {
    /// Buyer's gold
    Buyer,
    /// Offeror's offered resource
    Offeror,
}

impl fmt::Display for SettlementSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementSide::Buyer => write!(f, "buyer"),
            SettlementSide::Offeror => write!(f, "offeror"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Ineligible caller: {caller} does not qualify with summoner {identity}")]
    IneligibleCaller { caller: Address, identity: IdentityId },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Trade {trade_id} is still active for this resource and offeror")]
    TradeAlreadyActive { trade_id: u64 },

    #[error("No trade for resource {resource} offered by {offeror}")]
    NoSuchTrade { resource: ResourceId, offeror: Address },

    #[error("No trade with id {0}")]
    NoSuchTradeId(u64),

    #[error("Trade {trade_id} is already fulfilled")]
    TradeAlreadyFulfilled { trade_id: u64 },

    #[error("Trade {trade_id} was cancelled")]
    TradeCancelled { trade_id: u64 },

    #[error("Trade {trade_id} is quarantined until its settlement completes")]
    TradeQuarantined { trade_id: u64 },

    #[error("Trade {trade_id} is not awaiting settlement")]
    TradeNotQuarantined { trade_id: u64 },

    #[error("Trade {trade_id} settlement incomplete: resource delivered, gold still held: {source}")]
    SettlementIncomplete { trade_id: u64, source: LedgerError },

    #[error("Insufficient {side} allowance or balance: {source}")]
    InsufficientAllowanceOrBalance {
        side: SettlementSide,
        source: LedgerError,
    },

    #[error("Unknown resource: {0}")]
    UnknownResource(ResourceId),

    #[error("Offeror cannot fill its own trade")]
    SelfTrade,

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<CoreError> for ExchangeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Ledger(e) => ExchangeError::Ledger(e),
            CoreError::Configuration(msg) => ExchangeError::Configuration(msg),
            other => ExchangeError::Registry(other.to_string()),
        }
    }
}
