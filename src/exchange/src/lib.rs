//! # Summoner Exchange
//!
//! Peer-to-peer escrow exchange between an offered fungible resource
//! ("material") and gold, gated by ownership of identity tokens
//! ("summoners").
//!
//! ## Features
//!
//! - **Trade Store**: arena of every trade ever opened, indexed by
//!   `(resource, offeror)` with at most one active trade per key
//! - **Eligibility Gate**: identity-token control and tier check against an
//!   external registry, never cached
//! - **Atomic Fill**: both legs of a trade are escrowed before either is
//!   released, so a fill either moves both resources or nothing. A gold
//!   release that fails after delivery quarantines the trade until
//!   `complete_settlement` pays the offeror
//! - **Events**: trade-opened, trade-filled and trade-cancelled records,
//!   retained and broadcast
//!
//! ## Module Structure
//!
//! ```text
//! exchange/
//! ├── book/         - Trade store and trade counter
//! ├── config/       - Deployment parameters
//! ├── eligibility/  - Identity-token gate
//! ├── engine/       - Submit, inspect, fill, cancel
//! ├── events/       - Event records and broadcast
//! └── trade/        - Trade record and key
//! ```

pub mod book;
pub mod config;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod events;
pub mod trade;

pub use book::TradeBook;
pub use config::ExchangeConfig;
pub use eligibility::EligibilityGate;
pub use engine::Exchange;
pub use error::{ExchangeError, Result, SettlementSide};
pub use events::{EventLog, ExchangeEvent};
pub use trade::{Trade, TradeKey};
