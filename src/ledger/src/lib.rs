//! # Summoner Ledger
//!
//! In-memory collaborators for the summoner exchange.
//!
//! ## Features
//!
//! - **Identity Registry**: mint ("summon") identity tokens, level them up,
//!   approve single addresses or operators for all of an owner's tokens
//! - **Resource Ledger**: fungible balances with an allowance model and
//!   escrow holds for all-or-nothing settlement
//!
//! Both types are safe to share behind an `Arc` and serialize every call
//! through a single lock, so each call is atomic on its own.

pub mod registry;
pub mod token;

pub use registry::{InMemoryIdentityRegistry, Summoner};
pub use token::InMemoryLedger;
