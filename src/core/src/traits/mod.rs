//! Collaborator traits for the summoner exchange
//!
//! The exchange never owns identity tokens or resource balances. It only
//! queries and instructs the collaborators behind these traits.

pub mod ledger;
pub mod registry;

// Re-export commonly used traits
pub use ledger::{EscrowHold, ResourceLedger};
pub use registry::IdentityRegistry;
