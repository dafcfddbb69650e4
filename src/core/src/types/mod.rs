//! Shared types for the summoner exchange

pub mod account;
pub mod amount;

// Re-export commonly used types
pub use account::{Address, IdentityId, ResourceId};
pub use amount::Amount;
