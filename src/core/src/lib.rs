//! # Summoner Core
//!
//! Shared value types, collaborator traits and error handling for the
//! summoner exchange. The exchange engine, the reference ledgers and the
//! node binary all depend on this crate and nothing else in the workspace.

pub mod types;
pub mod traits;
pub mod error;

// Re-export commonly used types
pub use error::{CoreError, LedgerError, Result};
pub use traits::{EscrowHold, IdentityRegistry, ResourceLedger};
pub use types::{Address, Amount, IdentityId, ResourceId};
