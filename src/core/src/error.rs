//! Unified error types for the summoner exchange
//!
//! `LedgerError` is what a resource ledger reports when a transfer on
//! behalf cannot happen; `CoreError` covers everything else a collaborator
//! can fail with.

use crate::types::Amount;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Transfer-on-behalf failures reported by a resource ledger
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: Amount, need: Amount },

    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },

    #[error("Unknown escrow hold: {0}")]
    UnknownHold(u64),

    #[error("Hold belongs to ledger {expected}, not {actual}")]
    ResourceMismatch { expected: String, actual: String },

    #[error("Amount overflow crediting {0}")]
    Overflow(String),
}

/// Core error type for collaborators
#[derive(Debug, Error)]
pub enum CoreError {
    /// Identity registry errors
    #[error("Registry error: {0}")]
    Registry(String),

    /// Resource ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input/state
    #[error("Invalid: {0}")]
    Invalid(String),
}

impl CoreError {
    /// Create a registry error
    pub fn registry<S: Into<String>>(msg: S) -> Self {
        CoreError::Registry(msg.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        CoreError::Configuration(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        CoreError::NotFound(msg.into())
    }

    /// Create an invalid error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        CoreError::Invalid(msg.into())
    }
}
