//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures, invalid state transitions and lookups
//! of records that do not exist.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Invalid monetary amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// The referenced expense does not exist in the record store
    #[error("Expense with id {0} not found")]
    ExpenseNotFound(String),

    /// A record could not be encoded into its sync payload
    #[error("Payload encoding failed: {0}")]
    PayloadEncoding(String),
}
