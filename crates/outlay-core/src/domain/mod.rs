//! Domain entities and business logic
//!
//! This module contains the core domain types for Outlay:
//! - Newtypes for record identifiers and monetary amounts
//! - The expense entity with its validation rules
//! - Pending queue entries awaiting transmission to the remote
//! - The sync status state machine
//! - Domain-specific error types

pub mod errors;
pub mod expense;
pub mod newtypes;
pub mod pending;
pub mod sync_status;

// Re-export commonly used types
pub use errors::DomainError;
pub use expense::{Expense, ExpenseDraft, ExpensePatch};
pub use newtypes::*;
pub use pending::PendingEntry;
pub use sync_status::{SyncState, SyncStatus, OFFLINE_ERROR};
