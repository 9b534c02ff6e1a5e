//! Outlay Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Expense`, `PendingEntry`, `SyncStatus`
//! - **Use cases** - `CreateExpenseUseCase`, `UpdateExpenseUseCase`, `ListExpensesUseCase`, `DeleteExpenseUseCase`
//! - **Port definitions** - Traits for adapters: `IRecordStore`, `ISyncStateRepository`,
//!   `IConnectivityProbe`, `ISyncGateway`, `ILocalWriteSink`
//! - **State machine** - Offline-first sync status transitions
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
