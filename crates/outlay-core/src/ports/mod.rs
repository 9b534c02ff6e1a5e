//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRecordStore`] - Local expense storage
//! - [`ISyncStateRepository`] - Persisted pending queue and sync status
//! - [`IConnectivityProbe`] - Network reachability signal
//! - [`ISyncGateway`] - All-or-nothing bulk upsert to the remote
//! - [`ILocalWriteSink`] - Hands local writes to the sync engine
//! - [`ISyncStatusObserver`] - Status change callbacks for the UI

pub mod connectivity;
pub mod local_write;
pub mod record_store;
pub mod status_observer;
pub mod sync_gateway;
pub mod sync_state_repository;

pub use connectivity::IConnectivityProbe;
pub use local_write::ILocalWriteSink;
pub use record_store::IRecordStore;
pub use status_observer::ISyncStatusObserver;
pub use sync_gateway::ISyncGateway;
pub use sync_state_repository::ISyncStateRepository;
