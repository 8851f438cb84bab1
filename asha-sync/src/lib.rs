//! Offline-first synchronization engine for the ASHA field app
//!
//! Provides:
//! - A typed entity store persisted as one versioned record (SQLite or memory)
//! - Optimistic mutations with a durable, retrying sync queue
//! - Concurrent per-slice reconciliation with the REST API
//! - A connectivity controller for online transitions and periodic refresh

pub mod config;
pub mod connectivity;
pub mod engine;
pub mod entities;
pub mod error;
pub mod gateway;
pub mod http_gateway;
pub mod persistence;
pub mod queue;
pub mod reconcile;
pub mod store;
mod wire;

pub use config::SyncConfig;
pub use connectivity::{ConnectivityController, ConnectivityEvent, ControllerHandle};
pub use engine::{EngineStatus, MutationOutcome, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use gateway::{GatewayError, GatewayResult, RemoteGateway};
pub use http_gateway::HttpGateway;
pub use persistence::{HydrationOutcome, MemoryStateStore, SqliteStateStore, StateStore};
pub use queue::{DeadLetter, Operation, OperationKind, ReplayReport, SyncQueueItem};
pub use reconcile::{ReconcileOutcome, ReconcileReport};
pub use store::{AppState, Collection, EntityStore, Slice};
