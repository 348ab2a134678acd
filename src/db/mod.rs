//! Persistence for wallet snapshots.
//!
//! This module provides:
//! - SQLite initialization, pragmas and migrations
//! - The `PersistenceAdapter` key-value seam with SQLite and in-memory stores
//! - The persisted JSON layout and its load/save helpers

pub mod migrations;
pub mod snapshot;
pub mod store;

pub use migrations::init_db;
pub use snapshot::{load_states, save_state, PersistedWalletState, WALLET_NAMESPACE};
pub use store::{MemoryStore, PersistenceAdapter, SqliteStore, StoreError};
