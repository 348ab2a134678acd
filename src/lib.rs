pub mod api;
pub mod backend;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ledger;

pub use backend::{RemoteError, RemoteWalletService, SimulatedWalletService, WalletService, WalletSettings};
pub use config::{BackendMode, Config};
pub use db::{init_db, MemoryStore, PersistenceAdapter, SqliteStore};
pub use domain::{
    BonusInfo, Currency, Decimal, PaymentMethod, Purchase, PurchaseId, PurchaseStatus, UserId,
    Wallet,
};
pub use error::{AppError, WalletError};
pub use ledger::{PurchaseSimulator, WalletLedger};
