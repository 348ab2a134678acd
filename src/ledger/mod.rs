//! In-memory wallet state: the ledger and the purchase simulator.
//!
//! Both are plain synchronous structs. Serialization of writers and
//! persistence live in `backend::local`.

pub mod simulator;
pub mod wallet_ledger;

pub use simulator::{PurchaseSimulator, DEFAULT_FANCOINS_PER_DOLLAR};
pub use wallet_ledger::{default_starting_credits, WalletLedger, DEFAULT_STARTING_CREDITS};
