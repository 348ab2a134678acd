//! Wallet backends behind one interface.
//!
//! `SimulatedWalletService` runs the ledger and purchase simulator locally;
//! `RemoteWalletService` forwards the same calls to a live wallet API. Callers
//! hold an `Arc<dyn WalletService>` and cannot tell which one is active.

use crate::domain::{BonusInfo, Decimal, PaymentMethod, Purchase, UserId, Wallet};
use crate::error::WalletError;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod local;
pub mod remote;

pub use local::{SimulatedWalletService, WalletSettings};
pub use remote::RemoteWalletService;

#[async_trait]
pub trait WalletService: Send + Sync + fmt::Debug {
    /// Current balances for a user.
    async fn fetch_wallet(&self, user_id: UserId) -> Result<Wallet, WalletError>;

    /// Buy in-app currency for `amount` USD.
    async fn purchase(
        &self,
        user_id: UserId,
        amount: Decimal,
        payment_method: PaymentMethod,
    ) -> Result<Purchase, WalletError>;

    /// Purchases for a user, oldest first.
    async fn get_history(&self, user_id: UserId) -> Result<Vec<Purchase>, WalletError>;

    /// Active bonus policy.
    async fn get_bonus_info(&self) -> Result<BonusInfo, WalletError>;

    /// Create the user's wallet with the starting grant if it does not exist.
    /// Idempotent.
    async fn initialize(&self, user_id: UserId) -> Result<Wallet, WalletError>;

    /// Spend Trading Credits, e.g. to open a position.
    async fn debit(&self, user_id: UserId, amount: Decimal) -> Result<Wallet, WalletError>;

    /// Short backend label for logs and health output.
    fn kind(&self) -> &'static str;
}

/// Failure talking to the live wallet backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Connection refused, DNS failure, reset.
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    /// Non-2xx response that is not a wallet domain error.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    /// Unreadable response body.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl RemoteError {
    /// 5xx, 429, timeouts and connection failures are worth retrying; other
    /// 4xx and malformed bodies are not.
    pub fn is_retriable(&self) -> bool {
        match self {
            RemoteError::Network(_) | RemoteError::Timeout => true,
            RemoteError::Http { status, .. } => *status >= 500 || *status == 429,
            RemoteError::Parse(_) => false,
        }
    }
}
