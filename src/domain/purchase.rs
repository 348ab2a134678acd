//! Purchase records: the append-only log of real-money top-ups.

use crate::domain::{Decimal, PaymentMethod, PurchaseId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a purchase. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl PurchaseStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            PurchaseStatus::Pending => false,
            PurchaseStatus::Completed | PurchaseStatus::Failed => true,
        }
    }

    pub fn can_transition_to(&self, next: PurchaseStatus) -> bool {
        match (self, next) {
            (PurchaseStatus::Pending, PurchaseStatus::Completed)
            | (PurchaseStatus::Pending, PurchaseStatus::Failed) => true,
            (PurchaseStatus::Pending, PurchaseStatus::Pending)
            | (PurchaseStatus::Completed, _)
            | (PurchaseStatus::Failed, _) => false,
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseStatus::Pending => write!(f, "pending"),
            PurchaseStatus::Completed => write!(f, "completed"),
            PurchaseStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("purchase status cannot move from {from} to {to}")]
pub struct StatusTransitionError {
    pub from: PurchaseStatus,
    pub to: PurchaseStatus,
}

/// One purchase of in-app currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: PurchaseId,
    pub user_id: UserId,
    /// USD spent.
    pub amount: Decimal,
    pub fan_coins_received: Decimal,
    pub trading_credits_granted: Decimal,
    pub bonus_percentage: Decimal,
    pub payment_method: PaymentMethod,
    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    /// Purchase accepted but not yet resolved.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        id: PurchaseId,
        user_id: UserId,
        amount: Decimal,
        fan_coins_received: Decimal,
        trading_credits_granted: Decimal,
        bonus_percentage: Decimal,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Purchase {
            id,
            user_id,
            amount,
            fan_coins_received,
            trading_credits_granted,
            bonus_percentage,
            payment_method,
            status: PurchaseStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition_to(
        &mut self,
        next: PurchaseStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StatusTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusTransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == PurchaseStatus::Completed
    }
}
