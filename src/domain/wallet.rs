//! Two-currency wallet owned by a single user.

use crate::domain::{Currency, Decimal, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wallet balances for one user.
///
/// Both balances are non-negative at every observable point; only the ledger
/// mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: UserId,
    /// Non-spendable reward balance.
    pub fan_coins: Decimal,
    /// Spendable balance.
    pub trading_credits: Decimal,
    /// Instant of the last successful mutation.
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Fresh wallet: zero FanCoins plus the starting Trading Credits grant.
    pub fn new(user_id: UserId, starting_credits: Decimal, now: DateTime<Utc>) -> Self {
        Wallet {
            user_id,
            fan_coins: Decimal::zero(),
            trading_credits: starting_credits,
            updated_at: now,
        }
    }

    pub fn balance(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::FanCoins => self.fan_coins,
            Currency::TradingCredits => self.trading_credits,
        }
    }

    pub(crate) fn balance_mut(&mut self, currency: Currency) -> &mut Decimal {
        match currency {
            Currency::FanCoins => &mut self.fan_coins,
            Currency::TradingCredits => &mut self.trading_credits,
        }
    }

    pub fn is_consistent(&self) -> bool {
        !self.fan_coins.is_negative() && !self.trading_credits.is_negative()
    }
}
