use crate::domain::{Currency, Decimal, UserId, Wallet};
use crate::error::WalletError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Trading Credits granted to every new wallet.
pub const DEFAULT_STARTING_CREDITS: &str = "120.00";

pub fn default_starting_credits() -> Decimal {
    Decimal::from_str_canonical(DEFAULT_STARTING_CREDITS).unwrap_or_default()
}

/// Authoritative in-memory balances, one wallet per user.
///
/// Every method either applies its whole mutation or returns an error having
/// changed nothing.
#[derive(Debug, Clone)]
pub struct WalletLedger {
    wallets: BTreeMap<UserId, Wallet>,
    starting_credits: Decimal,
}

impl WalletLedger {
    pub fn new(starting_credits: Decimal) -> Self {
        Self {
            wallets: BTreeMap::new(),
            starting_credits,
        }
    }

    pub fn starting_credits(&self) -> Decimal {
        self.starting_credits
    }

    /// Create the user's wallet if it does not exist yet.
    ///
    /// Returns true when a wallet was created. Calling again is a no-op.
    pub fn initialize(&mut self, user_id: UserId, now: DateTime<Utc>) -> bool {
        if self.wallets.contains_key(&user_id) {
            return false;
        }
        self.wallets
            .insert(user_id, Wallet::new(user_id, self.starting_credits, now));
        true
    }

    /// Copy of the user's current wallet.
    pub fn get_balance(&self, user_id: UserId) -> Result<Wallet, WalletError> {
        self.wallets
            .get(&user_id)
            .cloned()
            .ok_or(WalletError::NotFound(user_id))
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.wallets.contains_key(&user_id)
    }

    pub fn user_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.wallets.keys().copied()
    }

    /// Add a strictly positive amount to one balance.
    pub fn credit(
        &mut self,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Wallet, WalletError> {
        require_positive(amount)?;
        let wallet = self.wallet_mut(user_id)?;
        let balance = wallet.balance_mut(currency);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| out_of_range(amount))?;
        wallet.updated_at = now;
        Ok(wallet.clone())
    }

    /// Spend Trading Credits. FanCoins are never debited.
    pub fn debit(
        &mut self,
        user_id: UserId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Wallet, WalletError> {
        require_positive(amount)?;
        let wallet = self.wallet_mut(user_id)?;
        let remaining = wallet
            .trading_credits
            .checked_sub_non_negative(amount)
            .ok_or(WalletError::InsufficientBalance {
                requested: amount,
                available: wallet.trading_credits,
            })?;
        wallet.trading_credits = remaining;
        wallet.updated_at = now;
        Ok(wallet.clone())
    }

    /// Credit both balances as one step. Zero amounts are allowed here so a
    /// zero-multiplier tier cannot split the grant.
    pub(crate) fn apply_grant(
        &mut self,
        user_id: UserId,
        fan_coins: Decimal,
        trading_credits: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Wallet, WalletError> {
        for amount in [fan_coins, trading_credits] {
            if amount.is_negative() {
                return Err(WalletError::InvalidAmount(format!(
                    "grant must not be negative, got {}",
                    amount
                )));
            }
        }
        let wallet = self.wallet_mut(user_id)?;
        let new_fan_coins = wallet
            .fan_coins
            .checked_add(fan_coins)
            .ok_or_else(|| out_of_range(fan_coins))?;
        let new_trading_credits = wallet
            .trading_credits
            .checked_add(trading_credits)
            .ok_or_else(|| out_of_range(trading_credits))?;
        wallet.fan_coins = new_fan_coins;
        wallet.trading_credits = new_trading_credits;
        wallet.updated_at = now;
        Ok(wallet.clone())
    }

    /// Install a wallet loaded from storage, replacing any in-memory copy.
    pub fn restore(&mut self, wallet: Wallet) -> Result<(), WalletError> {
        if !wallet.is_consistent() {
            return Err(WalletError::Storage(format!(
                "persisted wallet for user {} has a negative balance",
                wallet.user_id
            )));
        }
        self.wallets.insert(wallet.user_id, wallet);
        Ok(())
    }

    fn wallet_mut(&mut self, user_id: UserId) -> Result<&mut Wallet, WalletError> {
        self.wallets
            .get_mut(&user_id)
            .ok_or(WalletError::NotFound(user_id))
    }
}

impl Default for WalletLedger {
    fn default() -> Self {
        Self::new(default_starting_credits())
    }
}

pub(crate) fn require_positive(amount: Decimal) -> Result<(), WalletError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(WalletError::InvalidAmount(format!(
            "amount must be greater than 0, got {}",
            amount
        )))
    }
}

pub(crate) fn out_of_range(amount: Decimal) -> WalletError {
    WalletError::InvalidAmount(format!("amount {} is too large", amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn ledger_with(user: UserId) -> WalletLedger {
        let mut ledger = WalletLedger::default();
        ledger.initialize(user, t0());
        ledger
    }

    #[test]
    fn test_fresh_wallet_has_starting_grant() {
        let user = UserId::new(1);
        let ledger = ledger_with(user);
        let wallet = ledger.get_balance(user).unwrap();
        assert_eq!(wallet.fan_coins, d("0"));
        assert_eq!(wallet.trading_credits, d("120.00"));
        assert_eq!(wallet.updated_at, t0());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let user = UserId::new(1);
        let mut ledger = WalletLedger::default();
        assert!(ledger.initialize(user, t0()));
        let once = ledger.get_balance(user).unwrap();

        assert!(!ledger.initialize(user, t0() + Duration::seconds(5)));
        assert_eq!(ledger.get_balance(user).unwrap(), once);
    }

    #[test]
    fn test_initialize_does_not_reset_balances() {
        let user = UserId::new(1);
        let mut ledger = ledger_with(user);
        ledger.debit(user, d("20"), t0()).unwrap();
        ledger.initialize(user, t0());
        assert_eq!(ledger.get_balance(user).unwrap().trading_credits, d("100"));
    }

    #[test]
    fn test_get_balance_unknown_user() {
        let ledger = WalletLedger::default();
        assert!(matches!(
            ledger.get_balance(UserId::new(99)),
            Err(WalletError::NotFound(id)) if id == UserId::new(99)
        ));
    }

    #[test]
    fn test_credit_stamps_updated_at() {
        let user = UserId::new(1);
        let mut ledger = ledger_with(user);
        let later = t0() + Duration::minutes(1);

        let wallet = ledger
            .credit(user, Currency::FanCoins, d("1000"), later)
            .unwrap();
        assert_eq!(wallet.fan_coins, d("1000"));
        assert_eq!(wallet.trading_credits, d("120"));
        assert_eq!(wallet.updated_at, later);

        let wallet = ledger
            .credit(user, Currency::TradingCredits, d("10"), later)
            .unwrap();
        assert_eq!(wallet.trading_credits, d("130.00"));
    }

    #[test]
    fn test_credit_rejects_non_positive() {
        let user = UserId::new(1);
        let mut ledger = ledger_with(user);
        let before = ledger.get_balance(user).unwrap();

        for amount in ["0", "-5"] {
            let later = t0() + Duration::minutes(1);
            let err = ledger
                .credit(user, Currency::TradingCredits, d(amount), later)
                .unwrap_err();
            assert!(matches!(err, WalletError::InvalidAmount(_)));
        }
        assert_eq!(ledger.get_balance(user).unwrap(), before);
    }

    #[test]
    fn test_debit_exact_balance_reaches_zero() {
        let user = UserId::new(1);
        let mut ledger = ledger_with(user);
        let wallet = ledger.debit(user, d("120.00"), t0()).unwrap();
        assert!(wallet.trading_credits.is_zero());
    }

    #[test]
    fn test_debit_insufficient_is_all_or_nothing() {
        let user = UserId::new(1);
        let mut ledger = ledger_with(user);
        ledger
            .credit(user, Currency::TradingCredits, d("10"), t0())
            .unwrap();
        let before = ledger.get_balance(user).unwrap();

        let later = t0() + Duration::minutes(1);
        let err = ledger.debit(user, d("130.01"), later).unwrap_err();
        match err {
            WalletError::InsufficientBalance {
                requested,
                available,
            } => {
                assert_eq!(requested, d("130.01"));
                assert_eq!(available, d("130.00"));
            }
            other => panic!("expected InsufficientBalance, got {other:?}"),
        }
        assert_eq!(ledger.get_balance(user).unwrap(), before);
    }

    #[test]
    fn test_debit_never_touches_fan_coins() {
        let user = UserId::new(1);
        let mut ledger = ledger_with(user);
        ledger
            .credit(user, Currency::FanCoins, d("5000"), t0())
            .unwrap();
        assert!(ledger.debit(user, d("121"), t0()).is_err());
        let wallet = ledger.debit(user, d("1"), t0()).unwrap();
        assert_eq!(wallet.fan_coins, d("5000"));
        assert_eq!(wallet.trading_credits, d("119"));
    }

    #[test]
    fn test_balances_stay_non_negative_over_mixed_sequence() {
        let user = UserId::new(1);
        let mut ledger = ledger_with(user);
        let ops: [(&str, &str); 8] = [
            ("debit", "50"),
            ("debit", "80"),
            ("credit", "15.5"),
            ("debit", "85.5"),
            ("debit", "0.01"),
            ("credit", "0.01"),
            ("debit", "0.02"),
            ("debit", "0.01"),
        ];
        for (op, amount) in ops {
            let _ = match op {
                "debit" => ledger.debit(user, d(amount), t0()),
                _ => ledger.credit(user, Currency::TradingCredits, d(amount), t0()),
            };
            assert!(ledger.get_balance(user).unwrap().is_consistent());
        }
        assert!(ledger.get_balance(user).unwrap().trading_credits.is_zero());
    }

    #[test]
    fn test_credit_overflow_is_invalid_amount() {
        let user = UserId::new(1);
        let mut ledger = ledger_with(user);
        let huge = d("79228162514264337593543950335");
        let before = ledger.get_balance(user).unwrap();

        let err = ledger
            .credit(user, Currency::TradingCredits, huge, t0())
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
        assert_eq!(ledger.get_balance(user).unwrap(), before);
    }

    #[test]
    fn test_grant_overflow_changes_nothing() {
        let user = UserId::new(1);
        let mut ledger = ledger_with(user);
        let huge = d("79228162514264337593543950335");
        ledger.credit(user, Currency::FanCoins, huge, t0()).unwrap();
        let before = ledger.get_balance(user).unwrap();

        let err = ledger.apply_grant(user, d("1"), d("1"), t0()).unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
        assert_eq!(ledger.get_balance(user).unwrap(), before);
    }

    #[test]
    fn test_restore_rejects_negative_wallet() {
        let mut ledger = WalletLedger::default();
        let mut wallet = Wallet::new(UserId::new(4), d("1"), t0());
        wallet.trading_credits = d("-1");
        assert!(matches!(
            ledger.restore(wallet),
            Err(WalletError::Storage(_))
        ));
        assert!(!ledger.contains(UserId::new(4)));
    }
}
