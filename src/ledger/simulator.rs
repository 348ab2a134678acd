use super::wallet_ledger::{out_of_range, require_positive, WalletLedger};
use crate::domain::{
    bonus_percentage, BonusInfo, BonusInfoError, Decimal, PaymentMethod, Purchase, PurchaseId,
    PurchaseStatus, UserId,
};
use crate::error::WalletError;
use chrono::{DateTime, Utc};

/// FanCoins granted per USD spent.
pub const DEFAULT_FANCOINS_PER_DOLLAR: i64 = 100;

/// Local stand-in for a payment gateway.
///
/// Converts USD into FanCoins and Trading Credits under a fixed BonusInfo
/// policy and keeps the append-only purchase log.
#[derive(Debug, Clone)]
pub struct PurchaseSimulator {
    bonus_info: BonusInfo,
    fan_coins_per_dollar: Decimal,
    purchases: Vec<Purchase>,
}

impl PurchaseSimulator {
    pub fn new(bonus_info: BonusInfo, fan_coins_per_dollar: Decimal) -> Result<Self, BonusInfoError> {
        bonus_info.validate()?;
        Ok(Self {
            bonus_info,
            fan_coins_per_dollar,
            purchases: Vec::new(),
        })
    }

    pub fn bonus_info(&self) -> &BonusInfo {
        &self.bonus_info
    }

    /// Buy currency for `usd_amount`.
    ///
    /// On success exactly one completed Purchase is appended and both balances
    /// are credited. On error neither the log nor the ledger changes.
    pub fn purchase(
        &mut self,
        ledger: &mut WalletLedger,
        user_id: UserId,
        usd_amount: Decimal,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<Purchase, WalletError> {
        require_positive(usd_amount)?;
        if !ledger.contains(user_id) {
            return Err(WalletError::NotFound(user_id));
        }

        let first_time = self.is_first_purchase(user_id);
        let multiplier = self
            .bonus_info
            .multiplier_for(usd_amount, first_time)
            .ok_or_else(|| {
                WalletError::InvalidAmount(format!("no bonus tier covers {}", usd_amount))
            })?;

        let fan_coins = usd_amount
            .checked_mul(self.fan_coins_per_dollar)
            .ok_or_else(|| out_of_range(usd_amount))?;
        let trading_credits = usd_amount
            .checked_mul(multiplier)
            .ok_or_else(|| out_of_range(usd_amount))?;

        let mut purchase = Purchase::pending(
            self.next_id(),
            user_id,
            usd_amount,
            fan_coins,
            trading_credits,
            bonus_percentage(multiplier),
            payment_method,
            now,
        );
        purchase.transition_to(PurchaseStatus::Completed, now)?;

        ledger.apply_grant(user_id, fan_coins, trading_credits, now)?;
        self.purchases.push(purchase.clone());
        Ok(purchase)
    }

    /// True when the user has no completed purchase yet.
    pub fn is_first_purchase(&self, user_id: UserId) -> bool {
        !self
            .purchases
            .iter()
            .any(|p| p.user_id == user_id && p.is_completed())
    }

    /// Purchases for a user, ascending by id.
    pub fn history(&self, user_id: UserId) -> Vec<Purchase> {
        self.purchases
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.purchases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.purchases.is_empty()
    }

    /// Max existing id + 1, starting at 1.
    pub fn next_id(&self) -> PurchaseId {
        self.purchases
            .iter()
            .map(|p| p.id)
            .max()
            .map_or(PurchaseId::new(1), |id| id.next())
    }

    /// Merge purchases loaded from storage. Duplicate ids keep the first copy.
    pub fn restore(&mut self, purchases: impl IntoIterator<Item = Purchase>) {
        self.purchases.extend(purchases);
        self.purchases.sort_by_key(|p| p.id);
        self.purchases.dedup_by_key(|p| p.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;
    use chrono::TimeZone;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 18, 30, 0).unwrap()
    }

    fn setup(bonus_info: BonusInfo) -> (PurchaseSimulator, WalletLedger, UserId) {
        let user = UserId::new(1);
        let mut ledger = WalletLedger::default();
        ledger.initialize(user, now());
        let simulator =
            PurchaseSimulator::new(bonus_info, Decimal::from(DEFAULT_FANCOINS_PER_DOLLAR))
                .unwrap();
        (simulator, ledger, user)
    }

    #[test]
    fn test_plain_purchase_credits_both_balances() {
        let (mut sim, mut ledger, user) =
            setup(BonusInfo::flat(Decimal::one(), Decimal::zero()));

        let purchase = sim
            .purchase(&mut ledger, user, d("10"), PaymentMethod::Stripe, now())
            .unwrap();

        assert_eq!(purchase.id, PurchaseId::new(1));
        assert_eq!(purchase.status, PurchaseStatus::Completed);
        assert_eq!(purchase.fan_coins_received, d("1000"));
        assert_eq!(purchase.trading_credits_granted, d("10"));
        assert_eq!(purchase.bonus_percentage, d("0"));
        assert_eq!(purchase.payment_method, PaymentMethod::Stripe);

        let wallet = ledger.get_balance(user).unwrap();
        assert_eq!(wallet.fan_coins, d("1000"));
        assert_eq!(wallet.trading_credits, d("130.00"));
    }

    #[test]
    fn test_zero_amount_changes_nothing() {
        let (mut sim, mut ledger, user) = setup(BonusInfo::default());
        let before = ledger.get_balance(user).unwrap();

        for amount in ["0", "-10"] {
            let err = sim
                .purchase(&mut ledger, user, d(amount), PaymentMethod::Bank, now())
                .unwrap_err();
            assert!(matches!(err, WalletError::InvalidAmount(_)));
        }
        assert!(sim.is_empty());
        assert_eq!(ledger.get_balance(user).unwrap(), before);
    }

    #[test]
    fn test_unknown_user_appends_nothing() {
        let (mut sim, mut ledger, _) = setup(BonusInfo::default());
        let err = sim
            .purchase(
                &mut ledger,
                UserId::new(77),
                d("10"),
                PaymentMethod::Paypal,
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, WalletError::NotFound(_)));
        assert!(sim.is_empty());
    }

    #[test]
    fn test_first_time_bonus_follows_history_not_amount() {
        let (mut sim, mut ledger, user) =
            setup(BonusInfo::flat(Decimal::one(), d("0.5")));

        let first = sim
            .purchase(&mut ledger, user, d("5"), PaymentMethod::ApplePay, now())
            .unwrap();
        let second = sim
            .purchase(&mut ledger, user, d("15"), PaymentMethod::ApplePay, now())
            .unwrap();

        assert_eq!(first.trading_credits_granted, d("7.5"));
        assert_eq!(first.bonus_percentage, d("50"));
        assert_eq!(second.trading_credits_granted, d("15"));
        assert_eq!(second.bonus_percentage, d("0"));
        assert!(!sim.is_first_purchase(user));
    }

    #[test]
    fn test_first_time_is_per_user() {
        let (mut sim, mut ledger, user) =
            setup(BonusInfo::flat(Decimal::one(), d("0.5")));
        let other = UserId::new(2);
        ledger.initialize(other, now());

        sim.purchase(&mut ledger, user, d("10"), PaymentMethod::Bank, now())
            .unwrap();
        assert!(sim.is_first_purchase(other));
        let p = sim
            .purchase(&mut ledger, other, d("10"), PaymentMethod::Bank, now())
            .unwrap();
        assert_eq!(p.trading_credits_granted, d("15"));
    }

    #[test]
    fn test_tier_boundary_uses_upper_bracket() {
        let info = BonusInfo {
            first_time_bonus: Decimal::zero(),
            ..BonusInfo::default()
        };
        let (mut sim, mut ledger, user) = setup(info);

        let at_25 = sim
            .purchase(&mut ledger, user, d("25"), PaymentMethod::GooglePay, now())
            .unwrap();
        assert_eq!(at_25.trading_credits_granted, d("27.5"));
        assert_eq!(at_25.bonus_percentage, d("10"));

        let at_100 = sim
            .purchase(&mut ledger, user, d("100"), PaymentMethod::GooglePay, now())
            .unwrap();
        assert_eq!(at_100.trading_credits_granted, d("125"));
    }

    #[test]
    fn test_ids_strictly_increase() {
        let (mut sim, mut ledger, user) = setup(BonusInfo::default());
        let mut last = PurchaseId::new(0);
        for amount in ["1", "2", "3", "4"] {
            let p = sim
                .purchase(&mut ledger, user, d(amount), PaymentMethod::Bank, now())
                .unwrap();
            assert!(p.id > last);
            last = p.id;
        }
        assert_eq!(sim.history(user).len(), 4);
    }

    #[test]
    fn test_next_id_after_restore_is_max_plus_one() {
        let (mut sim, mut ledger, user) = setup(BonusInfo::default());
        let mut p = sim
            .purchase(&mut ledger, user, d("1"), PaymentMethod::Bank, now())
            .unwrap();
        p.id = PurchaseId::new(41);

        let mut fresh = PurchaseSimulator::new(BonusInfo::default(), Decimal::from(100)).unwrap();
        fresh.restore(vec![p.clone(), p]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh.next_id(), PurchaseId::new(42));
        assert!(!fresh.is_first_purchase(user));
    }

    #[test]
    fn test_zero_multiplier_tier_keeps_grant_whole() {
        let info = BonusInfo {
            base_multiplier: Decimal::zero(),
            first_time_bonus: Decimal::zero(),
            ..BonusInfo::default()
        };
        let (mut sim, mut ledger, user) = setup(info);
        let p = sim
            .purchase(&mut ledger, user, d("3"), PaymentMethod::Bank, now())
            .unwrap();
        assert!(p.trading_credits_granted.is_zero());
        let wallet = ledger.get_balance(user).unwrap();
        assert_eq!(wallet.balance(Currency::FanCoins), d("300"));
        assert_eq!(wallet.balance(Currency::TradingCredits), d("120"));
    }

    #[test]
    fn test_oversized_amount_is_invalid_not_a_panic() {
        let (mut sim, mut ledger, user) = setup(BonusInfo::default());
        let before = ledger.get_balance(user).unwrap();

        let err = sim
            .purchase(
                &mut ledger,
                user,
                d("7922816251426433759354395033"),
                PaymentMethod::Bank,
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
        assert!(sim.is_empty());
        assert_eq!(ledger.get_balance(user).unwrap(), before);
    }

    #[test]
    fn test_new_rejects_invalid_policy() {
        let info = BonusInfo {
            tier_multipliers: vec![],
            ..BonusInfo::default()
        };
        assert!(PurchaseSimulator::new(info, Decimal::from(100)).is_err());
    }
}
