//! Simulated wallet backend: ledger + purchase simulator + write-through
//! persistence.

use super::WalletService;
use crate::db::{load_states, save_state, PersistedWalletState, PersistenceAdapter};
use crate::domain::{BonusInfo, Currency, Decimal, PaymentMethod, Purchase, UserId, Wallet};
use crate::error::WalletError;
use crate::ledger::{
    default_starting_credits, PurchaseSimulator, WalletLedger, DEFAULT_FANCOINS_PER_DOLLAR,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Policy constants for the simulated backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSettings {
    pub starting_credits: Decimal,
    pub fan_coins_per_dollar: Decimal,
    pub bonus_info: BonusInfo,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            starting_credits: default_starting_credits(),
            fan_coins_per_dollar: Decimal::from(DEFAULT_FANCOINS_PER_DOLLAR),
            bonus_info: BonusInfo::default(),
        }
    }
}

#[derive(Debug)]
struct WalletBook {
    ledger: WalletLedger,
    simulator: PurchaseSimulator,
}

impl WalletBook {
    fn state_for(&self, user_id: UserId) -> Option<PersistedWalletState> {
        let wallet = self.ledger.get_balance(user_id).ok()?;
        Some(PersistedWalletState {
            wallet,
            bonus_info: self.simulator.bonus_info().clone(),
            purchases: self.simulator.history(user_id),
        })
    }
}

#[derive(Debug)]
struct Inner {
    /// Single writer: every mutation holds this lock until it is saved.
    book: Mutex<WalletBook>,
    /// Last committed state per user, read without touching the writer lock.
    committed: RwLock<HashMap<UserId, Arc<PersistedWalletState>>>,
    bonus_info: BonusInfo,
    store: Arc<dyn PersistenceAdapter>,
}

impl Inner {
    fn publish(&self, state: Arc<PersistedWalletState>) {
        let mut committed = self
            .committed
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        committed.insert(state.user_id(), state);
    }

    fn committed(&self, user_id: UserId) -> Result<Arc<PersistedWalletState>, WalletError> {
        let committed = self
            .committed
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        committed
            .get(&user_id)
            .cloned()
            .ok_or(WalletError::NotFound(user_id))
    }

    /// Publish the user's new state, then write it through to the store.
    ///
    /// A failed save keeps the in-memory state; the next successful save
    /// for this user supersedes it.
    async fn commit(&self, book: &WalletBook, user_id: UserId) {
        let Some(state) = book.state_for(user_id) else {
            warn!(user_id = %user_id, "commit requested for unknown wallet");
            return;
        };
        let state = Arc::new(state);
        self.publish(state.clone());

        if let Err(e) = save_state(self.store.as_ref(), &state).await {
            warn!(user_id = %user_id, error = %e, "write-through save failed");
        }
    }
}

/// Local wallet backend.
///
/// Mutations are serialized through one writer lock and run on their own
/// task, so an accepted operation completes and is persisted even if the
/// caller stops waiting for it.
#[derive(Debug, Clone)]
pub struct SimulatedWalletService {
    inner: Arc<Inner>,
}

impl SimulatedWalletService {
    /// Restore persisted state from `store` and build the service.
    pub async fn open(
        store: Arc<dyn PersistenceAdapter>,
        settings: WalletSettings,
    ) -> Result<Self, WalletError> {
        let mut simulator =
            PurchaseSimulator::new(settings.bonus_info.clone(), settings.fan_coins_per_dollar)?;
        let mut ledger = WalletLedger::new(settings.starting_credits);

        let states = load_states(store.as_ref()).await?;
        for state in states {
            let user_id = state.user_id();
            if state.bonus_info != settings.bonus_info {
                debug!(user_id = %user_id, "persisted bonus info differs from configured policy");
            }
            ledger.restore(state.wallet)?;
            simulator.restore(state.purchases.into_iter().filter(|p| p.user_id == user_id));
        }

        let book = WalletBook { ledger, simulator };
        let committed = book
            .ledger
            .user_ids()
            .filter_map(|user_id| book.state_for(user_id))
            .map(|state| (state.user_id(), Arc::new(state)))
            .collect::<HashMap<_, _>>();

        info!(
            wallets = committed.len(),
            purchases = book.simulator.len(),
            "wallet state restored"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                book: Mutex::new(book),
                committed: RwLock::new(committed),
                bonus_info: settings.bonus_info,
                store,
            }),
        })
    }

    /// Create the user's wallet with the starting grant if it does not exist.
    /// Idempotent.
    pub async fn initialize(&self, user_id: UserId) -> Result<Wallet, WalletError> {
        let created = self
            .write(user_id, move |book, now| {
                Ok(book.ledger.initialize(user_id, now))
            })
            .await?;
        if created {
            info!(user_id = %user_id, "wallet initialized");
        }
        self.fetch_wallet(user_id).await
    }

    /// Add a positive amount to one balance, e.g. a FanCoins reward.
    pub async fn credit(
        &self,
        user_id: UserId,
        currency: Currency,
        amount: Decimal,
    ) -> Result<Wallet, WalletError> {
        self.write(user_id, move |book, now| {
            book.ledger.credit(user_id, currency, amount, now)
        })
        .await
    }

    /// Run one mutation under the writer lock on a detached task and commit
    /// it. Errors from `op` leave state untouched and skip the commit.
    async fn write<T, F>(&self, user_id: UserId, op: F) -> Result<T, WalletError>
    where
        T: Send + 'static,
        F: FnOnce(&mut WalletBook, DateTime<Utc>) -> Result<T, WalletError> + Send + 'static,
    {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let mut book = inner.book.lock().await;
            let value = op(&mut *book, Utc::now())?;
            inner.commit(&book, user_id).await;
            Ok::<T, WalletError>(value)
        });

        task.await
            .map_err(|e| WalletError::Storage(format!("wallet write task aborted: {}", e)))?
    }
}

#[async_trait]
impl WalletService for SimulatedWalletService {
    async fn fetch_wallet(&self, user_id: UserId) -> Result<Wallet, WalletError> {
        Ok(self.inner.committed(user_id)?.wallet.clone())
    }

    async fn purchase(
        &self,
        user_id: UserId,
        amount: Decimal,
        payment_method: PaymentMethod,
    ) -> Result<Purchase, WalletError> {
        let result = self
            .write(user_id, move |book, now| {
                let WalletBook { ledger, simulator } = book;
                simulator.purchase(ledger, user_id, amount, payment_method, now)
            })
            .await;

        match &result {
            Ok(purchase) => info!(
                user_id = %user_id,
                purchase_id = %purchase.id,
                amount = %purchase.amount,
                trading_credits = %purchase.trading_credits_granted,
                fan_coins = %purchase.fan_coins_received,
                payment_method = %purchase.payment_method,
                "purchase completed"
            ),
            Err(e) => debug!(user_id = %user_id, error = %e, "purchase rejected"),
        }
        result
    }

    async fn get_history(&self, user_id: UserId) -> Result<Vec<Purchase>, WalletError> {
        Ok(self.inner.committed(user_id)?.purchases.clone())
    }

    async fn get_bonus_info(&self) -> Result<BonusInfo, WalletError> {
        Ok(self.inner.bonus_info.clone())
    }

    async fn initialize(&self, user_id: UserId) -> Result<Wallet, WalletError> {
        SimulatedWalletService::initialize(self, user_id).await
    }

    async fn debit(&self, user_id: UserId, amount: Decimal) -> Result<Wallet, WalletError> {
        let result = self
            .write(user_id, move |book, now| book.ledger.debit(user_id, amount, now))
            .await;
        if let Err(e) = &result {
            debug!(user_id = %user_id, amount = %amount, error = %e, "debit rejected");
        }
        result
    }

    fn kind(&self) -> &'static str {
        "simulated"
    }
}
