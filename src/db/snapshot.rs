//! Persisted wallet state: `{ wallet, bonusInfo, purchases }` as JSON, one
//! entry per user under the `wallet-storage` namespace.

use super::store::{PersistenceAdapter, StoreError};
use crate::domain::{BonusInfo, Purchase, UserId, Wallet};
use serde::{Deserialize, Serialize};

pub const WALLET_NAMESPACE: &str = "wallet-storage";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedWalletState {
    pub wallet: Wallet,
    pub bonus_info: BonusInfo,
    #[serde(default)]
    pub purchases: Vec<Purchase>,
}

impl PersistedWalletState {
    pub fn user_id(&self) -> UserId {
        self.wallet.user_id
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }
}

/// Write one user's state.
pub async fn save_state(
    store: &dyn PersistenceAdapter,
    state: &PersistedWalletState,
) -> Result<(), StoreError> {
    let key = state.user_id().to_string();
    let value = state.to_json().map_err(|e| StoreError::Corrupt {
        namespace: WALLET_NAMESPACE.to_string(),
        key: key.clone(),
        message: e.to_string(),
    })?;
    store.put(WALLET_NAMESPACE, &key, &value).await
}

/// Read every persisted wallet. A value that does not decode, or whose key
/// disagrees with its wallet's user id, fails the whole load.
pub async fn load_states(
    store: &dyn PersistenceAdapter,
) -> Result<Vec<PersistedWalletState>, StoreError> {
    let entries = store.list(WALLET_NAMESPACE).await?;
    let mut states = Vec::with_capacity(entries.len());

    for (key, value) in entries {
        let corrupt = |message: String| StoreError::Corrupt {
            namespace: WALLET_NAMESPACE.to_string(),
            key: key.clone(),
            message,
        };
        let state = PersistedWalletState::from_json(&value).map_err(|e| corrupt(e.to_string()))?;
        if state.user_id().to_string() != key {
            return Err(corrupt(format!(
                "key does not match wallet user {}",
                state.user_id()
            )));
        }
        states.push(state);
    }

    Ok(states)
}
