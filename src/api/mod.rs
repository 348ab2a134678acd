pub mod health;
pub mod wallet;

use crate::backend::WalletService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub wallet: Arc<dyn WalletService>,
}

impl AppState {
    pub fn new(wallet: Arc<dyn WalletService>) -> Self {
        Self { wallet }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/api/wallet/bonus-info", get(wallet::get_bonus_info))
        .route("/api/wallet/purchase", post(wallet::post_purchase))
        .route("/api/wallet/debit", post(wallet::post_debit))
        .route("/api/wallet/:user_id", get(wallet::get_wallet))
        .route("/api/wallet/:user_id/history", get(wallet::get_history))
        .route("/api/wallet/:user_id/initialize", post(wallet::post_initialize))
        .layer(cors)
        .with_state(state)
}
