use anyhow::Context;
use fanwallet::{
    api, config::Config, db::init_db, BackendMode, RemoteWalletService, SimulatedWalletService,
    SqliteStore, WalletService,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Configuration is read once; the backend choice holds for the whole process.
    let config = Config::from_env().context("configuration error")?;

    let wallet: Arc<dyn WalletService> = match &config.backend {
        BackendMode::Simulated { database_path } => {
            let pool = init_db(database_path)
                .await
                .context("failed to initialize database")?;
            let store = Arc::new(SqliteStore::new(pool));
            let service = SimulatedWalletService::open(store, config.wallet.clone())
                .await
                .context("failed to restore wallet state")?;

            for user_id in &config.bootstrap_users {
                service
                    .initialize(*user_id)
                    .await
                    .with_context(|| format!("failed to initialize wallet {}", user_id))?;
            }
            Arc::new(service)
        }
        BackendMode::Live { api_url } => {
            tracing::info!(api_url = %api_url, "using live wallet backend");
            Arc::new(
                RemoteWalletService::new(
                    api_url.clone(),
                    config.api_timeout,
                    config.api_retry_window,
                )
                .context("failed to build wallet API client")?,
            )
        }
    };

    let app = api::create_router(api::AppState::new(wallet.clone()));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!(backend = wallet.kind(), "wallet server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
