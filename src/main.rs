use dukapay::api::{self, AppState};
use dukapay::config::Config;
use dukapay::database::callback_log::{CallbackLog, PgCallbackLog};
use dukapay::database::orders::{OrderStore, PgOrderStore};
use dukapay::database::payment_store::{PgTransactionStore, TransactionStore};
use dukapay::database::{self, PoolConfig};
use dukapay::payments::orchestrator::CheckoutOrchestrator;
use dukapay::payments::poller::StatusPoller;
use dukapay::payments::providers::DarajaGateway;
use dukapay::payments::traits::PaymentGateway;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    // Log startup info
    tracing::info!("Starting dukapay backend");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Gateway: {}", config.mpesa.base_url);

    // Database pool and schema
    let pool_config = PoolConfig {
        max_connections: config.database.max_connections,
        ..PoolConfig::default()
    };
    let pool = database::init_pool(&config.database.url, Some(pool_config)).await?;
    database::run_migrations(&pool).await?;

    // Stores
    let store: Arc<dyn TransactionStore> = Arc::new(PgTransactionStore::new(pool.clone()));
    let orders: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(pool.clone()));
    let callback_log: Arc<dyn CallbackLog> = Arc::new(PgCallbackLog::new(pool.clone()));

    // Payment pipeline
    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(DarajaGateway::new(config.mpesa.clone(), store.clone()));
    let poller = StatusPoller::new(
        store.clone(),
        config.checkout.poll_interval(),
        config.checkout.deadline(),
    );
    let orchestrator = Arc::new(CheckoutOrchestrator::new(
        orders,
        gateway,
        store.clone(),
        poller,
    ));

    // Build router
    let state = AppState::new(config.clone(), Some(pool), orchestrator, store, callback_log);
    let app = api::router(state);

    // Start server
    let host: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
