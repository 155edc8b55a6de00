use money_mindset_progression::{
    api::{start_server, ApiState},
    audit::ActionLedger,
    config::AppConfig,
    service::{GamificationService, SystemClock},
    store::InMemoryProgressStore,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    info!("🚀 Money Mindset Progression - API Server");
    info!("📍 Port: {}", config.port);

    let catalog = Arc::new(config.load_catalog()?);
    let clock = Arc::new(SystemClock::new(config.utc_offset));

    let state = ApiState {
        service: Arc::new(GamificationService::with_clock(catalog, clock)),
        store: Arc::new(InMemoryProgressStore::new()),
        ledger: Arc::new(ActionLedger::new()),
        max_write_attempts: config.max_write_attempts,
    };

    info!(
        max_write_attempts = config.max_write_attempts,
        "✅ Progression engine initialized"
    );
    info!("📡 Starting API server...");

    start_server(state, config.port).await?;

    Ok(())
}
