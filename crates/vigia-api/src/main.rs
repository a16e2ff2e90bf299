mod envelope;
mod error;
mod routes;

use std::sync::Arc;

use vigia_core::config::AppConfig;
use vigia_core::wazuh::WazuhClient;
use vigia_core::DatabaseService;

use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vigia_api=info".parse().expect("valid directive"))
                .add_directive("vigia_core=info".parse().expect("valid directive")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting vigia-api with config: {:?}", config);

    let db = DatabaseService::open_path(&config.database_path)?;
    let wazuh = WazuhClient::new(config.wazuh.clone())?;

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, db, wazuh);
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("vigia-api listening on {}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
