//! Tessera API server binary.

use tessera_api::config::Settings;
use tessera_api::{telemetry, AppState, Server, ServerConfig};
use tessera_db::pool::PoolConfig;
use tracing::error;

#[tokio::main]
async fn main() {
    telemetry::init();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let pool_config = PoolConfig { database_url: settings.database_url.clone(), ..PoolConfig::default() };
    let pool = match tessera_db::connect(&pool_config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = tessera_db::migrate(&pool).await {
        error!("failed to run migrations: {e}");
        std::process::exit(1);
    }

    let config = ServerConfig::from(&settings);
    let state = AppState::new(pool, settings).await;

    let server = match Server::new(config, state).await {
        Ok(server) => server,
        Err(e) => {
            error!("failed to build server: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.start().await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}
