//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Settings;
use crate::error::Result;
use crate::middleware::rate_limit::RateLimitLayer;
use crate::state::AppState;
use crate::{bootstrap, routes};

/// Server bind configuration, split out of `Settings` the way the teacher's
/// `ServerConfig` kept host/port separate from the rest of its config.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl From<&Settings> for ServerConfig {
    fn from(settings: &Settings) -> Self {
        Self { host: settings.host.clone(), port: settings.port }
    }
}

pub struct Server {
    config: ServerConfig,
    app: Router,
}

impl Server {
    /// Build the router, run bootstrap admin provisioning, and bind the
    /// configured host/port — but do not start accepting connections yet.
    pub async fn new(config: ServerConfig, state: Arc<AppState>) -> Result<Self> {
        bootstrap::run(&state).await?;
        let rate_limit_enabled = state.settings.rate_limit_enabled;
        let app = Self::build_app(state, rate_limit_enabled);
        Ok(Self { config, app })
    }

    fn build_app(state: Arc<AppState>, rate_limit_enabled: bool) -> Router {
        let cors = Self::build_cors(&state.settings);
        let mut app = routes::create_router(state).layer(cors);

        if rate_limit_enabled {
            app = app.layer(RateLimitLayer::default());
        }

        app
    }

    /// In production, only the explicitly configured origins may call the
    /// API; anywhere else a wildcard is fine for local and CI use.
    fn build_cors(settings: &Settings) -> CorsLayer {
        let methods: Vec<Method> = settings
            .cors_allow_methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();

        let layer = CorsLayer::new().allow_methods(methods).allow_headers(Any);

        if !settings.is_production() && settings.cors_origins.is_empty() {
            return layer.allow_origin(Any);
        }

        let origins: Vec<HeaderValue> = settings.cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }

    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .expect("invalid socket address");

        info!("tessera API listening on http://{addr}");

        let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind address");
        axum::serve(listener, self.app).await.expect("server error");

        Ok(())
    }

    #[cfg(test)]
    pub fn router(self) -> Router {
        self.app
    }
}
