//! Shared application state (spec §6). Bundles one clone of every
//! `tessera-db` repo plus the webhook dispatcher and loaded settings behind a
//! single `Arc`, the way the teacher's `AppState` wraps its pool and indexer
//! handle for every route to share.

use std::sync::Arc;

use tessera_db::repo::{
    AcknowledgmentRepo, ApiKeyRepo, AssetRepo, AuditEventRepo, AuditRunRepo, ContractRepo, DependencyRepo,
    ProposalRepo, RegistrationRepo, TeamRepo, UserRepo, WebhookDeliveryRepo,
};
use tessera_db::PgPool;
use tessera_webhooks::Dispatcher;

use crate::cache::AssetCache;
use crate::config::Settings;
use crate::metrics::Metrics;

pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
    pub dispatcher: Dispatcher,
    pub metrics: Metrics,
    pub asset_cache: Option<AssetCache>,

    pub teams: TeamRepo,
    pub users: UserRepo,
    pub assets: AssetRepo,
    pub dependencies: DependencyRepo,
    pub contracts: ContractRepo,
    pub proposals: ProposalRepo,
    pub acknowledgments: AcknowledgmentRepo,
    pub registrations: RegistrationRepo,
    pub audit_runs: AuditRunRepo,
    pub audit_events: AuditEventRepo,
    pub webhook_deliveries: WebhookDeliveryRepo,
    pub api_keys: ApiKeyRepo,
}

impl AppState {
    pub async fn new(pool: PgPool, settings: Settings) -> Arc<Self> {
        let webhook_deliveries = WebhookDeliveryRepo::new(pool.clone());
        let dispatcher = Dispatcher::new(
            settings.webhook_url.clone(),
            settings.webhook_secret.clone(),
            settings.is_production(),
            webhook_deliveries.clone(),
        );

        let asset_cache = match &settings.redis_url {
            Some(url) => match AssetCache::connect(url).await {
                Ok(cache) => Some(cache),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to connect to redis, asset cache disabled");
                    None
                }
            },
            None => None,
        };

        Arc::new(Self {
            teams: TeamRepo::new(pool.clone()),
            users: UserRepo::new(pool.clone()),
            assets: AssetRepo::new(pool.clone()),
            dependencies: DependencyRepo::new(pool.clone()),
            contracts: ContractRepo::new(pool.clone()),
            proposals: ProposalRepo::new(pool.clone()),
            acknowledgments: AcknowledgmentRepo::new(pool.clone()),
            registrations: RegistrationRepo::new(pool.clone()),
            audit_runs: AuditRunRepo::new(pool.clone()),
            audit_events: AuditEventRepo::new(pool.clone()),
            webhook_deliveries,
            api_keys: ApiKeyRepo::new(pool.clone()),
            dispatcher,
            metrics: Metrics::default(),
            asset_cache,
            pool,
            settings,
        })
    }
}
