//! API routes.

pub mod assets;
pub mod bulk;
pub mod contracts;
pub mod health;
pub mod proposals;
pub mod registrations;
pub mod sync;
pub mod teams;
pub mod users;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::middleware::track_metrics;
use crate::state::AppState;

/// Wires every route named in the HTTP surface (spec §6) onto a single
/// router, mirroring the teacher's flat `create_router` shape.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(health::metrics))
        .route("/api/v1/teams", get(teams::list).post(teams::create))
        .route("/api/v1/teams/:id", get(teams::get).patch(teams::update).delete(teams::delete))
        .route("/api/v1/users", get(users::list).post(users::create))
        .route("/api/v1/users/:id", get(users::get).patch(users::update).delete(users::deactivate))
        .route("/api/v1/users/:id/reactivate", post(users::reactivate))
        .route("/api/v1/assets", get(assets::list).post(assets::create))
        .route("/api/v1/assets/search", get(assets::search))
        .route("/api/v1/assets/:id", get(assets::get).patch(assets::update).delete(assets::delete))
        .route("/api/v1/assets/:id/contracts", get(assets::list_contracts).post(assets::publish_contract))
        .route("/api/v1/assets/:id/dependencies", get(assets::list_dependencies).post(assets::add_dependency))
        .route("/api/v1/assets/:id/dependencies/:dep_id", axum::routing::delete(assets::remove_dependency))
        .route("/api/v1/assets/:id/lineage", get(assets::lineage))
        .route("/api/v1/assets/:id/impact", post(assets::impact))
        .route("/api/v1/assets/:id/audit-results", post(assets::report_audit))
        .route("/api/v1/assets/:id/audit-history", get(assets::audit_history))
        .route("/api/v1/assets/:id/audit-trends", get(assets::audit_trends))
        .route("/api/v1/contracts", get(contracts::list))
        .route("/api/v1/contracts/:id", get(contracts::get))
        .route("/api/v1/contracts/:id/guarantees", patch(contracts::update_guarantees))
        .route("/api/v1/contracts/:id/registrations", get(contracts::list_registrations))
        .route("/api/v1/registrations", get(registrations::list).post(registrations::create))
        .route("/api/v1/registrations/:id", axum::routing::delete(registrations::revoke))
        .route("/api/v1/proposals", get(proposals::list))
        .route("/api/v1/proposals/:id", get(proposals::get))
        .route("/api/v1/proposals/:id/status", get(proposals::status))
        .route("/api/v1/proposals/:id/acknowledge", post(proposals::acknowledge))
        .route("/api/v1/proposals/:id/withdraw", post(proposals::withdraw))
        .route("/api/v1/proposals/:id/force", post(proposals::force))
        .route("/api/v1/proposals/:id/expire", post(proposals::expire))
        .route("/api/v1/proposals/:id/publish", post(proposals::publish))
        .route("/api/v1/sync/dbt/upload", post(sync::dbt_upload))
        .route("/api/v1/sync/dbt/diff", post(sync::dbt_diff))
        .route("/api/v1/sync/dbt/impact", post(sync::dbt_impact))
        .route("/api/v1/sync/openapi", post(sync::openapi_sync))
        .route("/api/v1/sync/graphql", post(sync::graphql_sync))
        .route("/api/v1/sync/push", post(sync::push))
        .route("/api/v1/sync/pull", post(sync::pull))
        .route("/api/v1/bulk/registrations", post(bulk::registrations))
        .route("/api/v1/bulk/assets", post(bulk::assets))
        .route("/api/v1/bulk/acknowledgments", post(bulk::acknowledgments))
        .layer(axum::middleware::from_fn_with_state(state.clone(), track_metrics))
        .with_state(state)
}
