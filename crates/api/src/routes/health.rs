//! Health and metrics endpoints. `/health/live` never touches the database
//! (process is up); `/health` and `/health/ready` do (dependencies are up).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use tessera_core::DomainError;

use crate::error::Result;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    tessera_db::health_check(&state.pool).await.map_err(DomainError::from)?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn live() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn ready(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    tessera_db::health_check(&state.pool).await.map_err(DomainError::from)?;
    Ok(Json(json!({ "status": "ready" })))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}
