//! `/api/v1/registrations` — consumers registering against a published
//! contract, and revoking a prior registration.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use tessera_core::domain::Registration;

use crate::auth::Actor;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRegistrationRequest {
    pub contract_id: Uuid,
    pub consumer_team: Uuid,
    pub pinned_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListRegistrationsQuery {
    pub contract_id: Option<Uuid>,
    pub consumer_team: Option<Uuid>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Query(query): Query<ListRegistrationsQuery>,
) -> Result<Json<Vec<Registration>>> {
    Ok(Json(state.registrations.list_all(query.contract_id, query.consumer_team).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<CreateRegistrationRequest>,
) -> Result<Json<Registration>> {
    actor.must_own_team(body.consumer_team)?;
    Ok(Json(
        state
            .registrations
            .register(body.contract_id, body.consumer_team, body.pinned_version.as_deref())
            .await?,
    ))
}

pub async fn revoke(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    actor.require(crate::auth::Scope::Write)?;
    state.registrations.revoke(id).await?;
    Ok(Json(serde_json::json!({ "status": "revoked" })))
}
