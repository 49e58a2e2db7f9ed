//! `/api/v1/teams` — team CRUD. Only an admin may create, rename, or delete
//! a team; any authenticated caller may list or read one.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{Actor, Scope};
use crate::error::Result;
use crate::state::AppState;
use tessera_core::domain::Team;

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    pub metadata: Option<Value>,
}

pub async fn list(State(state): State<Arc<AppState>>, _actor: Actor) -> Result<Json<Vec<Team>>> {
    Ok(Json(state.teams.list().await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<CreateTeamRequest>,
) -> Result<Json<Team>> {
    actor.require(Scope::Admin)?;
    Ok(Json(state.teams.create(&body.name, body.metadata).await?))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Team>> {
    Ok(Json(state.teams.get(id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTeamRequest>,
) -> Result<Json<Team>> {
    actor.must_own_team(id)?;
    let team = match &body.name {
        Some(name) => state.teams.rename(id, name).await?,
        None => state.teams.get(id).await?,
    };
    let team = match &body.metadata {
        Some(metadata) => state.teams.update_metadata(id, metadata.clone()).await?,
        None => team,
    };
    Ok(Json(team))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    actor.require(Scope::Admin)?;
    state.teams.soft_delete(id).await?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}
