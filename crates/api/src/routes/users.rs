//! `/api/v1/users` — user management. Creating or editing a user requires
//! admin scope or team-admin scope over the target team.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{Actor, Scope};
use crate::error::Result;
use crate::state::AppState;
use tessera_core::domain::{User, UserRole};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: Option<String>,
    pub role: UserRole,
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub team_id: Option<Uuid>,
    pub email: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.users.list(query.team_id, query.email.as_deref()).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<CreateUserRequest>,
) -> Result<Json<User>> {
    if let Some(team_id) = body.team_id {
        actor.must_own_team(team_id)?;
    } else {
        actor.must_be_admin()?;
    }

    let password_hash = match &body.password {
        Some(password) => Some(crate::bootstrap::hash_password(password)?),
        None => None,
    };

    Ok(Json(
        state
            .users
            .create(&body.email, &body.name, password_hash.as_deref(), body.role, body.team_id)
            .await?,
    ))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<User>> {
    Ok(Json(state.users.get(id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    let target = state.users.get(id).await?;
    if let Some(team_id) = target.team_id {
        actor.must_own_team(team_id)?;
    } else {
        actor.must_be_admin()?;
    }
    Ok(Json(state.users.update(id, body.name.as_deref(), body.team_id).await?))
}

pub async fn deactivate(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<User>> {
    actor.must_be_admin()?;
    state.users.deactivate(id).await?;
    Ok(Json(state.users.get(id).await?))
}

pub async fn reactivate(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<User>> {
    actor.must_be_admin()?;
    state.users.reactivate(id).await?;
    Ok(Json(state.users.get(id).await?))
}
