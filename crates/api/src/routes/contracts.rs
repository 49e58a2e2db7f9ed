//! `/api/v1/contracts` — cross-asset contract lookup plus the guarantee
//! and registration sub-resources of a single contract.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use tessera_core::contracts::require_active_for_guarantee_update;
use tessera_core::domain::{Contract, ContractStatus, Registration};

use crate::auth::{Actor, Scope};
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListContractsQuery {
    pub asset_id: Option<Uuid>,
    pub status: Option<ContractStatus>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Query(query): Query<ListContractsQuery>,
) -> Result<Json<Vec<Contract>>> {
    Ok(Json(state.contracts.list_all(query.asset_id, query.status).await?))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Contract>> {
    Ok(Json(state.contracts.get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateGuaranteesRequest {
    pub guarantees: serde_json::Value,
}

pub async fn update_guarantees(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateGuaranteesRequest>,
) -> Result<Json<Contract>> {
    actor.require(Scope::Write)?;
    let contract = state.contracts.get(id).await?;
    let asset = state.assets.get(contract.asset_id).await?;
    actor.must_own_team(asset.owner_team)?;
    require_active_for_guarantee_update(contract.status)?;

    // Unknown keys are preserved verbatim; KNOWN_GUARANTEE_KEYS only drives
    // evaluation of the guarantees tessera-ingest's impact checker understands.
    Ok(Json(state.contracts.update_guarantees(id, body.guarantees).await?))
}

pub async fn list_registrations(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Registration>>> {
    Ok(Json(state.registrations.list_for_contract(id).await?))
}
