//! `/api/v1/bulk/*` — batch variants of asset creation, registration, and
//! proposal acknowledgment (spec §4.7). Each item is authorized and applied
//! independently; a failure in one item never implicitly rolls back another.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use tessera_core::domain::{AckResponse, GuaranteeEvaluationMode, ProposalStatus, ResourceType};
use tessera_core::DomainError;
use tessera_db::repo::acknowledgments::SubmitAck;
use tessera_db::repo::assets::NewAsset;
use tessera_webhooks::events::AcknowledgmentPayload;

use crate::auth::Actor;
use crate::error::{ApiError, Result};
use crate::routes::proposals::{ack_response_str, fire_status_event};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BulkItemResult {
    pub success: bool,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl BulkItemResult {
    fn ok(index: usize, id: Uuid) -> Self {
        Self { success: true, index, id: Some(id), error: None, details: None }
    }

    fn skipped(index: usize, id: Uuid) -> Self {
        Self {
            success: true,
            index,
            id: Some(id),
            error: None,
            details: Some(serde_json::json!({ "skipped": true, "reason": "duplicate" })),
        }
    }

    fn failed(index: usize, err: &ApiError) -> Self {
        Self { success: false, index, id: None, error: Some(err.to_string()), details: None }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkItemResult>,
}

impl BulkResponse {
    fn from_results(results: Vec<BulkItemResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;
        Self { total: results.len(), succeeded, failed, results }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkAssetItem {
    pub fqn: String,
    pub owner_team: Uuid,
    pub owner_user: Option<Uuid>,
    pub environment: String,
    pub resource_type: ResourceType,
    pub guarantee_evaluation_mode: GuaranteeEvaluationMode,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct BulkAssetsRequest {
    pub items: Vec<BulkAssetItem>,
    #[serde(default)]
    pub skip_duplicates: bool,
}

pub async fn assets(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<BulkAssetsRequest>,
) -> Result<Json<BulkResponse>> {
    let mut results = Vec::with_capacity(body.items.len());
    for (index, item) in body.items.into_iter().enumerate() {
        results.push(create_one_asset(&state, &actor, index, item, body.skip_duplicates).await);
    }
    Ok(Json(BulkResponse::from_results(results)))
}

async fn create_one_asset(state: &AppState, actor: &Actor, index: usize, item: BulkAssetItem, skip_duplicates: bool) -> BulkItemResult {
    if let Err(err) = actor.must_own_team(item.owner_team) {
        return BulkItemResult::failed(index, &ApiError::from(err));
    }
    let outcome = state
        .assets
        .create(NewAsset {
            fqn: &item.fqn,
            owner_team: item.owner_team,
            owner_user: item.owner_user,
            environment: &item.environment,
            resource_type: item.resource_type,
            guarantee_evaluation_mode: item.guarantee_evaluation_mode,
            metadata: item.metadata,
        })
        .await;

    match outcome {
        Ok(asset) => BulkItemResult::ok(index, asset.id),
        Err(DomainError::Conflict(_)) if skip_duplicates => match state.assets.get_by_fqn(&item.fqn, &item.environment).await {
            Ok(Some(existing)) => BulkItemResult::skipped(index, existing.id),
            Ok(None) => BulkItemResult::failed(index, &ApiError::from(DomainError::Conflict("duplicate asset could not be located after insert conflict".into()))),
            Err(err) => BulkItemResult::failed(index, &ApiError::from(err)),
        },
        Err(err) => BulkItemResult::failed(index, &ApiError::from(err)),
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkRegistrationItem {
    pub contract_id: Uuid,
    pub consumer_team: Uuid,
    pub pinned_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRegistrationsRequest {
    pub items: Vec<BulkRegistrationItem>,
    #[serde(default)]
    pub skip_duplicates: bool,
}

pub async fn registrations(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<BulkRegistrationsRequest>,
) -> Result<Json<BulkResponse>> {
    let mut results = Vec::with_capacity(body.items.len());
    for (index, item) in body.items.into_iter().enumerate() {
        results.push(create_one_registration(&state, &actor, index, item, body.skip_duplicates).await);
    }
    Ok(Json(BulkResponse::from_results(results)))
}

async fn create_one_registration(state: &AppState, actor: &Actor, index: usize, item: BulkRegistrationItem, skip_duplicates: bool) -> BulkItemResult {
    if let Err(err) = actor.must_own_team(item.consumer_team) {
        return BulkItemResult::failed(index, &ApiError::from(err));
    }

    if skip_duplicates {
        let existing = state.registrations.list_for_contract(item.contract_id).await;
        if let Ok(existing) = existing {
            if let Some(found) = existing.into_iter().find(|r| r.consumer_team == item.consumer_team) {
                return BulkItemResult::skipped(index, found.id);
            }
        }
    }

    match state.registrations.register(item.contract_id, item.consumer_team, item.pinned_version.as_deref()).await {
        Ok(registration) => BulkItemResult::ok(index, registration.id),
        Err(err) => BulkItemResult::failed(index, &ApiError::from(err)),
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkAcknowledgmentItem {
    pub proposal_id: Uuid,
    pub consumer_team: Uuid,
    pub response: AckResponse,
    pub migration_deadline: Option<chrono::DateTime<chrono::Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkAcknowledgmentsRequest {
    pub items: Vec<BulkAcknowledgmentItem>,
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,
}

fn default_continue_on_error() -> bool {
    true
}

pub async fn acknowledgments(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<BulkAcknowledgmentsRequest>,
) -> Result<Json<BulkResponse>> {
    let mut results = Vec::with_capacity(body.items.len());
    for (index, item) in body.items.into_iter().enumerate() {
        let result = submit_one_acknowledgment(&state, &actor, index, item).await;
        let failed = !result.success;
        results.push(result);
        if failed && !body.continue_on_error {
            break;
        }
    }
    Ok(Json(BulkResponse::from_results(results)))
}

async fn submit_one_acknowledgment(state: &AppState, actor: &Actor, index: usize, item: BulkAcknowledgmentItem) -> BulkItemResult {
    if let Err(err) = actor.must_own_team(item.consumer_team) {
        return BulkItemResult::failed(index, &ApiError::from(err));
    }
    let acknowledging_user = match actor.user_id {
        Some(id) => id,
        None => {
            return BulkItemResult::failed(
                index,
                &ApiError::from(DomainError::bad_request("acknowledging a proposal requires an authenticated user")),
            )
        }
    };

    let outcome = state
        .acknowledgments
        .submit(SubmitAck {
            proposal_id: item.proposal_id,
            consumer_team: item.consumer_team,
            acknowledging_user,
            response: item.response,
            migration_deadline: item.migration_deadline,
            notes: item.notes.as_deref(),
        })
        .await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => return BulkItemResult::failed(index, &ApiError::from(err)),
    };

    if let Err(err) = notify_acknowledgment(state, &item, acknowledging_user, outcome.proposal_status).await {
        return BulkItemResult::failed(index, &err);
    }

    BulkItemResult::ok(index, outcome.acknowledgment.id)
}

/// Fires the same webhook and audit events as the single-item acknowledge
/// handler: the acknowledgment payload always, a status-transition event
/// whenever the proposal leaves `pending`, and an audit-trail row for the ack
/// itself.
async fn notify_acknowledgment(
    state: &AppState,
    item: &BulkAcknowledgmentItem,
    acknowledging_user: Uuid,
    proposal_status: ProposalStatus,
) -> std::result::Result<(), ApiError> {
    let proposal = state.proposals.get(item.proposal_id).await?;
    let asset = state.assets.get(proposal.asset_id).await?;
    let consumer_team = state.teams.get(item.consumer_team).await?;

    let acks = state.acknowledgments.list_for_proposal(item.proposal_id).await?;
    let registered = state.registrations.active_consumers_for_asset(proposal.asset_id).await?;
    let acked_count = acks.len() as u32;
    let pending_count = registered.len().saturating_sub(acks.len()) as u32;

    state.dispatcher.fire_and_forget(&AcknowledgmentPayload {
        proposal_id: item.proposal_id,
        asset_id: proposal.asset_id,
        asset_fqn: asset.fqn.clone(),
        consumer_team_id: item.consumer_team,
        consumer_team_name: consumer_team.name,
        response: ack_response_str(item.response).to_string(),
        migration_deadline: item.migration_deadline,
        notes: item.notes.clone(),
        pending_count,
        acknowledged_count: acked_count,
    });

    if proposal_status != ProposalStatus::Pending {
        fire_status_event(state, &proposal, proposal_status, None).await?;
    }

    state
        .audit_events
        .record(
            "proposal_acknowledged",
            "proposal",
            item.proposal_id,
            Some(acknowledging_user),
            serde_json::json!({ "response": ack_response_str(item.response) }),
        )
        .await?;

    Ok(())
}
