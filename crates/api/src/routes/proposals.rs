//! `/api/v1/proposals` — the pending-breaking-change state machine (spec
//! §4.3): list/read, acknowledge, withdraw, force-approve, expire, and
//! publish-from-approved.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tessera_core::domain::{AckResponse, Acknowledgment, Proposal, ProposalStatus};
use tessera_core::proposals::{self, require_approved};
use tessera_core::DomainError;
use tessera_db::repo::acknowledgments::SubmitAck;
use tessera_db::repo::contracts::{PublishOutcome, PublishRequest};

use crate::auth::{Actor, Scope};
use crate::error::Result;
use crate::state::AppState;
use tessera_webhooks::events::{
    AcknowledgmentPayload, ContractPublishedPayload, ProposalStatusEvent, ProposalStatusPayload, WebhookEventType,
};

#[derive(Debug, Deserialize)]
pub struct ListProposalsQuery {
    pub status: Option<ProposalStatus>,
    pub asset_id: Option<Uuid>,
    pub proposed_by: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Query(query): Query<ListProposalsQuery>,
) -> Result<Json<Vec<Proposal>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);
    Ok(Json(
        state
            .proposals
            .list(query.status, query.asset_id, query.proposed_by, limit, offset)
            .await?,
    ))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Proposal>> {
    Ok(Json(state.proposals.get(id).await?))
}

#[derive(Debug, Serialize)]
pub struct ProposalStatusResponse {
    pub proposal: Proposal,
    pub acknowledgments: Vec<Acknowledgment>,
    pub pending_consumers: Vec<Uuid>,
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ProposalStatusResponse>> {
    let proposal = state.proposals.get(id).await?;
    let acknowledgments = state.acknowledgments.list_for_proposal(id).await?;
    let registered: HashSet<Uuid> = state.registrations.active_consumers_for_asset(proposal.asset_id).await?.into_iter().collect();
    let acked: HashSet<Uuid> = acknowledgments.iter().map(|a| a.consumer_team).collect();
    let pending_consumers = registered.difference(&acked).copied().collect();
    Ok(Json(ProposalStatusResponse { proposal, acknowledgments, pending_consumers }))
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub consumer_team: Uuid,
    pub response: AckResponse,
    pub migration_deadline: Option<chrono::DateTime<chrono::Utc>>,
    pub notes: Option<String>,
}

pub async fn acknowledge(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<AcknowledgeRequest>,
) -> Result<Json<Proposal>> {
    actor.must_own_team(body.consumer_team)?;
    let acknowledging_user = actor
        .user_id
        .ok_or_else(|| DomainError::bad_request("acknowledging a proposal requires an authenticated user"))?;

    let outcome = state
        .acknowledgments
        .submit(SubmitAck {
            proposal_id: id,
            consumer_team: body.consumer_team,
            acknowledging_user,
            response: body.response,
            migration_deadline: body.migration_deadline,
            notes: body.notes.as_deref(),
        })
        .await?;

    let proposal = state.proposals.get(id).await?;
    let asset = state.assets.get(proposal.asset_id).await?;
    let consumer_team = state.teams.get(body.consumer_team).await?;

    let acks = state.acknowledgments.list_for_proposal(id).await?;
    let registered = state.registrations.active_consumers_for_asset(proposal.asset_id).await?;
    let acked_count = acks.len() as u32;
    let pending_count = registered.len().saturating_sub(acks.len()) as u32;

    state.dispatcher.fire_and_forget(&AcknowledgmentPayload {
        proposal_id: id,
        asset_id: proposal.asset_id,
        asset_fqn: asset.fqn.clone(),
        consumer_team_id: body.consumer_team,
        consumer_team_name: consumer_team.name,
        response: ack_response_str(body.response).to_string(),
        migration_deadline: body.migration_deadline,
        notes: body.notes.clone(),
        pending_count,
        acknowledged_count: acked_count,
    });

    if outcome.proposal_status != ProposalStatus::Pending {
        fire_status_event(&state, &proposal, outcome.proposal_status, None).await?;
    }

    state
        .audit_events
        .record("proposal_acknowledged", "proposal", id, Some(acknowledging_user), serde_json::json!({ "response": ack_response_str(body.response) }))
        .await?;

    Ok(Json(proposal))
}

pub(crate) fn ack_response_str(response: AckResponse) -> &'static str {
    match response {
        AckResponse::Approved => "approved",
        AckResponse::Blocked => "blocked",
        AckResponse::NeedsChanges => "needs_changes",
    }
}

pub(crate) async fn fire_status_event(
    state: &AppState,
    proposal: &Proposal,
    status: ProposalStatus,
    actor_team: Option<(Uuid, String)>,
) -> Result<()> {
    let asset = state.assets.get(proposal.asset_id).await?;
    let event_type = match status {
        ProposalStatus::Approved => WebhookEventType::ProposalApproved,
        ProposalStatus::Rejected => WebhookEventType::ProposalRejected,
        ProposalStatus::Withdrawn => WebhookEventType::ProposalWithdrawn,
        ProposalStatus::Expired => WebhookEventType::ProposalExpired,
        ProposalStatus::Pending => return Ok(()),
    };
    let (actor_team_id, actor_team_name) = match actor_team {
        Some((id, name)) => (Some(id), Some(name)),
        None => (None, None),
    };
    state.dispatcher.fire_and_forget_status(ProposalStatusEvent {
        event_type,
        payload: ProposalStatusPayload {
            proposal_id: proposal.id,
            asset_id: proposal.asset_id,
            asset_fqn: asset.fqn,
            status: status_str(status).to_string(),
            actor_team_id,
            actor_team_name,
        },
    });
    Ok(())
}

fn status_str(status: ProposalStatus) -> &'static str {
    match status {
        ProposalStatus::Pending => "pending",
        ProposalStatus::Approved => "approved",
        ProposalStatus::Rejected => "rejected",
        ProposalStatus::Withdrawn => "withdrawn",
        ProposalStatus::Expired => "expired",
    }
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Proposal>> {
    let proposal = state.proposals.get(id).await?;
    actor.must_own_team(proposal.proposer_team)?;
    let proposal = state.proposals.transition(id, ProposalStatus::Withdrawn).await?;
    fire_status_event(&state, &proposal, ProposalStatus::Withdrawn, Some((proposal.proposer_team, state.teams.get(proposal.proposer_team).await?.name))).await?;
    Ok(Json(proposal))
}

pub async fn expire(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Proposal>> {
    let proposal = state.proposals.get(id).await?;
    actor.must_own_team(proposal.proposer_team)?;
    let proposal = state.proposals.transition(id, ProposalStatus::Expired).await?;
    fire_status_event(&state, &proposal, ProposalStatus::Expired, None).await?;
    Ok(Json(proposal))
}

pub async fn force(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Proposal>> {
    let proposal = state.proposals.get(id).await?;
    actor.must_own_team(proposal.proposer_team)?;
    proposals::require_mutable(proposal.status)?;
    let proposal = state.proposals.transition(id, ProposalStatus::Approved).await?;
    let team_name = state.teams.get(proposal.proposer_team).await?.name;
    fire_status_event(&state, &proposal, ProposalStatus::Approved, Some((proposal.proposer_team, team_name))).await?;
    Ok(Json(proposal))
}

#[derive(Debug, Deserialize)]
pub struct PublishFromProposalRequest {
    pub version: String,
}

pub async fn publish(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<PublishFromProposalRequest>,
) -> Result<Json<Proposal>> {
    let proposal = state.proposals.get(id).await?;
    actor.must_own_team(proposal.proposer_team)?;
    require_approved(proposal.status)?;

    let outcome = state
        .contracts
        .publish(PublishRequest {
            asset_id: proposal.asset_id,
            version: &body.version,
            schema: proposal.proposed_schema.clone(),
            compatibility_mode: state
                .contracts
                .get_active(proposal.asset_id)
                .await?
                .map(|c| c.compatibility_mode)
                .unwrap_or(tessera_core::domain::CompatibilityMode::Backward),
            guarantees: proposal.proposed_guarantees.clone(),
            producer_team: proposal.proposer_team,
            published_by: proposal.proposer_user,
            force: true,
        })
        .await?;

    let asset = state.assets.get(proposal.asset_id).await?;
    let producer_team = state.teams.get(proposal.proposer_team).await?;
    match outcome {
        PublishOutcome::Published(contract) | PublishOutcome::ForcePublished { contract, .. } => {
            state.dispatcher.fire_and_forget(&ContractPublishedPayload {
                contract_id: contract.id,
                asset_id: asset.id,
                asset_fqn: asset.fqn,
                version: contract.version,
                producer_team_id: proposal.proposer_team,
                producer_team_name: producer_team.name,
                from_proposal_id: Some(id),
            });
        }
        PublishOutcome::ProposalRequired { .. } => {
            return Err(DomainError::Internal("force-publish from an approved proposal unexpectedly produced a new proposal".into()).into());
        }
    }

    state
        .audit_events
        .record("contract_published", "proposal", id, Some(proposal.proposer_user), serde_json::json!({ "asset_id": proposal.asset_id }))
        .await?;

    Ok(Json(proposal))
}
