//! `/api/v1/assets` — asset CRUD plus the contract, dependency, lineage,
//! impact, and audit sub-resources nested under a single asset.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use tessera_core::domain::{
    Asset, AssetDependency, AuditRun, AuditRunStatus, CompatibilityMode, Contract, DependencyKind,
    GuaranteeEvaluationMode, ResourceType,
};
use tessera_core::schema_diff::diff_schemas;
use tessera_core::{audit_runs, DomainError};
use tessera_db::repo::assets::NewAsset;
use tessera_db::repo::audit_runs::NewAuditRun;
use tessera_db::repo::contracts::{PublishOutcome, PublishRequest};
use tessera_db::repo::proposals::NewProposal;
use tessera_ingest::impact::{check_asset, ModelImpact};

use crate::auth::{Actor, Scope};
use crate::error::Result;
use crate::state::AppState;
use tessera_webhooks::events::{ContractPublishedPayload, ImpactedConsumer, ProposalCreatedPayload};

const DEFAULT_PROPOSAL_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
pub struct CreateAssetRequest {
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
pub struct UpdateAssetRequest {
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct ListAssetsQuery {
    pub owner_team: Option<Uuid>,
    pub environment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchAssetsQuery {
    pub q: String,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Query(query): Query<ListAssetsQuery>,
) -> Result<Json<Vec<Asset>>> {
    Ok(Json(state.assets.list_all(query.owner_team, query.environment.as_deref()).await?))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Query(query): Query<SearchAssetsQuery>,
) -> Result<Json<Vec<Asset>>> {
    Ok(Json(state.assets.search(&query.q).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<CreateAssetRequest>,
) -> Result<Json<Asset>> {
    actor.must_own_team(body.owner_team)?;
    let asset = state
        .assets
        .create(NewAsset {
            fqn: &body.fqn,
            owner_team: body.owner_team,
            owner_user: body.owner_user,
            environment: &body.environment,
            resource_type: body.resource_type,
            guarantee_evaluation_mode: body.guarantee_evaluation_mode,
            metadata: body.metadata,
        })
        .await?;
    Ok(Json(asset))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Asset>> {
    Ok(Json(state.assets.get(id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAssetRequest>,
) -> Result<Json<Asset>> {
    let asset = state.assets.get(id).await?;
    actor.must_own_team(asset.owner_team)?;
    Ok(Json(state.assets.update_metadata(id, body.metadata).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let asset = state.assets.get(id).await?;
    actor.must_own_team(asset.owner_team)?;
    state.assets.soft_delete(id).await?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

// --- dependencies -----------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AddDependencyRequest {
    pub upstream_asset_id: Uuid,
    pub kind: DependencyKind,
}

pub async fn list_dependencies(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AssetDependency>>> {
    Ok(Json(state.dependencies.upstream_of(id).await?))
}

pub async fn add_dependency(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<AddDependencyRequest>,
) -> Result<Json<AssetDependency>> {
    let asset = state.assets.get(id).await?;
    actor.must_own_team(asset.owner_team)?;
    Ok(Json(state.dependencies.upsert(id, body.upstream_asset_id, body.kind).await?))
}

pub async fn remove_dependency(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((id, dep_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>> {
    let asset = state.assets.get(id).await?;
    actor.must_own_team(asset.owner_team)?;
    state.dependencies.remove(dep_id).await?;
    Ok(Json(serde_json::json!({ "status": "removed" })))
}

#[derive(Debug, serde::Serialize)]
pub struct LineageResponse {
    pub upstream: Vec<AssetDependency>,
    pub downstream: Vec<AssetDependency>,
}

pub async fn lineage(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<LineageResponse>> {
    let upstream = state.dependencies.upstream_of(id).await?;
    let downstream = state.dependencies.downstream_of(id).await?;
    Ok(Json(LineageResponse { upstream, downstream }))
}

// --- contracts ----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PublishContractRequest {
    pub version: String,
    pub schema: Value,
    pub compatibility_mode: CompatibilityMode,
    #[serde(default)]
    pub guarantees: Value,
    #[serde(default)]
    pub force: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_expire: Option<bool>,
}

#[derive(Debug, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishContractResponse {
    Published(Contract),
    ForcePublished { contract: Contract, warning: String },
    ProposalRequired { proposal_id: Uuid, breaking_changes_count: usize },
}

pub async fn list_contracts(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Contract>>> {
    Ok(Json(state.contracts.history_for_asset(id).await?))
}

/// `POST /api/v1/assets/{id}/contracts`: publish, force-publish, or fall
/// back to creating a proposal, firing the matching webhook either way.
pub async fn publish_contract(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<PublishContractRequest>,
) -> Result<Json<PublishContractResponse>> {
    actor.require(Scope::Write)?;
    let asset = state.assets.get(id).await?;
    actor.must_own_team(asset.owner_team)?;
    let published_by = actor
        .user_id
        .ok_or_else(|| DomainError::bad_request("publishing a contract requires an authenticated user"))?;

    let outcome = state
        .contracts
        .publish(PublishRequest {
            asset_id: id,
            version: &body.version,
            schema: body.schema.clone(),
            compatibility_mode: body.compatibility_mode,
            guarantees: body.guarantees.clone(),
            producer_team: asset.owner_team,
            published_by,
            force: body.force,
        })
        .await?;

    let response = match outcome {
        PublishOutcome::Published(contract) => {
            fire_contract_published(&state, &asset, &contract, None).await?;
            PublishContractResponse::Published(contract)
        }
        PublishOutcome::ForcePublished { contract, warning } => {
            fire_contract_published(&state, &asset, &contract, None).await?;
            PublishContractResponse::ForcePublished { contract, warning }
        }
        PublishOutcome::ProposalRequired { breaking_changes } => {
            let current = state.contracts.get_active(id).await?;
            let diff_classification = current
                .as_ref()
                .map(|c| diff_schemas(&c.schema, &body.schema).change_type)
                .unwrap_or(tessera_core::schema_diff::ChangeType::Major);

            let expires_at = body
                .expires_at
                .unwrap_or_else(|| Utc::now() + Duration::days(DEFAULT_PROPOSAL_WINDOW_DAYS));

            let proposal = state
                .proposals
                .create(NewProposal {
                    asset_id: id,
                    proposed_schema: body.schema.clone(),
                    proposed_guarantees: body.guarantees.clone(),
                    diff_classification,
                    breaking_changes: &breaking_changes,
                    proposer_team: asset.owner_team,
                    proposer_user: published_by,
                    expires_at: Some(expires_at),
                    auto_expire: body.auto_expire.unwrap_or(true),
                })
                .await?;

            state
                .audit_events
                .record("proposal_created", "proposal", proposal.id, Some(published_by), serde_json::json!({ "asset_id": id }))
                .await?;

            let impacted = impacted_consumers(&state, id).await?;
            let producer_team = state.teams.get(asset.owner_team).await?;
            state.dispatcher.fire_and_forget(&ProposalCreatedPayload {
                proposal_id: proposal.id,
                asset_id: id,
                asset_fqn: asset.fqn.clone(),
                producer_team_id: asset.owner_team,
                producer_team_name: producer_team.name,
                proposed_version: body.version.clone(),
                breaking_changes: proposal.breaking_changes.clone(),
                impacted_consumers: impacted,
            });

            PublishContractResponse::ProposalRequired {
                proposal_id: proposal.id,
                breaking_changes_count: proposal.breaking_changes.len(),
            }
        }
    };

    Ok(Json(response))
}

async fn fire_contract_published(
    state: &AppState,
    asset: &Asset,
    contract: &Contract,
    from_proposal_id: Option<Uuid>,
) -> Result<()> {
    let producer_team = state.teams.get(asset.owner_team).await?;
    state.dispatcher.fire_and_forget(&ContractPublishedPayload {
        contract_id: contract.id,
        asset_id: asset.id,
        asset_fqn: asset.fqn.clone(),
        version: contract.version.clone(),
        producer_team_id: asset.owner_team,
        producer_team_name: producer_team.name,
        from_proposal_id,
    });
    state
        .audit_events
        .record("contract_published", "contract", contract.id, Some(contract.published_by), serde_json::json!({ "asset_id": asset.id }))
        .await?;
    Ok(())
}

async fn impacted_consumers(state: &AppState, asset_id: Uuid) -> Result<Vec<ImpactedConsumer>> {
    let consumer_teams = state.registrations.active_consumers_for_asset(asset_id).await?;
    let mut impacted = Vec::with_capacity(consumer_teams.len());
    for team_id in consumer_teams {
        let team = state.teams.get(team_id).await?;
        impacted.push(ImpactedConsumer { team_id, team_name: team.name, pinned_version: None });
    }
    Ok(impacted)
}

// --- impact ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ImpactRequest {
    pub proposed_schema: Value,
}

pub async fn impact(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<ImpactRequest>,
) -> Result<Json<ModelImpact>> {
    let mut result = check_asset(&state.contracts, &state.registrations, id, &body.proposed_schema).await?;
    let asset = state.assets.get(id).await?;
    result.fqn = asset.fqn;
    Ok(Json(result))
}

// --- audit results ----------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReportAuditRequest {
    pub contract_id: Option<Uuid>,
    pub triggered_by: String,
    pub external_run_id: Option<String>,
    pub details: Value,
}

pub async fn report_audit(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<ReportAuditRequest>,
) -> Result<Json<AuditRun>> {
    actor.require(Scope::Write)?;
    audit_runs::validate_report_payload(&body.details)?;
    let counts = audit_runs::derive_counts(&body.details);
    let (checked, passed, failed) = counts.unwrap_or((0, 0, 0));
    let status = if failed == 0 && checked > 0 {
        AuditRunStatus::Passed
    } else if passed == 0 && checked > 0 {
        AuditRunStatus::Failed
    } else {
        AuditRunStatus::Partial
    };

    let run = state
        .audit_runs
        .report(NewAuditRun {
            asset_id: id,
            contract_id: body.contract_id,
            status,
            checked_count: checked,
            passed_count: passed,
            failed_count: failed,
            triggered_by: &body.triggered_by,
            external_run_id: body.external_run_id.as_deref(),
            details: body.details,
        })
        .await?;
    Ok(Json(run))
}

#[derive(Debug, Deserialize)]
pub struct AuditHistoryQuery {
    pub limit: Option<i64>,
}

pub async fn audit_history(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<AuditHistoryQuery>,
) -> Result<Json<Vec<AuditRun>>> {
    let limit = query.limit.unwrap_or(audit_runs::MAX_HISTORY_LIMIT);
    Ok(Json(state.audit_runs.history(id, limit).await?))
}

pub async fn audit_trends(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<audit_runs::Trends>> {
    let runs = state.audit_runs.last_30_days(id).await?;
    let most_recent = state.audit_runs.most_recent(id).await?;
    let trends = audit_runs::compute_trends(&runs, most_recent.as_ref(), Utc::now());
    Ok(Json(trends))
}
