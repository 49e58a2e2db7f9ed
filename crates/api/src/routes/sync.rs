//! `/api/v1/sync/*` — manifest ingestion (spec §4.4) and its siblings: dbt
//! upload/diff/impact, OpenAPI and GraphQL operation ingestion, and the
//! git-friendly push/pull YAML export.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use tessera_core::domain::{Asset, CompatibilityMode, Contract, GuaranteeEvaluationMode, ResourceType};
use tessera_core::version;
use tessera_core::DomainError;
use tessera_db::repo::assets::NewAsset;
use tessera_db::repo::contracts::{PublishOutcome, PublishRequest};
use tessera_ingest::dbt::{ConflictMode, DbtManifest, IngestContext, UploadReport, UploadRequest};
use tessera_ingest::diff_preview::{self, DiffPreviewReport};
use tessera_ingest::git_sync;
use tessera_ingest::graphql;
use tessera_ingest::impact::{self, ImpactReport};
use tessera_ingest::openapi::{self, OpenApiDocument};
use tessera_webhooks::events::ContractPublishedPayload;

use crate::auth::{Actor, Scope};
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DbtUploadRequest {
    pub manifest: DbtManifest,
    pub owner_team_id: Option<Uuid>,
    pub environment: String,
    #[serde(default = "default_conflict_mode")]
    pub conflict_mode: String,
    #[serde(default)]
    pub auto_publish_contracts: bool,
    #[serde(default)]
    pub auto_create_proposals: bool,
    #[serde(default)]
    pub auto_register_consumers: bool,
    #[serde(default)]
    pub infer_consumers_from_refs: bool,
}

fn default_conflict_mode() -> String {
    "ignore".to_string()
}

pub async fn dbt_upload(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<DbtUploadRequest>,
) -> Result<Json<UploadReport>> {
    actor.require(Scope::Write)?;
    let published_by = actor
        .user_id
        .ok_or_else(|| DomainError::bad_request("uploading a manifest requires an authenticated user"))?;
    if let Some(team_id) = body.owner_team_id {
        actor.must_own_team(team_id)?;
    }

    let ctx = IngestContext::new(state.pool.clone(), state.dispatcher.clone());
    let req = UploadRequest {
        owner_team_id: body.owner_team_id,
        environment: body.environment,
        conflict_mode: ConflictMode::parse(&body.conflict_mode)?,
        auto_publish_contracts: body.auto_publish_contracts,
        auto_create_proposals: body.auto_create_proposals,
        auto_register_consumers: body.auto_register_consumers,
        infer_consumers_from_refs: body.infer_consumers_from_refs,
        published_by,
    };
    let report = tessera_ingest::dbt::upload_manifest(&ctx, &body.manifest, req).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct DbtDiffRequest {
    pub manifest: DbtManifest,
    pub owner_team_id: Uuid,
    pub environment: String,
    #[serde(default)]
    pub fail_on_breaking: bool,
}

pub async fn dbt_diff(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<DbtDiffRequest>,
) -> Result<Json<DiffPreviewReport>> {
    actor.must_own_team(body.owner_team_id)?;
    let report =
        diff_preview::preview(&state.assets, &state.contracts, &body.manifest, body.owner_team_id, &body.environment, body.fail_on_breaking)
            .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct DbtImpactRequest {
    pub manifest: DbtManifest,
    pub environment: String,
}

pub async fn dbt_impact(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Json(body): Json<DbtImpactRequest>,
) -> Result<Json<ImpactReport>> {
    let report =
        impact::check_manifest(&state.assets, &state.contracts, &state.registrations, &body.manifest, &body.environment).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct OpenApiIngestRequest {
    pub document: OpenApiDocument,
    pub owner_team_id: Uuid,
    pub environment: String,
}

#[derive(Debug, serde::Serialize, Default)]
pub struct OperationIngestReport {
    pub assets_created: u32,
    pub assets_updated: u32,
    pub contracts_published: u32,
}

pub async fn openapi_sync(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<OpenApiIngestRequest>,
) -> Result<Json<OperationIngestReport>> {
    actor.require(Scope::Write)?;
    actor.must_own_team(body.owner_team_id)?;
    let published_by = actor
        .user_id
        .ok_or_else(|| DomainError::bad_request("syncing requires an authenticated user"))?;

    let mut report = OperationIngestReport::default();
    for entry in openapi::operations(&body.document) {
        ingest_operation(
            &state,
            &entry.fqn,
            body.owner_team_id,
            &body.environment,
            ResourceType::ApiEndpoint,
            entry.schema,
            published_by,
            &mut report,
        )
        .await?;
    }
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct GraphqlIngestRequest {
    pub sdl: String,
    pub owner_team_id: Uuid,
    pub environment: String,
}

pub async fn graphql_sync(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<GraphqlIngestRequest>,
) -> Result<Json<OperationIngestReport>> {
    actor.require(Scope::Write)?;
    actor.must_own_team(body.owner_team_id)?;
    let published_by = actor
        .user_id
        .ok_or_else(|| DomainError::bad_request("syncing requires an authenticated user"))?;

    let mut report = OperationIngestReport::default();
    for entry in graphql::fields(&body.sdl) {
        ingest_operation(
            &state,
            &entry.fqn,
            body.owner_team_id,
            &body.environment,
            ResourceType::GraphqlQuery,
            entry.schema,
            published_by,
            &mut report,
        )
        .await?;
    }
    Ok(Json(report))
}

/// Shared asset-upsert + force-publish step behind both the OpenAPI and
/// GraphQL ingestion routes: one FQN becomes one asset, each sync bumps its
/// contract to a new minor version without gating on breaking changes (the
/// operator re-running a sync already knows what changed).
async fn ingest_operation(
    state: &AppState,
    fqn: &str,
    owner_team_id: Uuid,
    environment: &str,
    resource_type: ResourceType,
    schema: Value,
    published_by: Uuid,
    report: &mut OperationIngestReport,
) -> Result<()> {
    let cached = match &state.asset_cache {
        Some(cache) => cache.get(fqn, environment).await,
        None => None,
    };

    let asset = match cached {
        Some(existing) => {
            report.assets_updated += 1;
            existing
        }
        None => match state.assets.get_by_fqn(fqn, environment).await? {
            Some(existing) => {
                report.assets_updated += 1;
                existing
            }
            None => {
                let created = state
                    .assets
                    .create(NewAsset {
                        fqn,
                        owner_team: owner_team_id,
                        owner_user: None,
                        environment,
                        resource_type,
                        guarantee_evaluation_mode: GuaranteeEvaluationMode::Automatic,
                        metadata: serde_json::json!({}),
                    })
                    .await?;
                report.assets_created += 1;
                created
            }
        },
    };

    if let Some(cache) = &state.asset_cache {
        cache.set(&asset).await;
    }

    let next_version = match state.contracts.get_active(asset.id).await? {
        Some(current) => version::bump_minor(&current.version),
        None => version::first_version().to_string(),
    };

    let outcome = state
        .contracts
        .publish(PublishRequest {
            asset_id: asset.id,
            version: &next_version,
            schema,
            compatibility_mode: CompatibilityMode::Backward,
            guarantees: serde_json::json!({}),
            producer_team: owner_team_id,
            published_by,
            force: true,
        })
        .await?;
    match outcome {
        PublishOutcome::Published(contract) | PublishOutcome::ForcePublished { contract, .. } => {
            report.contracts_published += 1;
            fire_contract_published(state, &asset, &contract, published_by).await?;
        }
        PublishOutcome::ProposalRequired { .. } => {}
    }
    Ok(())
}

async fn fire_contract_published(state: &AppState, asset: &Asset, contract: &Contract, published_by: Uuid) -> Result<()> {
    let producer_team = state.teams.get(asset.owner_team).await?;
    state.dispatcher.fire_and_forget(&ContractPublishedPayload {
        contract_id: contract.id,
        asset_id: asset.id,
        asset_fqn: asset.fqn.clone(),
        version: contract.version.clone(),
        producer_team_id: asset.owner_team,
        producer_team_name: producer_team.name,
        from_proposal_id: None,
    });
    state
        .audit_events
        .record("contract_published", "contract", contract.id, Some(published_by), serde_json::json!({ "asset_id": asset.id }))
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SyncPathRequest {
    pub path: Option<String>,
}

pub async fn push(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<SyncPathRequest>,
) -> Result<Json<git_sync::PushReport>> {
    actor.must_be_admin()?;
    let root = resolve_sync_path(&state, body.path)?;
    Ok(Json(git_sync::push(&state.teams, &state.assets, &state.contracts, &state.registrations, &root).await?))
}

pub async fn pull(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<SyncPathRequest>,
) -> Result<Json<git_sync::PullReport>> {
    actor.must_be_admin()?;
    let root = resolve_sync_path(&state, body.path)?;
    Ok(Json(git_sync::pull(&state.teams, &state.assets, &state.contracts, &state.registrations, &root).await?))
}

fn resolve_sync_path(state: &AppState, override_path: Option<String>) -> Result<PathBuf> {
    override_path
        .or_else(|| state.settings.git_sync_path.clone())
        .map(PathBuf::from)
        .ok_or_else(|| DomainError::bad_request("no git_sync_path configured and no path supplied").into())
}
