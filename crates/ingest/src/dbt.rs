//! dbt `manifest.json` ingestion (spec §4.4).
//!
//! Grounded on the reference `sync.py`'s `extract_guarantees_from_tests`,
//! `dbt_columns_to_json_schema`, and `extract_tessera_meta`, re-expressed
//! over a serde-typed manifest model instead of dynamic dict access.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tessera_core::domain::{
    CompatibilityMode, GuaranteeEvaluationMode, ResourceType,
};
use tessera_core::schema_diff::{check_compatibility, diff_schemas};
use tessera_core::{version, DomainError, Result};
use tessera_db::repo::assets::NewAsset;
use tessera_db::repo::contracts::{PublishOutcome, PublishRequest};
use tessera_db::repo::proposals::NewProposal;
use tessera_db::repo::{AssetRepo, AuditEventRepo, ContractRepo, ProposalRepo, RegistrationRepo, TeamRepo, UserRepo};
use tessera_webhooks::events::{ContractPublishedPayload, ImpactedConsumer, ProposalCreatedPayload};
use tessera_webhooks::Dispatcher;
use uuid::Uuid;

use crate::type_map;

/// A single dbt manifest.json, trimmed to the fields this pipeline reads.
#[derive(Debug, Deserialize, Default)]
pub struct DbtManifest {
    #[serde(default)]
    pub nodes: HashMap<String, DbtNode>,
    #[serde(default)]
    pub sources: HashMap<String, DbtNode>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DbtNode {
    pub resource_type: Option<String>,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub columns: HashMap<String, DbtColumn>,
    #[serde(default)]
    pub depends_on: DependsOn,
    #[serde(default)]
    pub meta: Value,
    pub test_metadata: Option<TestMetadata>,
    pub column_name: Option<String>,
    pub compiled_code: Option<String>,
    pub raw_code: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DependsOn {
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DbtColumn {
    #[serde(default)]
    pub description: String,
    pub data_type: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct TestMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kwargs: Value,
    pub namespace: Option<String>,
}

pub(crate) fn fqn_of(node: &DbtNode) -> String {
    format!("{}.{}.{}", node.database, node.schema, node.name).to_lowercase()
}

/// Parsed `meta.tessera` configuration from a dbt node (reference
/// `TesseraMetaConfig`).
#[derive(Debug, Deserialize, Default, Clone)]
pub struct TesseraMetaConfig {
    pub owner_team: Option<String>,
    pub owner_user: Option<String>,
    #[serde(default)]
    pub consumers: Vec<ConsumerEntry>,
    pub freshness: Option<Value>,
    pub volume: Option<Value>,
    pub compatibility_mode: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerEntry {
    pub team: String,
    pub purpose: Option<String>,
}

pub fn extract_tessera_meta(node: &DbtNode) -> TesseraMetaConfig {
    node.meta
        .get("tessera")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// Extract guarantees from dbt tests attached to a model/source (reference
/// `extract_guarantees_from_tests`). `node_id` is the id of the model or
/// source being checked; `all_nodes` is the full `nodes` map since tests are
/// themselves nodes that declare `depends_on`.
pub fn extract_guarantees_from_tests(node_id: &str, all_nodes: &HashMap<String, DbtNode>) -> Option<Value> {
    let mut nullability = serde_json::Map::new();
    let mut accepted_values = serde_json::Map::new();
    let mut custom: Vec<Value> = Vec::new();

    for (test_id, test_node) in all_nodes {
        if test_node.resource_type.as_deref() != Some("test") {
            continue;
        }
        if !test_node.depends_on.nodes.iter().any(|n| n == node_id) {
            continue;
        }

        let test_metadata = test_node.test_metadata.clone().unwrap_or_default();
        let test_name = test_metadata.name.as_str();
        let column_name = test_metadata
            .kwargs
            .get("column_name")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| test_node.column_name.clone());

        if test_name == "not_null" {
            if let Some(col) = &column_name {
                nullability.insert(col.clone(), json!("never"));
            }
        } else if test_name == "accepted_values" {
            if let (Some(col), Some(values)) = (&column_name, test_metadata.kwargs.get("values")) {
                if values.is_array() {
                    accepted_values.insert(col.clone(), values.clone());
                }
            }
        } else if test_name == "unique" || test_name == "relationships" {
            custom.push(json!({
                "type": test_name,
                "column": column_name,
                "config": test_metadata.kwargs,
            }));
        } else if test_name.starts_with("dbt_expectations.") || test_name.starts_with("dbt_utils.") {
            custom.push(json!({
                "type": test_name,
                "column": column_name,
                "config": test_metadata.kwargs,
            }));
        } else if let Some(namespace) = &test_metadata.namespace {
            custom.push(json!({
                "type": format!("{namespace}.{test_name}"),
                "column": column_name,
                "config": test_metadata.kwargs,
            }));
        } else if test_node.test_metadata.is_none() {
            let short_id = test_id.rsplit('.').next().unwrap_or(test_id);
            custom.push(json!({
                "type": "singular",
                "name": short_id,
                "description": test_node.description,
                "sql": test_node.compiled_code.clone().or_else(|| test_node.raw_code.clone()),
            }));
        }
    }

    if nullability.is_empty() && accepted_values.is_empty() && custom.is_empty() {
        return None;
    }

    let mut guarantees = serde_json::Map::new();
    if !nullability.is_empty() {
        guarantees.insert("nullability".to_string(), Value::Object(nullability));
    }
    if !accepted_values.is_empty() {
        guarantees.insert("accepted_values".to_string(), Value::Object(accepted_values));
    }
    if !custom.is_empty() {
        guarantees.insert("custom".to_string(), Value::Array(custom));
    }
    Some(Value::Object(guarantees))
}

fn merge_freshness_volume(guarantees: &mut Option<Value>, meta: &TesseraMetaConfig) {
    if meta.freshness.is_none() && meta.volume.is_none() {
        return;
    }
    let obj = guarantees.get_or_insert_with(|| json!({})).as_object_mut().unwrap();
    if let Some(freshness) = &meta.freshness {
        obj.insert("freshness".to_string(), freshness.clone());
    }
    if let Some(volume) = &meta.volume {
        obj.insert("volume".to_string(), volume.clone());
    }
}

/// Convert dbt column definitions to a JSON Schema object (reference
/// `dbt_columns_to_json_schema`).
pub fn dbt_columns_to_json_schema(columns: &HashMap<String, DbtColumn>) -> Value {
    let mut properties = serde_json::Map::new();
    for (name, col) in columns {
        let data_type = col.data_type.as_deref().unwrap_or("string");
        let mut prop = json!({ "type": type_map::json_schema_type(data_type) });
        if !col.description.is_empty() {
            prop["description"] = json!(col.description);
        }
        properties.insert(name.clone(), prop);
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": Value::Array(Vec::new()),
    })
}

fn compat_mode_from_str(s: &str) -> Option<CompatibilityMode> {
    match s.to_ascii_lowercase().as_str() {
        "backward" => Some(CompatibilityMode::Backward),
        "forward" => Some(CompatibilityMode::Forward),
        "full" => Some(CompatibilityMode::Full),
        "none" => Some(CompatibilityMode::None),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictMode {
    Overwrite,
    Ignore,
    Fail,
}

impl ConflictMode {
    pub fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "overwrite" => Self::Overwrite,
            "ignore" => Self::Ignore,
            "fail" => Self::Fail,
            other => {
                return Err(DomainError::bad_request(format!(
                    "invalid conflict_mode '{other}', use 'overwrite', 'ignore', or 'fail'"
                )))
            }
        })
    }
}

pub struct UploadRequest {
    pub owner_team_id: Option<Uuid>,
    pub environment: String,
    pub conflict_mode: ConflictMode,
    pub auto_publish_contracts: bool,
    pub auto_create_proposals: bool,
    pub auto_register_consumers: bool,
    pub infer_consumers_from_refs: bool,
    pub published_by: Uuid,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct AssetCounts {
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct ProposalSummary {
    pub proposal_id: Uuid,
    pub asset_id: Uuid,
    pub asset_fqn: String,
    pub breaking_changes_count: usize,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct UploadReport {
    pub assets: AssetCounts,
    pub contracts_published: u32,
    pub proposals_created: u32,
    pub proposal_details: Vec<ProposalSummary>,
    pub registrations_created: u32,
    pub guarantees_extracted: u32,
    pub ownership_warnings: Vec<String>,
    pub contract_warnings: Vec<String>,
    pub registration_warnings: Vec<String>,
    pub conflicts: Vec<String>,
}

/// The repositories a dbt upload needs. Each asset/test/consumer pass is its
/// own set of statements rather than one manifest-wide transaction — the
/// ingestion pipeline tolerates partial writes on failure and reports exact
/// counts, it does not require all-or-nothing atomicity across the manifest.
pub struct IngestContext {
    pub teams: TeamRepo,
    pub users: UserRepo,
    pub assets: AssetRepo,
    pub contracts: ContractRepo,
    pub proposals: ProposalRepo,
    pub registrations: RegistrationRepo,
    pub audit_events: AuditEventRepo,
    pub dispatcher: Dispatcher,
}

impl IngestContext {
    pub fn new(pool: PgPool, dispatcher: Dispatcher) -> Self {
        Self {
            teams: TeamRepo::new(pool.clone()),
            users: UserRepo::new(pool.clone()),
            assets: AssetRepo::new(pool.clone()),
            contracts: ContractRepo::new(pool.clone()),
            proposals: ProposalRepo::new(pool.clone()),
            registrations: RegistrationRepo::new(pool.clone()),
            audit_events: AuditEventRepo::new(pool),
            dispatcher,
        }
    }
}

async fn fire_contract_published(
    ctx: &IngestContext,
    asset_id: Uuid,
    fqn: &str,
    producer_team: Uuid,
    published_by: Uuid,
    contract_id: Uuid,
    version: &str,
) -> Result<()> {
    let team = ctx.teams.get(producer_team).await?;
    ctx.dispatcher.fire_and_forget(&ContractPublishedPayload {
        contract_id,
        asset_id,
        asset_fqn: fqn.to_string(),
        version: version.to_string(),
        producer_team_id: producer_team,
        producer_team_name: team.name,
        from_proposal_id: None,
    });
    ctx.audit_events
        .record("contract_published", "contract", contract_id, Some(published_by), json!({ "asset_id": asset_id }))
        .await?;
    Ok(())
}

async fn fire_proposal_created(
    ctx: &IngestContext,
    asset_id: Uuid,
    fqn: &str,
    producer_team: Uuid,
    published_by: Uuid,
    proposal_id: Uuid,
    version: &str,
    breaking_changes: Vec<tessera_core::schema_diff::BreakingChange>,
) -> Result<()> {
    let team = ctx.teams.get(producer_team).await?;
    let consumer_teams = ctx.registrations.active_consumers_for_asset(asset_id).await?;
    let mut impacted = Vec::with_capacity(consumer_teams.len());
    for team_id in consumer_teams {
        let consumer = ctx.teams.get(team_id).await?;
        impacted.push(ImpactedConsumer { team_id, team_name: consumer.name, pinned_version: None });
    }
    ctx.dispatcher.fire_and_forget(&ProposalCreatedPayload {
        proposal_id,
        asset_id,
        asset_fqn: fqn.to_string(),
        producer_team_id: producer_team,
        producer_team_name: team.name,
        proposed_version: version.to_string(),
        breaking_changes,
        impacted_consumers: impacted,
    });
    ctx.audit_events
        .record("proposal_created", "proposal", proposal_id, Some(published_by), json!({ "asset_id": asset_id }))
        .await?;
    Ok(())
}

fn resource_type_of(kind: &str) -> ResourceType {
    match kind {
        "seed" => ResourceType::Seed,
        "snapshot" => ResourceType::Snapshot,
        "source" => ResourceType::Source,
        _ => ResourceType::Model,
    }
}

struct ResolvedOwner {
    team_id: Uuid,
    user_id: Option<Uuid>,
}

async fn resolve_owner(
    ctx: &IngestContext,
    fqn: &str,
    meta: &TesseraMetaConfig,
    default_team: Option<Uuid>,
    team_cache: &mut HashMap<String, Option<Uuid>>,
    user_cache: &mut HashMap<String, Option<Uuid>>,
    warnings: &mut Vec<String>,
) -> Result<Option<ResolvedOwner>> {
    let mut team_id = default_team;

    if let Some(name) = &meta.owner_team {
        let resolved = match team_cache.get(name) {
            Some(cached) => *cached,
            None => {
                let found = ctx
                    .teams
                    .list()
                    .await?
                    .into_iter()
                    .find(|t| t.name.eq_ignore_ascii_case(name))
                    .map(|t| t.id);
                team_cache.insert(name.clone(), found);
                found
            }
        };
        match resolved {
            Some(id) => team_id = Some(id),
            None => warnings.push(format!("{fqn}: owner_team '{name}' not found, using default")),
        }
    }

    let mut user_id = None;
    if let Some(email) = &meta.owner_user {
        let resolved = match user_cache.get(email) {
            Some(cached) => *cached,
            None => {
                let found = ctx.users.get_by_email(email).await?.map(|u| u.id);
                user_cache.insert(email.clone(), found);
                found
            }
        };
        match resolved {
            Some(id) => user_id = Some(id),
            None => warnings.push(format!("{fqn}: owner_user '{email}' not found")),
        }
    }

    match team_id {
        Some(team_id) => Ok(Some(ResolvedOwner { team_id, user_id })),
        None => {
            warnings.push(format!(
                "{fqn}: no owner_team_id provided and no meta.tessera.owner_team set, skipping"
            ));
            Ok(None)
        }
    }
}

async fn auto_publish(
    ctx: &IngestContext,
    asset_id: Uuid,
    fqn: &str,
    schema: &Value,
    guarantees: &Value,
    requested_mode: Option<CompatibilityMode>,
    producer_team: Uuid,
    published_by: Uuid,
    report: &mut UploadReport,
) -> Result<()> {
    let current = ctx.contracts.get_active(asset_id).await?;
    let (version, mode) = match &current {
        None => (
            version::first_version().to_string(),
            requested_mode.unwrap_or(CompatibilityMode::Backward),
        ),
        Some(existing) => {
            let mode = requested_mode.unwrap_or(existing.compatibility_mode);
            let (compatible, _) = check_compatibility(&existing.schema, schema, existing.compatibility_mode);
            if !compatible {
                return Ok(());
            }
            (version::bump_minor(&existing.version), mode)
        }
    };

    let outcome = ctx
        .contracts
        .publish(PublishRequest {
            asset_id,
            version: &version,
            schema: schema.clone(),
            compatibility_mode: mode,
            guarantees: guarantees.clone(),
            producer_team,
            published_by,
            force: false,
        })
        .await;

    match outcome {
        Ok(PublishOutcome::Published(contract)) | Ok(PublishOutcome::ForcePublished { contract, .. }) => {
            report.contracts_published += 1;
            fire_contract_published(ctx, asset_id, fqn, producer_team, published_by, contract.id, &contract.version).await?;
        }
        Ok(PublishOutcome::ProposalRequired { .. }) => {}
        Err(e) => report.contract_warnings.push(format!("{fqn}: failed to publish contract ({e})")),
    }
    Ok(())
}

async fn auto_propose(
    ctx: &IngestContext,
    asset_id: Uuid,
    fqn: &str,
    schema: &Value,
    guarantees: Value,
    proposer_team: Uuid,
    proposer_user: Uuid,
    report: &mut UploadReport,
) -> Result<()> {
    let Some(existing) = ctx.contracts.get_active(asset_id).await? else {
        return Ok(());
    };
    let diff = diff_schemas(&existing.schema, schema);
    let (compatible, breaking) = check_compatibility(&existing.schema, schema, existing.compatibility_mode);
    if compatible || breaking.is_empty() {
        return Ok(());
    }

    let proposal = ctx
        .proposals
        .create(NewProposal {
            asset_id,
            proposed_schema: schema.clone(),
            proposed_guarantees: guarantees,
            diff_classification: diff.change_type,
            breaking_changes: &breaking,
            proposer_team,
            proposer_user,
            expires_at: None,
            auto_expire: false,
        })
        .await?;

    report.proposals_created += 1;
    report.proposal_details.push(ProposalSummary {
        proposal_id: proposal.id,
        asset_id,
        asset_fqn: fqn.to_string(),
        breaking_changes_count: breaking.len(),
    });

    let proposed_version = version::bump_minor(&existing.version);
    fire_proposal_created(ctx, asset_id, fqn, proposer_team, proposer_user, proposal.id, &proposed_version, breaking).await?;
    Ok(())
}

struct ConsumerLink {
    asset_id: Uuid,
    fqn: String,
    owner_team: Uuid,
    depends_on: Vec<String>,
    meta_consumers: Vec<ConsumerEntry>,
}

async fn auto_register(
    ctx: &IngestContext,
    links: &[ConsumerLink],
    node_id_to_fqn: &HashMap<String, String>,
    fqn_to_asset: &HashMap<String, Uuid>,
    infer_from_refs: bool,
    report: &mut UploadReport,
) -> Result<()> {
    for link in links {
        if infer_from_refs {
            for dep_node_id in &link.depends_on {
                let Some(upstream_fqn) = node_id_to_fqn.get(dep_node_id) else { continue };
                let Some(&upstream_asset_id) = fqn_to_asset.get(upstream_fqn) else { continue };
                let Some(contract) = ctx.contracts.get_active(upstream_asset_id).await? else { continue };
                let already = ctx
                    .registrations
                    .list_for_contract(contract.id)
                    .await?
                    .into_iter()
                    .any(|r| r.consumer_team == link.owner_team);
                if already {
                    continue;
                }
                ctx.registrations.register(contract.id, link.owner_team, None).await?;
                report.registrations_created += 1;
            }
        }

        for consumer in &link.meta_consumers {
            let Some(team) = ctx
                .teams
                .list()
                .await?
                .into_iter()
                .find(|t| t.name.eq_ignore_ascii_case(&consumer.team))
            else {
                report
                    .registration_warnings
                    .push(format!("{}: consumer team '{}' not found", link.fqn, consumer.team));
                continue;
            };
            let Some(contract) = ctx.contracts.get_active(link.asset_id).await? else {
                report
                    .registration_warnings
                    .push(format!("{}: no active contract for '{}'", link.fqn, consumer.team));
                continue;
            };
            let already = ctx
                .registrations
                .list_for_contract(contract.id)
                .await?
                .into_iter()
                .any(|r| r.consumer_team == team.id);
            if already {
                continue;
            }
            ctx.registrations.register(contract.id, team.id, None).await?;
            report.registrations_created += 1;
        }
    }
    Ok(())
}

/// Ingest one dbt manifest (reference `upload_dbt_manifest`): create/update
/// assets, optionally auto-publish contracts, auto-propose breaking changes,
/// and auto-register consumers.
pub async fn upload_manifest(ctx: &IngestContext, manifest: &DbtManifest, req: UploadRequest) -> Result<UploadReport> {
    let mut report = UploadReport::default();
    let mut team_cache = HashMap::new();
    let mut user_cache = HashMap::new();

    let mut node_id_to_fqn = HashMap::new();
    for (id, node) in manifest.nodes.iter().chain(manifest.sources.iter()) {
        if node.resource_type.as_deref() == Some("test") {
            continue;
        }
        node_id_to_fqn.insert(id.clone(), fqn_of(node));
    }

    let mut fqn_to_asset = HashMap::new();
    let mut consumer_links = Vec::new();

    for (source_map, is_source) in [(&manifest.nodes, false), (&manifest.sources, true)] {
        for (node_id, node) in source_map {
            let resource_type = node.resource_type.as_deref().unwrap_or(if is_source { "source" } else { "model" });
            if !is_source && !matches!(resource_type, "model" | "seed" | "snapshot") {
                continue;
            }

            let fqn = fqn_of(node);
            let existing = ctx.assets.get_by_fqn(&fqn, &req.environment).await?;

            if existing.is_some() {
                match req.conflict_mode {
                    ConflictMode::Fail => {
                        report.conflicts.push(fqn.clone());
                        continue;
                    }
                    ConflictMode::Ignore => {
                        report.assets.skipped += 1;
                        continue;
                    }
                    ConflictMode::Overwrite => {}
                }
            }

            let meta = extract_tessera_meta(node);
            let Some(owner) = resolve_owner(
                ctx,
                &fqn,
                &meta,
                req.owner_team_id,
                &mut team_cache,
                &mut user_cache,
                &mut report.ownership_warnings,
            )
            .await?
            else {
                report.assets.skipped += 1;
                continue;
            };

            let all_nodes = &manifest.nodes;
            let mut guarantees = extract_guarantees_from_tests(node_id, all_nodes);
            if guarantees.is_some() {
                report.guarantees_extracted += 1;
            }
            merge_freshness_volume(&mut guarantees, &meta);

            let depends_on_fqns: Vec<String> = node
                .depends_on
                .nodes
                .iter()
                .filter_map(|id| node_id_to_fqn.get(id).cloned())
                .collect();

            let metadata = json!({
                "dbt_node_id": node_id,
                "resource_type": resource_type,
                "description": node.description,
                "tags": node.tags,
                "depends_on": depends_on_fqns,
                "columns": node.columns.iter().map(|(name, col)| {
                    (name.clone(), json!({"description": col.description, "data_type": col.data_type}))
                }).collect::<serde_json::Map<_, _>>(),
                "guarantees": guarantees,
            });

            let schema = dbt_columns_to_json_schema(&node.columns);
            let has_columns = !node.columns.is_empty();

            let asset_id = if let Some(existing) = existing {
                ctx.assets.update_metadata(existing.id, metadata).await?;
                report.assets.updated += 1;
                existing.id
            } else {
                let created = ctx
                    .assets
                    .create(NewAsset {
                        fqn: &fqn,
                        owner_team: owner.team_id,
                        owner_user: owner.user_id,
                        environment: &req.environment,
                        resource_type: resource_type_of(resource_type),
                        guarantee_evaluation_mode: GuaranteeEvaluationMode::Automatic,
                        metadata,
                    })
                    .await?;
                report.assets.created += 1;
                created.id
            };
            fqn_to_asset.insert(fqn.clone(), asset_id);

            if req.auto_register_consumers {
                consumer_links.push(ConsumerLink {
                    asset_id,
                    fqn: fqn.clone(),
                    owner_team: owner.team_id,
                    depends_on: if req.infer_consumers_from_refs {
                        node.depends_on.nodes.clone()
                    } else {
                        Vec::new()
                    },
                    meta_consumers: meta.consumers.clone(),
                });
            }

            if has_columns && req.auto_publish_contracts {
                auto_publish(
                    ctx,
                    asset_id,
                    &fqn,
                    &schema,
                    guarantees.as_ref().unwrap_or(&json!({})),
                    meta.compatibility_mode.as_deref().and_then(compat_mode_from_str),
                    owner.team_id,
                    req.published_by,
                    &mut report,
                )
                .await?;
            }

            if has_columns && req.auto_create_proposals {
                auto_propose(
                    ctx,
                    asset_id,
                    &fqn,
                    &schema,
                    guarantees.clone().unwrap_or(json!({})),
                    owner.team_id,
                    req.published_by,
                    &mut report,
                )
                .await?;
            }
        }
    }

    if req.conflict_mode == ConflictMode::Fail && !report.conflicts.is_empty() {
        return Err(DomainError::conflict(format!(
            "found {} existing assets",
            report.conflicts.len()
        )));
    }

    if req.auto_register_consumers {
        auto_register(
            ctx,
            &consumer_links,
            &node_id_to_fqn,
            &fqn_to_asset,
            req.infer_consumers_from_refs,
            &mut report,
        )
        .await?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(database: &str, schema: &str, name: &str) -> DbtNode {
        DbtNode {
            resource_type: Some("model".to_string()),
            database: database.to_string(),
            schema: schema.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn fqn_is_lowercased_dotted_triple() {
        let n = node("Warehouse", "Public", "Orders");
        assert_eq!(fqn_of(&n), "warehouse.public.orders");
    }

    #[test]
    fn not_null_test_becomes_never_nullable() {
        let mut nodes = HashMap::new();
        nodes.insert("model.proj.orders".to_string(), node("db", "public", "orders"));
        nodes.insert(
            "test.proj.not_null_orders_id".to_string(),
            DbtNode {
                resource_type: Some("test".to_string()),
                depends_on: DependsOn { nodes: vec!["model.proj.orders".to_string()] },
                test_metadata: Some(TestMetadata {
                    name: "not_null".to_string(),
                    kwargs: json!({"column_name": "id"}),
                    namespace: None,
                }),
                ..Default::default()
            },
        );

        let guarantees = extract_guarantees_from_tests("model.proj.orders", &nodes).unwrap();
        assert_eq!(guarantees["nullability"]["id"], json!("never"));
    }

    #[test]
    fn singular_test_without_metadata_becomes_custom_sql_guarantee() {
        let mut nodes = HashMap::new();
        nodes.insert("model.proj.orders".to_string(), node("db", "public", "orders"));
        nodes.insert(
            "test.proj.assert_totals_match".to_string(),
            DbtNode {
                resource_type: Some("test".to_string()),
                depends_on: DependsOn { nodes: vec!["model.proj.orders".to_string()] },
                raw_code: Some("select 1 where false".to_string()),
                ..Default::default()
            },
        );

        let guarantees = extract_guarantees_from_tests("model.proj.orders", &nodes).unwrap();
        assert_eq!(guarantees["custom"][0]["type"], json!("singular"));
    }

    #[test]
    fn columns_map_through_fixed_type_table() {
        let mut columns = HashMap::new();
        columns.insert(
            "id".to_string(),
            DbtColumn { description: "primary key".to_string(), data_type: Some("bigint".to_string()) },
        );
        let schema = dbt_columns_to_json_schema(&columns);
        assert_eq!(schema["properties"]["id"]["type"], json!("integer"));
    }
}
