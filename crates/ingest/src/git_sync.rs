//! Git-friendly YAML export/import (`/sync/push`, `/sync/pull`).
//!
//! Mirrors the reference `sync_push`/`sync_pull`: teams land under
//! `{root}/teams/{name}.yaml`, assets (with their contracts and
//! registrations nested) under `{root}/assets/{fqn}__{environment}.yaml`.
//! Rows are matched by natural key (team name; asset fqn + environment;
//! contract version) rather than by database id on import, since the
//! persistence layer assigns ids on insert rather than accepting
//! caller-supplied ones.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_core::domain::{CompatibilityMode, ContractStatus};
use tessera_core::version::is_strictly_greater;
use tessera_core::{DomainError, Result};
use tessera_db::repo::assets::NewAsset;
use tessera_db::repo::contracts::PublishRequest;
use tessera_db::repo::{AssetRepo, ContractRepo, RegistrationRepo, TeamRepo};
use uuid::Uuid;

fn escape_fqn(fqn: &str) -> String {
    fqn.replace('/', "__").replace('.', "_")
}

#[derive(Debug, Serialize, Deserialize)]
struct TeamDoc {
    name: String,
    metadata: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistrationDoc {
    consumer_team: Uuid,
    pinned_version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContractDoc {
    version: String,
    schema: serde_json::Value,
    compatibility_mode: String,
    guarantees: serde_json::Value,
    producer_team: Uuid,
    published_by: Uuid,
    registrations: Vec<RegistrationDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AssetDoc {
    fqn: String,
    environment: String,
    owner_team: Uuid,
    metadata: serde_json::Value,
    contracts: Vec<ContractDoc>,
}

#[derive(Debug, Default, Serialize)]
pub struct PushReport {
    pub teams_exported: u32,
    pub assets_exported: u32,
    pub contracts_exported: u32,
}

#[derive(Debug, Default, Serialize)]
pub struct PullReport {
    pub teams_imported: u32,
    pub assets_imported: u32,
    pub contracts_imported: u32,
    pub registrations_imported: u32,
}

fn mode_to_str(mode: CompatibilityMode) -> &'static str {
    match mode {
        CompatibilityMode::Backward => "backward",
        CompatibilityMode::Forward => "forward",
        CompatibilityMode::Full => "full",
        CompatibilityMode::None => "none",
    }
}

fn mode_from_str(s: &str) -> Result<CompatibilityMode> {
    Ok(match s {
        "backward" => CompatibilityMode::Backward,
        "forward" => CompatibilityMode::Forward,
        "full" => CompatibilityMode::Full,
        "none" => CompatibilityMode::None,
        other => return Err(DomainError::bad_request(format!("unknown compatibility_mode '{other}'"))),
    })
}

/// Export current teams and assets (with their contract/registration
/// history) to a directory tree under `root`.
pub async fn push(
    teams: &TeamRepo,
    assets: &AssetRepo,
    contracts: &ContractRepo,
    registrations: &RegistrationRepo,
    root: &Path,
) -> Result<PushReport> {
    let mut report = PushReport::default();

    let teams_dir = root.join("teams");
    let assets_dir = root.join("assets");
    fs::create_dir_all(&teams_dir).map_err(|e| DomainError::Internal(format!("creating teams dir: {e}")))?;
    fs::create_dir_all(&assets_dir).map_err(|e| DomainError::Internal(format!("creating assets dir: {e}")))?;

    let all_teams = teams.list().await?;
    for team in &all_teams {
        let doc = TeamDoc { name: team.name.clone(), metadata: team.metadata.clone() };
        let yaml = serde_yaml::to_string(&doc).map_err(|e| DomainError::Internal(format!("serializing team: {e}")))?;
        fs::write(teams_dir.join(format!("{}.yaml", team.name)), yaml)
            .map_err(|e| DomainError::Internal(format!("writing team file: {e}")))?;
        report.teams_exported += 1;
    }

    for team in &all_teams {
        for asset in assets.list_for_team(team.id).await? {
            let history = contracts.history_for_asset(asset.id).await?;
            let mut contract_docs = Vec::with_capacity(history.len());
            for contract in &history {
                let regs = registrations.list_for_contract(contract.id).await?;
                contract_docs.push(ContractDoc {
                    version: contract.version.clone(),
                    schema: contract.schema.clone(),
                    compatibility_mode: mode_to_str(contract.compatibility_mode).to_string(),
                    guarantees: contract.guarantees.clone(),
                    producer_team: contract.producer_team,
                    published_by: contract.published_by,
                    registrations: regs
                        .into_iter()
                        .map(|r| RegistrationDoc { consumer_team: r.consumer_team, pinned_version: r.pinned_version })
                        .collect(),
                });
                report.contracts_exported += 1;
            }

            let doc = AssetDoc {
                fqn: asset.fqn.clone(),
                environment: asset.environment.clone(),
                owner_team: asset.owner_team,
                metadata: asset.metadata.clone(),
                contracts: contract_docs,
            };
            let yaml =
                serde_yaml::to_string(&doc).map_err(|e| DomainError::Internal(format!("serializing asset: {e}")))?;
            let filename = format!("{}__{}.yaml", escape_fqn(&asset.fqn), asset.environment);
            fs::write(assets_dir.join(filename), yaml)
                .map_err(|e| DomainError::Internal(format!("writing asset file: {e}")))?;
            report.assets_exported += 1;
        }
    }

    Ok(report)
}

/// Import a directory tree written by [`push`] back into the database,
/// upserting by natural key.
pub async fn pull(
    teams: &TeamRepo,
    assets: &AssetRepo,
    contracts: &ContractRepo,
    registrations: &RegistrationRepo,
    root: &Path,
) -> Result<PullReport> {
    if !root.exists() {
        return Err(DomainError::not_found(format!("sync path {} not found", root.display())));
    }
    let mut report = PullReport::default();

    let teams_dir = root.join("teams");
    if teams_dir.exists() {
        for entry in fs::read_dir(&teams_dir).map_err(|e| DomainError::Internal(format!("reading teams dir: {e}")))? {
            let entry = entry.map_err(|e| DomainError::Internal(format!("reading team entry: {e}")))?;
            let contents =
                fs::read_to_string(entry.path()).map_err(|e| DomainError::Internal(format!("reading team file: {e}")))?;
            let doc: TeamDoc =
                serde_yaml::from_str(&contents).map_err(|e| DomainError::bad_request(format!("invalid team yaml: {e}")))?;

            let existing = teams.list().await?.into_iter().find(|t| t.name.eq_ignore_ascii_case(&doc.name));
            match existing {
                Some(existing) => {
                    if existing.name != doc.name {
                        teams.rename(existing.id, &doc.name).await?;
                    }
                }
                None => {
                    teams.create(&doc.name, doc.metadata).await?;
                }
            }
            report.teams_imported += 1;
        }
    }

    let assets_dir = root.join("assets");
    if assets_dir.exists() {
        for entry in fs::read_dir(&assets_dir).map_err(|e| DomainError::Internal(format!("reading assets dir: {e}")))? {
            let entry = entry.map_err(|e| DomainError::Internal(format!("reading asset entry: {e}")))?;
            let contents = fs::read_to_string(entry.path())
                .map_err(|e| DomainError::Internal(format!("reading asset file: {e}")))?;
            let doc: AssetDoc = serde_yaml::from_str(&contents)
                .map_err(|e| DomainError::bad_request(format!("invalid asset yaml: {e}")))?;

            let existing = assets.get_by_fqn(&doc.fqn, &doc.environment).await?;
            let asset_id = match existing {
                Some(existing) => {
                    assets.update_metadata(existing.id, doc.metadata.clone()).await?;
                    existing.id
                }
                None => {
                    let created = assets
                        .create(NewAsset {
                            fqn: &doc.fqn,
                            owner_team: doc.owner_team,
                            owner_user: None,
                            environment: &doc.environment,
                            resource_type: tessera_core::domain::ResourceType::Model,
                            guarantee_evaluation_mode: tessera_core::domain::GuaranteeEvaluationMode::Manual,
                            metadata: doc.metadata.clone(),
                        })
                        .await?;
                    created.id
                }
            };
            report.assets_imported += 1;

            let current = contracts.get_active(asset_id).await?;
            for contract_doc in &doc.contracts {
                let should_publish = match &current {
                    None => true,
                    Some(existing) => {
                        existing.status != ContractStatus::Active || is_strictly_greater(&existing.version, &contract_doc.version)
                    }
                };
                if !should_publish {
                    continue;
                }

                let outcome = contracts
                    .publish(PublishRequest {
                        asset_id,
                        version: &contract_doc.version,
                        schema: contract_doc.schema.clone(),
                        compatibility_mode: mode_from_str(&contract_doc.compatibility_mode)?,
                        guarantees: contract_doc.guarantees.clone(),
                        producer_team: contract_doc.producer_team,
                        published_by: contract_doc.published_by,
                        force: true,
                    })
                    .await?;
                report.contracts_imported += 1;

                let published = match outcome {
                    tessera_db::repo::contracts::PublishOutcome::Published(c) => Some(c),
                    tessera_db::repo::contracts::PublishOutcome::ForcePublished { contract, .. } => Some(contract),
                    tessera_db::repo::contracts::PublishOutcome::ProposalRequired { .. } => None,
                };

                if let Some(contract) = published {
                    for reg in &contract_doc.registrations {
                        registrations.register(contract.id, reg.consumer_team, reg.pinned_version.as_deref()).await?;
                        report.registrations_imported += 1;
                    }
                }
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fqn_escaping_replaces_dots_and_slashes() {
        assert_eq!(escape_fqn("warehouse.public.orders"), "warehouse_public_orders");
        assert_eq!(escape_fqn("a/b.c"), "a__b_c");
    }
}
