//! Impact check: compare proposed schemas against active contracts and list
//! the breaking changes plus the consumer teams they would affect (spec
//! §4.4 sibling operation, also backs the single-asset
//! `/api/v1/assets/{id}/impact` route).

use serde::Serialize;
use tessera_core::schema_diff::{check_compatibility, BreakingChange};
use tessera_core::Result;
use tessera_db::repo::{AssetRepo, ContractRepo, RegistrationRepo};
use uuid::Uuid;

use crate::dbt::{dbt_columns_to_json_schema, fqn_of, DbtManifest};

#[derive(Debug, Serialize)]
pub struct ModelImpact {
    pub fqn: String,
    pub breaking_changes: Vec<BreakingChange>,
    pub impacted_consumers: Vec<Uuid>,
}

#[derive(Debug, Default, Serialize)]
pub struct ImpactReport {
    pub models: Vec<ModelImpact>,
}

/// Impact of a single proposed schema against an asset's current contract,
/// used by the single-asset impact route.
pub async fn check_asset(
    contracts: &ContractRepo,
    registrations: &RegistrationRepo,
    asset_id: Uuid,
    proposed_schema: &serde_json::Value,
) -> Result<ModelImpact> {
    let breaking_changes = match contracts.get_active(asset_id).await? {
        None => Vec::new(),
        Some(contract) => {
            let (_, breaking) = check_compatibility(&contract.schema, proposed_schema, contract.compatibility_mode);
            breaking
        }
    };

    let impacted_consumers = if breaking_changes.is_empty() {
        Vec::new()
    } else {
        registrations.active_consumers_for_asset(asset_id).await?
    };

    Ok(ModelImpact { fqn: String::new(), breaking_changes, impacted_consumers })
}

/// Impact of an entire manifest's models against the assets they already
/// correspond to (sync-time impact check ahead of an upload).
pub async fn check_manifest(
    assets: &AssetRepo,
    contracts: &ContractRepo,
    registrations: &RegistrationRepo,
    manifest: &DbtManifest,
    environment: &str,
) -> Result<ImpactReport> {
    let mut report = ImpactReport::default();

    for (_, node) in manifest.nodes.iter().chain(manifest.sources.iter()) {
        if node.resource_type.as_deref() == Some("test") {
            continue;
        }
        let fqn = fqn_of(node);
        let Some(asset) = assets.get_by_fqn(&fqn, environment).await? else {
            continue;
        };

        let schema = dbt_columns_to_json_schema(&node.columns);
        let mut impact = check_asset(contracts, registrations, asset.id, &schema).await?;
        impact.fqn = fqn;
        if !impact.breaking_changes.is_empty() {
            report.models.push(impact);
        }
    }

    Ok(report)
}
