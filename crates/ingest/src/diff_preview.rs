//! Dry-run preview of what an `upload_manifest` call would do, without
//! writing anything (spec §4.4 sibling operation).

use serde::Serialize;
use tessera_core::schema_diff::check_compatibility;
use tessera_core::Result;
use tessera_db::repo::{AssetRepo, ContractRepo};

use crate::dbt::{dbt_columns_to_json_schema, fqn_of, DbtManifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClassification {
    New,
    Modified,
    Unchanged,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaChange {
    None,
    Compatible,
    Breaking,
}

#[derive(Debug, Serialize)]
pub struct ModelPreview {
    pub fqn: String,
    pub classification: AssetClassification,
    pub schema_change: SchemaChange,
    pub blocking: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct DiffPreviewReport {
    pub models: Vec<ModelPreview>,
    pub blocking_count: usize,
}

/// Compare every model/source in `manifest` against what is currently
/// persisted, without writing anything. `fail_on_breaking` controls whether
/// a breaking schema change sets a model's `blocking` flag.
pub async fn preview(
    assets: &AssetRepo,
    contracts: &ContractRepo,
    manifest: &DbtManifest,
    owner_team_id: uuid::Uuid,
    environment: &str,
    fail_on_breaking: bool,
) -> Result<DiffPreviewReport> {
    let mut report = DiffPreviewReport::default();
    let mut seen_fqns = std::collections::HashSet::new();

    for (_, node) in manifest.nodes.iter().chain(manifest.sources.iter()) {
        let resource_type = node.resource_type.as_deref().unwrap_or("model");
        if resource_type == "test" {
            continue;
        }
        let fqn = fqn_of(node);
        seen_fqns.insert(fqn.clone());

        let existing = assets.get_by_fqn(&fqn, environment).await?;
        let schema = dbt_columns_to_json_schema(&node.columns);

        let (classification, schema_change) = match existing {
            None => (AssetClassification::New, SchemaChange::None),
            Some(asset) => match contracts.get_active(asset.id).await? {
                None => (AssetClassification::Modified, SchemaChange::None),
                Some(contract) => {
                    let (compatible, breaking) =
                        check_compatibility(&contract.schema, &schema, contract.compatibility_mode);
                    if contract.schema == schema {
                        (AssetClassification::Unchanged, SchemaChange::None)
                    } else if compatible || breaking.is_empty() {
                        (AssetClassification::Modified, SchemaChange::Compatible)
                    } else {
                        (AssetClassification::Modified, SchemaChange::Breaking)
                    }
                }
            },
        };

        let blocking = fail_on_breaking && schema_change == SchemaChange::Breaking;
        if blocking {
            report.blocking_count += 1;
        }
        report.models.push(ModelPreview { fqn, classification, schema_change, blocking });
    }

    for existing_asset in assets.list_for_team(owner_team_id).await? {
        if existing_asset.environment == environment && !seen_fqns.contains(&existing_asset.fqn) {
            report.models.push(ModelPreview {
                fqn: existing_asset.fqn,
                classification: AssetClassification::Deleted,
                schema_change: SchemaChange::None,
                blocking: false,
            });
        }
    }

    Ok(report)
}
