use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::contracts::{decide_publish, CurrentContract, Decision};
use tessera_core::domain::{CompatibilityMode, Contract, ContractStatus};
use tessera_core::schema_diff::BreakingChange;
use tessera_core::{DomainError, Result};
use uuid::Uuid;

use crate::error::domain_err;

#[derive(FromRow)]
struct ContractRow {
    id: Uuid,
    asset_id: Uuid,
    version: String,
    schema: serde_json::Value,
    schema_format: String,
    compatibility_mode: String,
    guarantees: serde_json::Value,
    status: String,
    producer_team: Uuid,
    published_by: Uuid,
    published_at: DateTime<Utc>,
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
        other => return Err(DomainError::Internal(format!("unknown compatibility mode '{other}'"))),
    })
}

fn status_from_str(s: &str) -> Result<ContractStatus> {
    Ok(match s {
        "active" => ContractStatus::Active,
        "deprecated" => ContractStatus::Deprecated,
        "withdrawn" => ContractStatus::Withdrawn,
        other => return Err(DomainError::Internal(format!("unknown contract status '{other}'"))),
    })
}

fn status_to_str(status: ContractStatus) -> &'static str {
    match status {
        ContractStatus::Active => "active",
        ContractStatus::Deprecated => "deprecated",
        ContractStatus::Withdrawn => "withdrawn",
    }
}

impl TryFrom<ContractRow> for Contract {
    type Error = DomainError;

    fn try_from(row: ContractRow) -> std::result::Result<Self, Self::Error> {
        Ok(Contract {
            id: row.id,
            asset_id: row.asset_id,
            version: row.version,
            schema: row.schema,
            schema_format: row.schema_format,
            compatibility_mode: mode_from_str(&row.compatibility_mode)?,
            guarantees: row.guarantees,
            status: status_from_str(&row.status)?,
            producer_team: row.producer_team,
            published_by: row.published_by,
            published_at: row.published_at,
        })
    }
}

pub struct PublishRequest<'a> {
    pub asset_id: Uuid,
    pub version: &'a str,
    pub schema: serde_json::Value,
    pub compatibility_mode: CompatibilityMode,
    pub guarantees: serde_json::Value,
    pub producer_team: Uuid,
    pub published_by: Uuid,
    pub force: bool,
}

/// Outcome of [`ContractRepo::publish`], mirroring
/// [`tessera_core::contracts::Decision`] but carrying the row that was
/// actually written (or `None` when the outcome only produced a proposal,
/// which the caller creates separately via `ProposalRepo`).
pub enum PublishOutcome {
    Published(Contract),
    ForcePublished { contract: Contract, warning: String },
    ProposalRequired { breaking_changes: Vec<BreakingChange> },
}

const SELECT_COLS: &str = "id, asset_id, version, schema, schema_format, compatibility_mode, \
     guarantees, status, producer_team, published_by, published_at";

#[derive(Clone)]
pub struct ContractRepo {
    pool: PgPool,
}

impl ContractRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get_active(&self, asset_id: Uuid) -> Result<Option<Contract>> {
        let query = format!("select {SELECT_COLS} from contracts where asset_id = $1 and status = 'active'");
        let row = sqlx::query_as::<_, ContractRow>(&query)
            .bind(asset_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(domain_err)?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn get(&self, id: Uuid) -> Result<Contract> {
        let query = format!("select {SELECT_COLS} from contracts where id = $1");
        let row = sqlx::query_as::<_, ContractRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(domain_err)?
            .ok_or_else(|| DomainError::not_found(format!("contract {id} not found")))?;
        row.try_into()
    }

    pub async fn history_for_asset(&self, asset_id: Uuid) -> Result<Vec<Contract>> {
        let query = format!(
            "select {SELECT_COLS} from contracts where asset_id = $1 order by published_at desc"
        );
        let rows = sqlx::query_as::<_, ContractRow>(&query)
            .bind(asset_id)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Publish decision + write under a single row-locked transaction so two
    /// concurrent publishes for the same asset can never both observe "no
    /// current contract" (invariant C1).
    pub async fn publish(&self, req: PublishRequest<'_>) -> Result<PublishOutcome> {
        let mut tx = self.pool.begin().await.map_err(domain_err)?;

        let select_for_update =
            format!("select {SELECT_COLS} from contracts where asset_id = $1 and status = 'active' for update");
        let current_row = sqlx::query_as::<_, ContractRow>(&select_for_update)
            .bind(req.asset_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(domain_err)?;
        let current: Option<Contract> = current_row.map(TryInto::try_into).transpose()?;

        let current_ref = current.as_ref().map(|c| CurrentContract {
            version: &c.version,
            schema: &c.schema,
            compatibility_mode: c.compatibility_mode,
        });

        let decision = decide_publish(current_ref, req.version, &req.schema, req.force)?;

        let outcome = match decision {
            Decision::Published | Decision::ForcePublished { .. } => {
                if let Some(current) = &current {
                    sqlx::query("update contracts set status = 'deprecated' where id = $1")
                        .bind(current.id)
                        .execute(&mut *tx)
                        .await
                        .map_err(domain_err)?;
                }
                let insert = format!(
                    "insert into contracts (asset_id, version, schema, compatibility_mode, \
                     guarantees, status, producer_team, published_by) \
                     values ($1, $2, $3, $4, $5, 'active', $6, $7) returning {SELECT_COLS}"
                );
                let row = sqlx::query_as::<_, ContractRow>(&insert)
                    .bind(req.asset_id)
                    .bind(req.version)
                    .bind(req.schema.clone())
                    .bind(mode_to_str(req.compatibility_mode))
                    .bind(req.guarantees.clone())
                    .bind(req.producer_team)
                    .bind(req.published_by)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(domain_err)?;
                let contract: Contract = row.try_into()?;
                match decision {
                    Decision::ForcePublished { warning } => {
                        PublishOutcome::ForcePublished { contract, warning }
                    }
                    _ => PublishOutcome::Published(contract),
                }
            }
            Decision::ProposalCreated { breaking_changes } => {
                PublishOutcome::ProposalRequired { breaking_changes }
            }
        };

        tx.commit().await.map_err(domain_err)?;
        Ok(outcome)
    }

    /// Cross-asset filtered list for `GET /api/v1/contracts`.
    pub async fn list_all(&self, asset_id: Option<Uuid>, status: Option<ContractStatus>) -> Result<Vec<Contract>> {
        let query = format!(
            "select {SELECT_COLS} from contracts \
             where ($1::uuid is null or asset_id = $1) \
               and ($2::text is null or status = $2) \
             order by published_at desc"
        );
        let rows = sqlx::query_as::<_, ContractRow>(&query)
            .bind(asset_id)
            .bind(status.map(status_to_str))
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Replace guarantees on the active contract only (spec: `PATCH
    /// /api/v1/contracts/{id}/guarantees`).
    pub async fn update_guarantees(&self, id: Uuid, guarantees: serde_json::Value) -> Result<Contract> {
        let query = format!(
            "update contracts set guarantees = $2 where id = $1 and status = 'active' returning {SELECT_COLS}"
        );
        let row = sqlx::query_as::<_, ContractRow>(&query)
            .bind(id)
            .bind(guarantees)
            .fetch_optional(&self.pool)
            .await
            .map_err(domain_err)?
            .ok_or_else(|| DomainError::conflict("contract is not active"))?;
        row.try_into()
    }

    pub async fn withdraw(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("update contracts set status = 'withdrawn' where id = $1 and status = 'active'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(domain_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::conflict("contract is not active"));
        }
        Ok(())
    }
}
