use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::domain::{AuditRun, AuditRunStatus};
use tessera_core::{DomainError, Result};
use uuid::Uuid;

use crate::error::domain_err;

#[derive(FromRow)]
struct AuditRunRow {
    id: Uuid,
    asset_id: Uuid,
    contract_id: Option<Uuid>,
    status: String,
    checked_count: i32,
    passed_count: i32,
    failed_count: i32,
    triggered_by: String,
    external_run_id: Option<String>,
    run_at: DateTime<Utc>,
    details: serde_json::Value,
}

fn status_to_str(status: AuditRunStatus) -> &'static str {
    match status {
        AuditRunStatus::Passed => "passed",
        AuditRunStatus::Failed => "failed",
        AuditRunStatus::Partial => "partial",
    }
}

fn status_from_str(s: &str) -> Result<AuditRunStatus> {
    Ok(match s {
        "passed" => AuditRunStatus::Passed,
        "failed" => AuditRunStatus::Failed,
        "partial" => AuditRunStatus::Partial,
        other => return Err(DomainError::Internal(format!("unknown audit run status '{other}'"))),
    })
}

impl TryFrom<AuditRunRow> for AuditRun {
    type Error = DomainError;

    fn try_from(row: AuditRunRow) -> std::result::Result<Self, Self::Error> {
        Ok(AuditRun {
            id: row.id,
            asset_id: row.asset_id,
            contract_id: row.contract_id,
            status: status_from_str(&row.status)?,
            checked_count: row.checked_count,
            passed_count: row.passed_count,
            failed_count: row.failed_count,
            triggered_by: row.triggered_by,
            external_run_id: row.external_run_id,
            run_at: row.run_at,
            details: row.details,
        })
    }
}

pub struct NewAuditRun<'a> {
    pub asset_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub status: AuditRunStatus,
    pub checked_count: i32,
    pub passed_count: i32,
    pub failed_count: i32,
    pub triggered_by: &'a str,
    pub external_run_id: Option<&'a str>,
    pub details: serde_json::Value,
}

const SELECT_COLS: &str = "id, asset_id, contract_id, status, checked_count, passed_count, \
     failed_count, triggered_by, external_run_id, run_at, details";

#[derive(Clone)]
pub struct AuditRunRepo {
    pool: PgPool,
}

impl AuditRunRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn report(&self, new: NewAuditRun<'_>) -> Result<AuditRun> {
        let query = format!(
            "insert into audit_runs (asset_id, contract_id, status, checked_count, passed_count, \
             failed_count, triggered_by, external_run_id, details) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9) returning {SELECT_COLS}"
        );
        let row = sqlx::query_as::<_, AuditRunRow>(&query)
            .bind(new.asset_id)
            .bind(new.contract_id)
            .bind(status_to_str(new.status))
            .bind(new.checked_count)
            .bind(new.passed_count)
            .bind(new.failed_count)
            .bind(new.triggered_by)
            .bind(new.external_run_id)
            .bind(new.details)
            .fetch_one(&self.pool)
            .await
            .map_err(domain_err)?;
        row.try_into()
    }

    pub async fn history(&self, asset_id: Uuid, limit: i64) -> Result<Vec<AuditRun>> {
        let query = format!(
            "select {SELECT_COLS} from audit_runs where asset_id = $1 order by run_at desc limit $2"
        );
        let rows = sqlx::query_as::<_, AuditRunRow>(&query)
            .bind(asset_id)
            .bind(limit.min(tessera_core::audit_runs::MAX_HISTORY_LIMIT))
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Every run in the last 30 days for an asset — the window
    /// `tessera_core::audit_runs::compute_trends` needs.
    pub async fn last_30_days(&self, asset_id: Uuid) -> Result<Vec<AuditRun>> {
        let query =
            format!("select {SELECT_COLS} from audit_runs where asset_id = $1 and run_at >= now() - interval '30 days'");
        let rows = sqlx::query_as::<_, AuditRunRow>(&query)
            .bind(asset_id)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn most_recent(&self, asset_id: Uuid) -> Result<Option<AuditRun>> {
        let query = format!("select {SELECT_COLS} from audit_runs where asset_id = $1 order by run_at desc limit 1");
        let row = sqlx::query_as::<_, AuditRunRow>(&query)
            .bind(asset_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(domain_err)?;
        row.map(TryInto::try_into).transpose()
    }
}
