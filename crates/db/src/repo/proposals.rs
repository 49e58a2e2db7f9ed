use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::domain::Proposal;
use tessera_core::proposals;
use tessera_core::schema_diff::{BreakingChange, ChangeType};
use tessera_core::{DomainError, Result};
use uuid::Uuid;
use tessera_core::domain::ProposalStatus;

use crate::error::domain_err;

#[derive(FromRow)]
struct ProposalRow {
    id: Uuid,
    asset_id: Uuid,
    proposed_schema: serde_json::Value,
    proposed_guarantees: serde_json::Value,
    diff_classification: String,
    breaking_changes: serde_json::Value,
    proposer_team: Uuid,
    proposer_user: Uuid,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    auto_expire: bool,
    resolved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn status_to_str(status: ProposalStatus) -> &'static str {
    match status {
        ProposalStatus::Pending => "pending",
        ProposalStatus::Approved => "approved",
        ProposalStatus::Rejected => "rejected",
        ProposalStatus::Withdrawn => "withdrawn",
        ProposalStatus::Expired => "expired",
    }
}

fn status_from_str(s: &str) -> Result<ProposalStatus> {
    Ok(match s {
        "pending" => ProposalStatus::Pending,
        "approved" => ProposalStatus::Approved,
        "rejected" => ProposalStatus::Rejected,
        "withdrawn" => ProposalStatus::Withdrawn,
        "expired" => ProposalStatus::Expired,
        other => return Err(DomainError::Internal(format!("unknown proposal status '{other}'"))),
    })
}

fn change_type_to_str(kind: ChangeType) -> &'static str {
    match kind {
        ChangeType::Patch => "patch",
        ChangeType::Minor => "minor",
        ChangeType::Major => "major",
    }
}

fn change_type_from_str(s: &str) -> Result<ChangeType> {
    Ok(match s {
        "patch" => ChangeType::Patch,
        "minor" => ChangeType::Minor,
        "major" => ChangeType::Major,
        other => return Err(DomainError::Internal(format!("unknown change type '{other}'"))),
    })
}

impl TryFrom<ProposalRow> for Proposal {
    type Error = DomainError;

    fn try_from(row: ProposalRow) -> std::result::Result<Self, Self::Error> {
        let breaking_changes: Vec<BreakingChange> = serde_json::from_value(row.breaking_changes)
            .map_err(|e| DomainError::Internal(format!("corrupt breaking_changes column: {e}")))?;
        Ok(Proposal {
            id: row.id,
            asset_id: row.asset_id,
            proposed_schema: row.proposed_schema,
            proposed_guarantees: row.proposed_guarantees,
            diff_classification: change_type_from_str(&row.diff_classification)?,
            breaking_changes,
            proposer_team: row.proposer_team,
            proposer_user: row.proposer_user,
            status: status_from_str(&row.status)?,
            expires_at: row.expires_at,
            auto_expire: row.auto_expire,
            resolved_at: row.resolved_at,
            created_at: row.created_at,
        })
    }
}

pub struct NewProposal<'a> {
    pub asset_id: Uuid,
    pub proposed_schema: serde_json::Value,
    pub proposed_guarantees: serde_json::Value,
    pub diff_classification: ChangeType,
    pub breaking_changes: &'a [BreakingChange],
    pub proposer_team: Uuid,
    pub proposer_user: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_expire: bool,
}

const SELECT_COLS: &str = "id, asset_id, proposed_schema, proposed_guarantees, diff_classification, \
     breaking_changes, proposer_team, proposer_user, status, expires_at, auto_expire, resolved_at, created_at";

#[derive(Clone)]
pub struct ProposalRepo {
    pool: PgPool,
}

impl ProposalRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create(&self, new: NewProposal<'_>) -> Result<Proposal> {
        let breaking_changes_json = serde_json::to_value(new.breaking_changes)
            .map_err(|e| DomainError::Internal(format!("cannot serialize breaking changes: {e}")))?;
        let query = format!(
            "insert into proposals (asset_id, proposed_schema, proposed_guarantees, diff_classification, \
             breaking_changes, proposer_team, proposer_user, status, expires_at, auto_expire) \
             values ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9) returning {SELECT_COLS}"
        );
        let row = sqlx::query_as::<_, ProposalRow>(&query)
            .bind(new.asset_id)
            .bind(new.proposed_schema)
            .bind(new.proposed_guarantees)
            .bind(change_type_to_str(new.diff_classification))
            .bind(breaking_changes_json)
            .bind(new.proposer_team)
            .bind(new.proposer_user)
            .bind(new.expires_at)
            .bind(new.auto_expire)
            .fetch_one(&self.pool)
            .await
            .map_err(domain_err)?;
        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> Result<Proposal> {
        let query = format!("select {SELECT_COLS} from proposals where id = $1");
        let row = sqlx::query_as::<_, ProposalRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(domain_err)?
            .ok_or_else(|| DomainError::not_found(format!("proposal {id} not found")))?;
        row.try_into()
    }

    pub async fn list_for_asset(&self, asset_id: Uuid) -> Result<Vec<Proposal>> {
        let query = format!(
            "select {SELECT_COLS} from proposals where asset_id = $1 order by created_at desc"
        );
        let rows = sqlx::query_as::<_, ProposalRow>(&query)
            .bind(asset_id)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn list_pending_expired(&self, now: DateTime<Utc>) -> Result<Vec<Proposal>> {
        let query = format!(
            "select {SELECT_COLS} from proposals \
             where status = 'pending' and auto_expire and expires_at <= $1"
        );
        let rows = sqlx::query_as::<_, ProposalRow>(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Filtered, paginated list for `GET /api/v1/proposals`.
    pub async fn list(
        &self,
        status: Option<ProposalStatus>,
        asset_id: Option<Uuid>,
        proposed_by: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Proposal>> {
        let query = format!(
            "select {SELECT_COLS} from proposals \
             where ($1::text is null or status = $1) \
               and ($2::uuid is null or asset_id = $2) \
               and ($3::uuid is null or proposer_user = $3) \
             order by created_at desc limit $4 offset $5"
        );
        let rows = sqlx::query_as::<_, ProposalRow>(&query)
            .bind(status.map(status_to_str))
            .bind(asset_id)
            .bind(proposed_by)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Explicit producer/admin transition (withdraw, expire, force-approve).
    /// Row-locked so it cannot race with [`Self::resolve`].
    pub async fn transition(&self, id: Uuid, to: ProposalStatus) -> Result<Proposal> {
        let mut tx = self.pool.begin().await.map_err(domain_err)?;
        let lock_query = format!("select {SELECT_COLS} from proposals where id = $1 for update");
        let row = sqlx::query_as::<_, ProposalRow>(&lock_query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(domain_err)?
            .ok_or_else(|| DomainError::not_found(format!("proposal {id} not found")))?;
        let current: Proposal = row.try_into()?;
        proposals::require_mutable(current.status)?;

        let update = format!(
            "update proposals set status = $2, resolved_at = now() where id = $1 returning {SELECT_COLS}"
        );
        let row = sqlx::query_as::<_, ProposalRow>(&update)
            .bind(id)
            .bind(status_to_str(to))
            .fetch_one(&mut *tx)
            .await
            .map_err(domain_err)?;
        tx.commit().await.map_err(domain_err)?;
        row.try_into()
    }
}
