use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::domain::{AckResponse, Acknowledgment, ProposalStatus};
use tessera_core::proposals::{derive_auto_approval, AutoApprovalOutcome};
use tessera_core::{DomainError, Result};
use uuid::Uuid;

use crate::error::domain_err;

#[derive(FromRow)]
struct AckRow {
    id: Uuid,
    proposal_id: Uuid,
    consumer_team: Uuid,
    acknowledging_user: Uuid,
    response: String,
    migration_deadline: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

fn response_to_str(resp: AckResponse) -> &'static str {
    match resp {
        AckResponse::Approved => "approved",
        AckResponse::Blocked => "blocked",
        AckResponse::NeedsChanges => "needs_changes",
    }
}

fn response_from_str(s: &str) -> Result<AckResponse> {
    Ok(match s {
        "approved" => AckResponse::Approved,
        "blocked" => AckResponse::Blocked,
        "needs_changes" => AckResponse::NeedsChanges,
        other => return Err(DomainError::Internal(format!("unknown ack response '{other}'"))),
    })
}

impl TryFrom<AckRow> for Acknowledgment {
    type Error = DomainError;

    fn try_from(row: AckRow) -> std::result::Result<Self, Self::Error> {
        Ok(Acknowledgment {
            id: row.id,
            proposal_id: row.proposal_id,
            consumer_team: row.consumer_team,
            acknowledging_user: row.acknowledging_user,
            response: response_from_str(&row.response)?,
            migration_deadline: row.migration_deadline,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

const SELECT_COLS: &str = "id, proposal_id, consumer_team, acknowledging_user, response, \
     migration_deadline, notes, created_at";

pub struct SubmitAck<'a> {
    pub proposal_id: Uuid,
    pub consumer_team: Uuid,
    pub acknowledging_user: Uuid,
    pub response: AckResponse,
    pub migration_deadline: Option<DateTime<Utc>>,
    pub notes: Option<&'a str>,
}

pub struct AckOutcome {
    pub acknowledgment: Acknowledgment,
    pub proposal_status: ProposalStatus,
}

#[derive(Clone)]
pub struct AcknowledgmentRepo {
    pool: PgPool,
}

impl AcknowledgmentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_proposal(&self, proposal_id: Uuid) -> Result<Vec<Acknowledgment>> {
        let query = format!("select {SELECT_COLS} from acknowledgments where proposal_id = $1");
        let rows = sqlx::query_as::<_, AckRow>(&query)
            .bind(proposal_id)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Insert (or replace) an acknowledgment and immediately re-derive the
    /// auto-approval outcome within the same transaction — the critical
    /// section invariant P1 depends on (spec §4.3, §5: "the auto-approval
    /// check reads within the same transaction that inserts the ack").
    pub async fn submit(&self, ack: SubmitAck<'_>) -> Result<AckOutcome> {
        let mut tx = self.pool.begin().await.map_err(domain_err)?;

        let lock = sqlx::query_as::<_, (String, Uuid)>(
            "select status, asset_id from proposals where id = $1 for update",
        )
        .bind(ack.proposal_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(domain_err)?
        .ok_or_else(|| DomainError::not_found(format!("proposal {} not found", ack.proposal_id)))?;
        let (status_str, asset_id) = lock;
        if status_str != "pending" {
            return Err(DomainError::bad_request(
                "proposal is no longer pending and cannot accept acknowledgments",
            ));
        }

        let upsert = format!(
            "insert into acknowledgments (proposal_id, consumer_team, acknowledging_user, response, \
             migration_deadline, notes) values ($1, $2, $3, $4, $5, $6) \
             on conflict (proposal_id, consumer_team) do update set \
             acknowledging_user = excluded.acknowledging_user, response = excluded.response, \
             migration_deadline = excluded.migration_deadline, notes = excluded.notes \
             returning {SELECT_COLS}"
        );
        let row = sqlx::query_as::<_, AckRow>(&upsert)
            .bind(ack.proposal_id)
            .bind(ack.consumer_team)
            .bind(ack.acknowledging_user)
            .bind(response_to_str(ack.response))
            .bind(ack.migration_deadline)
            .bind(ack.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(domain_err)?;
        let acknowledgment: Acknowledgment = row.try_into()?;

        let registered_rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"select distinct r.consumer_team
               from registrations r
               join contracts c on c.id = r.contract_id
               where c.asset_id = $1 and r.status = 'active' and c.status = 'active'"#,
        )
        .bind(asset_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(domain_err)?;
        let registered: HashSet<Uuid> = registered_rows.into_iter().map(|(t,)| t).collect();

        let ack_rows: Vec<(Uuid, String)> = sqlx::query_as(
            "select consumer_team, response from acknowledgments where proposal_id = $1",
        )
        .bind(ack.proposal_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(domain_err)?;
        let acks = ack_rows
            .into_iter()
            .map(|(team, resp)| Ok((team, response_from_str(&resp)?)))
            .collect::<Result<Vec<_>>>()?;

        let outcome = derive_auto_approval(&registered, &acks);
        let proposal_status = match outcome {
            AutoApprovalOutcome::StillPending => ProposalStatus::Pending,
            AutoApprovalOutcome::Approved => ProposalStatus::Approved,
            AutoApprovalOutcome::Rejected => ProposalStatus::Rejected,
        };

        if proposal_status != ProposalStatus::Pending {
            let new_status = match proposal_status {
                ProposalStatus::Approved => "approved",
                ProposalStatus::Rejected => "rejected",
                _ => unreachable!(),
            };
            sqlx::query("update proposals set status = $2, resolved_at = now() where id = $1")
                .bind(ack.proposal_id)
                .bind(new_status)
                .execute(&mut *tx)
                .await
                .map_err(domain_err)?;
        }

        tx.commit().await.map_err(domain_err)?;
        Ok(AckOutcome {
            acknowledgment,
            proposal_status,
        })
    }
}
