use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::domain::{Registration, RegistrationStatus};
use tessera_core::{DomainError, Result};
use uuid::Uuid;

use crate::error::domain_err;

#[derive(FromRow)]
struct RegistrationRow {
    id: Uuid,
    contract_id: Uuid,
    consumer_team: Uuid,
    pinned_version: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

fn status_from_str(s: &str) -> Result<RegistrationStatus> {
    Ok(match s {
        "active" => RegistrationStatus::Active,
        "revoked" => RegistrationStatus::Revoked,
        other => return Err(DomainError::Internal(format!("unknown registration status '{other}'"))),
    })
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = DomainError;

    fn try_from(row: RegistrationRow) -> std::result::Result<Self, Self::Error> {
        Ok(Registration {
            id: row.id,
            contract_id: row.contract_id,
            consumer_team: row.consumer_team,
            pinned_version: row.pinned_version,
            status: status_from_str(&row.status)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct RegistrationRepo {
    pool: PgPool,
}

const SELECT_COLS: &str = "id, contract_id, consumer_team, pinned_version, status, created_at";

impl RegistrationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn register(
        &self,
        contract_id: Uuid,
        consumer_team: Uuid,
        pinned_version: Option<&str>,
    ) -> Result<Registration> {
        let query = format!(
            "insert into registrations (contract_id, consumer_team, pinned_version, status) \
             values ($1, $2, $3, 'active') \
             on conflict (contract_id, consumer_team) where status = 'active' \
             do update set pinned_version = excluded.pinned_version \
             returning {SELECT_COLS}"
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&query)
            .bind(contract_id)
            .bind(consumer_team)
            .bind(pinned_version)
            .fetch_one(&self.pool)
            .await
            .map_err(domain_err)?;
        row.try_into()
    }

    pub async fn revoke(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "update registrations set status = 'revoked' where id = $1 and status = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(domain_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("registration {id} not found")));
        }
        Ok(())
    }

    /// All teams currently registered (actively) against any contract for
    /// `asset_id` — this is the `R` set the auto-approval rule checks
    /// acknowledgments against.
    pub async fn active_consumers_for_asset(&self, asset_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"select distinct r.consumer_team
               from registrations r
               join contracts c on c.id = r.contract_id
               where c.asset_id = $1 and r.status = 'active' and c.status = 'active'"#,
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(domain_err)?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    /// Filtered list for `GET /api/v1/registrations`.
    pub async fn list_all(&self, contract_id: Option<Uuid>, consumer_team: Option<Uuid>) -> Result<Vec<Registration>> {
        let query = format!(
            "select {SELECT_COLS} from registrations \
             where ($1::uuid is null or contract_id = $1) \
               and ($2::uuid is null or consumer_team = $2) \
             order by created_at desc"
        );
        let rows = sqlx::query_as::<_, RegistrationRow>(&query)
            .bind(contract_id)
            .bind(consumer_team)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn list_for_contract(&self, contract_id: Uuid) -> Result<Vec<Registration>> {
        let query = format!("select {SELECT_COLS} from registrations where contract_id = $1");
        let rows = sqlx::query_as::<_, RegistrationRow>(&query)
            .bind(contract_id)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
