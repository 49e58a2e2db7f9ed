use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::domain::{ApiKey, ApiKeyScope};
use tessera_core::{DomainError, Result};
use uuid::Uuid;

use crate::error::domain_err;

#[derive(FromRow)]
struct ApiKeyRow {
    id: Uuid,
    hashed_key: String,
    scope: String,
    owning_user: Option<Uuid>,
    owning_team: Option<Uuid>,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
}

fn scope_to_str(scope: ApiKeyScope) -> &'static str {
    match scope {
        ApiKeyScope::Read => "read",
        ApiKeyScope::Write => "write",
        ApiKeyScope::Admin => "admin",
    }
}

fn scope_from_str(s: &str) -> Result<ApiKeyScope> {
    match s {
        "read" => Ok(ApiKeyScope::Read),
        "write" => Ok(ApiKeyScope::Write),
        "admin" => Ok(ApiKeyScope::Admin),
        other => Err(DomainError::Internal(format!("unknown api key scope '{other}'"))),
    }
}

impl TryFrom<ApiKeyRow> for ApiKey {
    type Error = DomainError;

    fn try_from(row: ApiKeyRow) -> std::result::Result<Self, Self::Error> {
        Ok(ApiKey {
            id: row.id,
            hashed_key: row.hashed_key,
            scope: scope_from_str(&row.scope)?,
            owning_user: row.owning_user,
            owning_team: row.owning_team,
            created_at: row.created_at,
            revoked_at: row.revoked_at,
            last_used_at: row.last_used_at,
        })
    }
}

#[derive(Clone)]
pub struct ApiKeyRepo {
    pool: PgPool,
}

impl ApiKeyRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        hashed_key: &str,
        scope: ApiKeyScope,
        owning_user: Option<Uuid>,
        owning_team: Option<Uuid>,
    ) -> Result<ApiKey> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"insert into api_keys (hashed_key, scope, owning_user, owning_team)
               values ($1, $2, $3, $4)
               returning id, hashed_key, scope, owning_user, owning_team, created_at, revoked_at, last_used_at"#,
        )
        .bind(hashed_key)
        .bind(scope_to_str(scope))
        .bind(owning_user)
        .bind(owning_team)
        .fetch_one(&self.pool)
        .await
        .map_err(domain_err)?;
        row.try_into()
    }

    /// Look up an active (non-revoked) key by its hash and bump `last_used_at`
    /// in the same round trip, matching how the teacher's rate-limit
    /// middleware resolves the caller on every request.
    pub async fn authenticate(&self, hashed_key: &str) -> Result<Option<ApiKey>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"update api_keys set last_used_at = now()
               where hashed_key = $1 and revoked_at is null
               returning id, hashed_key, scope, owning_user, owning_team, created_at, revoked_at, last_used_at"#,
        )
        .bind(hashed_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(domain_err)?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn revoke(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "update api_keys set revoked_at = now() where id = $1 and revoked_at is null",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(domain_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("api key {id} not found")));
        }
        Ok(())
    }

    pub async fn list_for_owner(&self, owning_user: Uuid) -> Result<Vec<ApiKey>> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(
            r#"select id, hashed_key, scope, owning_user, owning_team, created_at, revoked_at, last_used_at
               from api_keys where owning_user = $1 order by created_at desc"#,
        )
        .bind(owning_user)
        .fetch_all(&self.pool)
        .await
        .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
