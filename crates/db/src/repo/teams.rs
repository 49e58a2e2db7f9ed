use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::domain::Team;
use tessera_core::{DomainError, Result};
use uuid::Uuid;

use crate::error::domain_err;

#[derive(FromRow)]
struct TeamRow {
    id: Uuid,
    name: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team {
            id: row.id,
            name: row.name,
            metadata: row.metadata,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Clone)]
pub struct TeamRepo {
    pool: PgPool,
}

impl TeamRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, name: &str, metadata: serde_json::Value) -> Result<Team> {
        let row = sqlx::query_as::<_, TeamRow>(
            r#"insert into teams (name, metadata) values ($1, $2)
               returning id, name, metadata, created_at, deleted_at"#,
        )
        .bind(name)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(domain_err)?;
        Ok(row.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<Team> {
        let row = sqlx::query_as::<_, TeamRow>(
            r#"select id, name, metadata, created_at, deleted_at from teams
               where id = $1 and deleted_at is null"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(domain_err)?
        .ok_or_else(|| DomainError::not_found(format!("team {id} not found")))?;
        Ok(row.into())
    }

    pub async fn list(&self) -> Result<Vec<Team>> {
        let rows = sqlx::query_as::<_, TeamRow>(
            r#"select id, name, metadata, created_at, deleted_at from teams
               where deleted_at is null order by name"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(domain_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn rename(&self, id: Uuid, name: &str) -> Result<Team> {
        let row = sqlx::query_as::<_, TeamRow>(
            r#"update teams set name = $2 where id = $1 and deleted_at is null
               returning id, name, metadata, created_at, deleted_at"#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(domain_err)?
        .ok_or_else(|| DomainError::not_found(format!("team {id} not found")))?;
        Ok(row.into())
    }

    pub async fn update_metadata(&self, id: Uuid, metadata: serde_json::Value) -> Result<Team> {
        let row = sqlx::query_as::<_, TeamRow>(
            r#"update teams set metadata = $2 where id = $1 and deleted_at is null
               returning id, name, metadata, created_at, deleted_at"#,
        )
        .bind(id)
        .bind(metadata)
        .fetch_optional(&self.pool)
        .await
        .map_err(domain_err)?
        .ok_or_else(|| DomainError::not_found(format!("team {id} not found")))?;
        Ok(row.into())
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "update teams set deleted_at = now() where id = $1 and deleted_at is null",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(domain_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("team {id} not found")));
        }
        Ok(())
    }
}
