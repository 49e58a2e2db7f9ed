use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::domain::{User, UserRole};
use tessera_core::{DomainError, Result};
use uuid::Uuid;

use crate::error::domain_err;

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    password_hash: Option<String>,
    role: String,
    team_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    deactivated_at: Option<DateTime<Utc>>,
}

fn role_to_str(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "admin",
        UserRole::TeamAdmin => "team_admin",
        UserRole::User => "user",
    }
}

fn role_from_str(s: &str) -> Result<UserRole> {
    match s {
        "admin" => Ok(UserRole::Admin),
        "team_admin" => Ok(UserRole::TeamAdmin),
        "user" => Ok(UserRole::User),
        other => Err(DomainError::Internal(format!("unknown user role '{other}' in database"))),
    }
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> std::result::Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role: role_from_str(&row.role)?,
            team_id: row.team_id,
            created_at: row.created_at,
            deactivated_at: row.deactivated_at,
        })
    }
}

#[derive(Clone)]
pub struct UserRepo {
    pool: PgPool,
}

impl UserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        email: &str,
        name: &str,
        password_hash: Option<&str>,
        role: UserRole,
        team_id: Option<Uuid>,
    ) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"insert into users (email, name, password_hash, role, team_id)
               values ($1, $2, $3, $4, $5)
               returning id, email, name, password_hash, role, team_id, created_at, deactivated_at"#,
        )
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(role_to_str(role))
        .bind(team_id)
        .fetch_one(&self.pool)
        .await
        .map_err(domain_err)?;
        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"select id, email, name, password_hash, role, team_id, created_at, deactivated_at
               from users where id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(domain_err)?
        .ok_or_else(|| DomainError::not_found(format!("user {id} not found")))?;
        row.try_into()
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"select id, email, name, password_hash, role, team_id, created_at, deactivated_at
               from users where lower(email) = lower($1)"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(domain_err)?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_for_team(&self, team_id: Uuid) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"select id, email, name, password_hash, role, team_id, created_at, deactivated_at
               from users where team_id = $1 order by name"#,
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Filtered list for `GET /api/v1/users`: `email_query` matches a
    /// case-insensitive substring of the email.
    pub async fn list(&self, team_id: Option<Uuid>, email_query: Option<&str>) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"select id, email, name, password_hash, role, team_id, created_at, deactivated_at
               from users
               where ($1::uuid is null or team_id = $1)
                 and ($2::text is null or email ilike '%' || $2 || '%')
               order by name"#,
        )
        .bind(team_id)
        .bind(email_query)
        .fetch_all(&self.pool)
        .await
        .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn update(&self, id: Uuid, name: Option<&str>, team_id: Option<Uuid>) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"update users set name = coalesce($2, name), team_id = coalesce($3, team_id)
               where id = $1
               returning id, email, name, password_hash, role, team_id, created_at, deactivated_at"#,
        )
        .bind(id)
        .bind(name)
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(domain_err)?
        .ok_or_else(|| DomainError::not_found(format!("user {id} not found")))?;
        row.try_into()
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("update users set deactivated_at = now() where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(domain_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("user {id} not found")));
        }
        Ok(())
    }

    pub async fn reactivate(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("update users set deactivated_at = null where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(domain_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("user {id} not found")));
        }
        Ok(())
    }
}
