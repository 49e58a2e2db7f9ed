use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::domain::{Asset, GuaranteeEvaluationMode, ResourceType};
use tessera_core::{DomainError, Result};
use uuid::Uuid;

use crate::error::domain_err;

#[derive(FromRow)]
struct AssetRow {
    id: Uuid,
    fqn: String,
    owner_team: Uuid,
    owner_user: Option<Uuid>,
    environment: String,
    resource_type: String,
    guarantee_evaluation_mode: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

fn resource_type_to_str(kind: ResourceType) -> &'static str {
    match kind {
        ResourceType::Model => "model",
        ResourceType::Source => "source",
        ResourceType::Seed => "seed",
        ResourceType::Snapshot => "snapshot",
        ResourceType::KafkaTopic => "kafka_topic",
        ResourceType::ApiEndpoint => "api_endpoint",
        ResourceType::GraphqlQuery => "graphql_query",
    }
}

fn resource_type_from_str(s: &str) -> Result<ResourceType> {
    Ok(match s {
        "model" => ResourceType::Model,
        "source" => ResourceType::Source,
        "seed" => ResourceType::Seed,
        "snapshot" => ResourceType::Snapshot,
        "kafka_topic" => ResourceType::KafkaTopic,
        "api_endpoint" => ResourceType::ApiEndpoint,
        "graphql_query" => ResourceType::GraphqlQuery,
        other => return Err(DomainError::Internal(format!("unknown resource type '{other}'"))),
    })
}

fn eval_mode_to_str(mode: GuaranteeEvaluationMode) -> &'static str {
    match mode {
        GuaranteeEvaluationMode::Automatic => "automatic",
        GuaranteeEvaluationMode::Manual => "manual",
    }
}

fn eval_mode_from_str(s: &str) -> Result<GuaranteeEvaluationMode> {
    Ok(match s {
        "automatic" => GuaranteeEvaluationMode::Automatic,
        "manual" => GuaranteeEvaluationMode::Manual,
        other => return Err(DomainError::Internal(format!("unknown guarantee evaluation mode '{other}'"))),
    })
}

impl TryFrom<AssetRow> for Asset {
    type Error = DomainError;

    fn try_from(row: AssetRow) -> std::result::Result<Self, Self::Error> {
        Ok(Asset {
            id: row.id,
            fqn: row.fqn,
            owner_team: row.owner_team,
            owner_user: row.owner_user,
            environment: row.environment,
            resource_type: resource_type_from_str(&row.resource_type)?,
            guarantee_evaluation_mode: eval_mode_from_str(&row.guarantee_evaluation_mode)?,
            metadata: row.metadata,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        })
    }
}

pub struct NewAsset<'a> {
    pub fqn: &'a str,
    pub owner_team: Uuid,
    pub owner_user: Option<Uuid>,
    pub environment: &'a str,
    pub resource_type: ResourceType,
    pub guarantee_evaluation_mode: GuaranteeEvaluationMode,
    pub metadata: serde_json::Value,
}

#[derive(Clone)]
pub struct AssetRepo {
    pool: PgPool,
}

const SELECT_COLS: &str = "id, fqn, owner_team, owner_user, environment, resource_type, \
     guarantee_evaluation_mode, metadata, created_at, deleted_at";

impl AssetRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewAsset<'_>) -> Result<Asset> {
        let query = format!(
            "insert into assets (fqn, owner_team, owner_user, environment, resource_type, \
             guarantee_evaluation_mode, metadata) values ($1, $2, $3, $4, $5, $6, $7) \
             returning {SELECT_COLS}"
        );
        let row = sqlx::query_as::<_, AssetRow>(&query)
            .bind(new.fqn)
            .bind(new.owner_team)
            .bind(new.owner_user)
            .bind(new.environment)
            .bind(resource_type_to_str(new.resource_type))
            .bind(eval_mode_to_str(new.guarantee_evaluation_mode))
            .bind(new.metadata)
            .fetch_one(&self.pool)
            .await
            .map_err(domain_err)?;
        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> Result<Asset> {
        let query = format!("select {SELECT_COLS} from assets where id = $1 and deleted_at is null");
        let row = sqlx::query_as::<_, AssetRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(domain_err)?
            .ok_or_else(|| DomainError::not_found(format!("asset {id} not found")))?;
        row.try_into()
    }

    pub async fn get_by_fqn(&self, fqn: &str, environment: &str) -> Result<Option<Asset>> {
        let query = format!(
            "select {SELECT_COLS} from assets \
             where lower(fqn) = lower($1) and environment = $2 and deleted_at is null"
        );
        let row = sqlx::query_as::<_, AssetRow>(&query)
            .bind(fqn)
            .bind(environment)
            .fetch_optional(&self.pool)
            .await
            .map_err(domain_err)?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_for_team(&self, owner_team: Uuid) -> Result<Vec<Asset>> {
        let query = format!(
            "select {SELECT_COLS} from assets where owner_team = $1 and deleted_at is null order by fqn"
        );
        let rows = sqlx::query_as::<_, AssetRow>(&query)
            .bind(owner_team)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Filtered cross-team list for `GET /api/v1/assets`.
    pub async fn list_all(&self, owner_team: Option<Uuid>, environment: Option<&str>) -> Result<Vec<Asset>> {
        let query = format!(
            "select {SELECT_COLS} from assets \
             where deleted_at is null \
               and ($1::uuid is null or owner_team = $1) \
               and ($2::text is null or environment = $2) \
             order by fqn"
        );
        let rows = sqlx::query_as::<_, AssetRow>(&query)
            .bind(owner_team)
            .bind(environment)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Prefix/substring search on FQN for `GET /api/v1/assets/search`.
    pub async fn search(&self, q: &str) -> Result<Vec<Asset>> {
        let query = format!(
            "select {SELECT_COLS} from assets \
             where deleted_at is null and fqn ilike '%' || $1 || '%' \
             order by fqn limit 100"
        );
        let rows = sqlx::query_as::<_, AssetRow>(&query)
            .bind(q)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn update_metadata(&self, id: Uuid, metadata: serde_json::Value) -> Result<Asset> {
        let query = format!(
            "update assets set metadata = $2 where id = $1 and deleted_at is null returning {SELECT_COLS}"
        );
        let row = sqlx::query_as::<_, AssetRow>(&query)
            .bind(id)
            .bind(metadata)
            .fetch_optional(&self.pool)
            .await
            .map_err(domain_err)?
            .ok_or_else(|| DomainError::not_found(format!("asset {id} not found")))?;
        row.try_into()
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "update assets set deleted_at = now() where id = $1 and deleted_at is null",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(domain_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("asset {id} not found")));
        }
        Ok(())
    }
}
