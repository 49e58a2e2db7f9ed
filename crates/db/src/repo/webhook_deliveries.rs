use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::domain::{WebhookDelivery, WebhookDeliveryStatus};
use tessera_core::{DomainError, Result};
use uuid::Uuid;

use crate::error::domain_err;

#[derive(FromRow)]
struct WebhookDeliveryRow {
    id: Uuid,
    event_type: String,
    payload: serde_json::Value,
    target_url: String,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    last_status_code: Option<i32>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn status_to_str(status: WebhookDeliveryStatus) -> &'static str {
    match status {
        WebhookDeliveryStatus::Pending => "pending",
        WebhookDeliveryStatus::Delivered => "delivered",
        WebhookDeliveryStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> Result<WebhookDeliveryStatus> {
    Ok(match s {
        "pending" => WebhookDeliveryStatus::Pending,
        "delivered" => WebhookDeliveryStatus::Delivered,
        "failed" => WebhookDeliveryStatus::Failed,
        other => return Err(DomainError::Internal(format!("unknown webhook delivery status '{other}'"))),
    })
}

impl TryFrom<WebhookDeliveryRow> for WebhookDelivery {
    type Error = DomainError;

    fn try_from(row: WebhookDeliveryRow) -> std::result::Result<Self, Self::Error> {
        Ok(WebhookDelivery {
            id: row.id,
            event_type: row.event_type,
            payload: row.payload,
            target_url: row.target_url,
            status: status_from_str(&row.status)?,
            attempts: row.attempts,
            last_error: row.last_error,
            last_status_code: row.last_status_code,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
        })
    }
}

const SELECT_COLS: &str = "id, event_type, payload, target_url, status, attempts, last_error, \
     last_status_code, delivered_at, created_at";

#[derive(Clone)]
pub struct WebhookDeliveryRepo {
    pool: PgPool,
}

impl WebhookDeliveryRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        target_url: &str,
    ) -> Result<WebhookDelivery> {
        let query = format!(
            "insert into webhook_deliveries (event_type, payload, target_url, status) \
             values ($1, $2, $3, 'pending') returning {SELECT_COLS}"
        );
        let row = sqlx::query_as::<_, WebhookDeliveryRow>(&query)
            .bind(event_type)
            .bind(payload)
            .bind(target_url)
            .fetch_one(&self.pool)
            .await
            .map_err(domain_err)?;
        row.try_into()
    }

    pub async fn record_attempt(
        &self,
        id: Uuid,
        status: WebhookDeliveryStatus,
        status_code: Option<i32>,
        error: Option<&str>,
    ) -> Result<WebhookDelivery> {
        let query = format!(
            "update webhook_deliveries set status = $2, attempts = attempts + 1, \
             last_status_code = $3, last_error = $4, \
             delivered_at = case when $2 = 'delivered' then now() else delivered_at end \
             where id = $1 returning {SELECT_COLS}"
        );
        let row = sqlx::query_as::<_, WebhookDeliveryRow>(&query)
            .bind(id)
            .bind(status_to_str(status))
            .bind(status_code)
            .bind(error)
            .fetch_optional(&self.pool)
            .await
            .map_err(domain_err)?
            .ok_or_else(|| DomainError::not_found(format!("webhook delivery {id} not found")))?;
        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> Result<WebhookDelivery> {
        let query = format!("select {SELECT_COLS} from webhook_deliveries where id = $1");
        let row = sqlx::query_as::<_, WebhookDeliveryRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(domain_err)?
            .ok_or_else(|| DomainError::not_found(format!("webhook delivery {id} not found")))?;
        row.try_into()
    }

    pub async fn list_pending(&self, limit: i64) -> Result<Vec<WebhookDelivery>> {
        let query = format!(
            "select {SELECT_COLS} from webhook_deliveries where status = 'pending' \
             order by created_at limit $1"
        );
        let rows = sqlx::query_as::<_, WebhookDeliveryRow>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
