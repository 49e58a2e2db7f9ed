use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::domain::AuditEvent;
use tessera_core::Result;
use uuid::Uuid;

use crate::error::domain_err;

#[derive(FromRow)]
struct AuditEventRow {
    id: Uuid,
    event_type: String,
    entity_type: String,
    entity_id: Uuid,
    actor_user: Option<Uuid>,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<AuditEventRow> for AuditEvent {
    fn from(row: AuditEventRow) -> Self {
        AuditEvent {
            id: row.id,
            event_type: row.event_type,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            actor_user: row.actor_user,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

const SELECT_COLS: &str = "id, event_type, entity_type, entity_id, actor_user, details, created_at";

#[derive(Clone)]
pub struct AuditEventRepo {
    pool: PgPool,
}

impl AuditEventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an immutable audit-trail entry. Never fails the calling
    /// operation: audit logging is best-effort observability, not a
    /// correctness invariant, so callers may choose to ignore the error and
    /// only log it — the teacher's `telemetry` module follows the same
    /// posture for its own event emission.
    pub async fn record(
        &self,
        event_type: &str,
        entity_type: &str,
        entity_id: Uuid,
        actor_user: Option<Uuid>,
        details: serde_json::Value,
    ) -> Result<AuditEvent> {
        let query = format!(
            "insert into audit_events (event_type, entity_type, entity_id, actor_user, details) \
             values ($1, $2, $3, $4, $5) returning {SELECT_COLS}"
        );
        let row = sqlx::query_as::<_, AuditEventRow>(&query)
            .bind(event_type)
            .bind(entity_type)
            .bind(entity_id)
            .bind(actor_user)
            .bind(details)
            .fetch_one(&self.pool)
            .await
            .map_err(domain_err)?;
        Ok(row.into())
    }

    pub async fn list_for_entity(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditEvent>> {
        let query = format!(
            "select {SELECT_COLS} from audit_events where entity_type = $1 and entity_id = $2 \
             order by created_at desc"
        );
        let rows = sqlx::query_as::<_, AuditEventRow>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await
            .map_err(domain_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
