use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tessera_core::domain::{AssetDependency, DependencyKind};
use tessera_core::{DomainError, Result};
use uuid::Uuid;

use crate::error::domain_err;

#[derive(FromRow)]
struct DependencyRow {
    id: Uuid,
    downstream_asset_id: Uuid,
    upstream_asset_id: Uuid,
    kind: String,
    created_at: DateTime<Utc>,
}

fn kind_to_str(kind: DependencyKind) -> &'static str {
    match kind {
        DependencyKind::Ref => "ref",
        DependencyKind::Source => "source",
        DependencyKind::Consumes => "consumes",
    }
}

fn kind_from_str(s: &str) -> Result<DependencyKind> {
    Ok(match s {
        "ref" => DependencyKind::Ref,
        "source" => DependencyKind::Source,
        "consumes" => DependencyKind::Consumes,
        other => return Err(DomainError::Internal(format!("unknown dependency kind '{other}'"))),
    })
}

impl TryFrom<DependencyRow> for AssetDependency {
    type Error = DomainError;

    fn try_from(row: DependencyRow) -> std::result::Result<Self, Self::Error> {
        Ok(AssetDependency {
            id: row.id,
            downstream_asset_id: row.downstream_asset_id,
            upstream_asset_id: row.upstream_asset_id,
            kind: kind_from_str(&row.kind)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct DependencyRepo {
    pool: PgPool,
}

impl DependencyRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert on the (downstream, upstream) pair so re-ingesting the same
    /// manifest is idempotent.
    pub async fn upsert(
        &self,
        downstream_asset_id: Uuid,
        upstream_asset_id: Uuid,
        kind: DependencyKind,
    ) -> Result<AssetDependency> {
        let row = sqlx::query_as::<_, DependencyRow>(
            r#"insert into asset_dependencies (downstream_asset_id, upstream_asset_id, kind)
               values ($1, $2, $3)
               on conflict (downstream_asset_id, upstream_asset_id) do update set kind = excluded.kind
               returning id, downstream_asset_id, upstream_asset_id, kind, created_at"#,
        )
        .bind(downstream_asset_id)
        .bind(upstream_asset_id)
        .bind(kind_to_str(kind))
        .fetch_one(&self.pool)
        .await
        .map_err(domain_err)?;
        row.try_into()
    }

    /// Assets that directly consume `upstream_asset_id` — the set a
    /// breaking proposal's impact check walks.
    pub async fn downstream_of(&self, upstream_asset_id: Uuid) -> Result<Vec<AssetDependency>> {
        let rows = sqlx::query_as::<_, DependencyRow>(
            r#"select id, downstream_asset_id, upstream_asset_id, kind, created_at
               from asset_dependencies where upstream_asset_id = $1"#,
        )
        .bind(upstream_asset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn upstream_of(&self, downstream_asset_id: Uuid) -> Result<Vec<AssetDependency>> {
        let rows = sqlx::query_as::<_, DependencyRow>(
            r#"select id, downstream_asset_id, upstream_asset_id, kind, created_at
               from asset_dependencies where downstream_asset_id = $1"#,
        )
        .bind(downstream_asset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(domain_err)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn remove(&self, id: Uuid) -> Result<()> {
        sqlx::query("delete from asset_dependencies where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(domain_err)?;
        Ok(())
    }
}
