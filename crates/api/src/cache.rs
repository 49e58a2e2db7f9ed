//! Optional read-through asset cache (spec SPEC_FULL.md §5). Keyed by
//! `fqn:environment`, backed by the teacher's `redis` dependency. A cache
//! miss or a Redis error never blocks a request — callers always fall back
//! to Postgres and log the failure at `warn`.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tessera_core::domain::Asset;

const DEFAULT_TTL_SECS: u64 = 60;

#[derive(Clone)]
pub struct AssetCache {
    conn: ConnectionManager,
}

impl AssetCache {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    fn key(fqn: &str, environment: &str) -> String {
        format!("tessera:asset:{environment}:{fqn}")
    }

    pub async fn get(&self, fqn: &str, environment: &str) -> Option<Asset> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = match conn.get(Self::key(fqn, environment)).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "asset cache read failed, falling back to postgres");
                return None;
            }
        };
        raw.and_then(|raw| serde_json::from_str(&raw).ok())
    }

    pub async fn set(&self, asset: &Asset) {
        let mut conn = self.conn.clone();
        let Ok(raw) = serde_json::to_string(asset) else { return };
        let key = Self::key(&asset.fqn, &asset.environment);
        if let Err(e) = conn.set_ex::<_, _, ()>(key, raw, DEFAULT_TTL_SECS).await {
            tracing::warn!(error = %e, "asset cache write failed");
        }
    }

    pub async fn invalidate(&self, fqn: &str, environment: &str) {
        let mut conn = self.conn.clone();
        if let Err(e) = conn.del::<_, ()>(Self::key(fqn, environment)).await {
            tracing::warn!(error = %e, "asset cache invalidation failed");
        }
    }
}
