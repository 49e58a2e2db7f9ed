//! Postgres persistence layer for the Tessera data-contract coordination
//! service. Every public function returns `tessera_core::Result` so callers
//! above this crate never need to know sqlx exists.

pub mod error;
pub mod pool;
pub mod repo;

pub use error::{DbError, Result};
pub use pool::{connect, health_check, migrate, PoolConfig};
pub use sqlx::PgPool;
