//! Storage-layer error type. Converts into `tessera_core::DomainError` at
//! the boundary so callers above this crate never see `sqlx::Error`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database migration failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Query(#[from] sqlx::Error),

    #[error(transparent)]
    Domain(#[from] tessera_core::DomainError),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for tessera_core::DomainError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(d) => d,
            DbError::Query(sqlx::Error::RowNotFound) => {
                tessera_core::DomainError::NotFound("row not found".to_string())
            }
            DbError::Query(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tessera_core::DomainError::Conflict(db_err.message().to_string())
            }
            other => tessera_core::DomainError::Internal(other.to_string()),
        }
    }
}

/// Map a raw sqlx error straight to `DomainError`, going through `DbError`
/// so the `RowNotFound`/unique-violation classification in the `From` impl
/// above is applied consistently everywhere a repository touches the pool.
pub fn domain_err(err: sqlx::Error) -> tessera_core::DomainError {
    tessera_core::DomainError::from(DbError::from(err))
}
