//! Tessera HTTP API: the surface through which producers publish contracts,
//! consumers register and acknowledge, and CI pipelines sync manifests.

pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use error::{ApiError, Result};
pub use server::{Server, ServerConfig};
pub use state::AppState;
