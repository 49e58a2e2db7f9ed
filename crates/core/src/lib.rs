//! Domain logic for the Tessera data-contract coordination service.
//!
//! This crate has no I/O: it is the pure decision core shared by
//! `tessera-db` (persistence), `tessera-ingest` (manifest ingestion),
//! `tessera-webhooks` (fan-out), and `tessera-api` (HTTP surface).

pub mod audit_runs;
pub mod contracts;
pub mod domain;
pub mod error;
pub mod proposals;
pub mod schema_diff;
pub mod version;

pub use error::{DomainError, Result};
