//! Manifest ingestion pipeline (spec §4.4).
//!
//! Parses external schema sources (dbt manifests, OpenAPI documents, GraphQL
//! SDL, git-synced YAML) into the Asset/Contract shapes `tessera-db` persists.
//! Everything here talks to the database through the `tessera-db` repos
//! directly rather than routing back up through `tessera-api`, the way the
//! teacher's `indexer` crate writes straight to its own `db` module instead
//! of calling back into `api`.

pub mod dbt;
pub mod diff_preview;
pub mod git_sync;
pub mod graphql;
pub mod impact;
pub mod openapi;
pub mod type_map;
