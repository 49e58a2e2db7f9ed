//! Per-entity repositories. Each wraps a `&PgPool` (or an open transaction)
//! and speaks only in `tessera_core::domain` types — row mapping happens at
//! the edge of each function, never leaking `sqlx::Row` upward.

pub mod acknowledgments;
pub mod api_keys;
pub mod assets;
pub mod audit_events;
pub mod audit_runs;
pub mod contracts;
pub mod dependencies;
pub mod proposals;
pub mod registrations;
pub mod teams;
pub mod users;
pub mod webhook_deliveries;

pub use acknowledgments::AcknowledgmentRepo;
pub use api_keys::ApiKeyRepo;
pub use assets::AssetRepo;
pub use audit_events::AuditEventRepo;
pub use audit_runs::AuditRunRepo;
pub use contracts::ContractRepo;
pub use dependencies::DependencyRepo;
pub use proposals::ProposalRepo;
pub use registrations::RegistrationRepo;
pub use teams::TeamRepo;
pub use users::UserRepo;
pub use webhook_deliveries::WebhookDeliveryRepo;
