//! Signed, retried, SSRF-safe webhook fan-out (spec §4.6).
//!
//! Producers call [`dispatch::Dispatcher::fire_and_forget`] from inside a
//! request handler once the database transaction has committed; delivery
//! itself happens on a detached task so a slow or unreachable receiver never
//! holds up the API response, the same shape the teacher's indexer uses to
//! push Horizon-sourced events onward without blocking ingestion.

pub mod dispatch;
pub mod events;
pub mod sign;
pub mod ssrf;

pub use dispatch::Dispatcher;
pub use events::{
    AcknowledgmentPayload, ContractPublishedPayload, ImpactedConsumer, Payload, ProposalCreatedPayload,
    ProposalStatusEvent, ProposalStatusPayload, WebhookEvent, WebhookEventType,
};
