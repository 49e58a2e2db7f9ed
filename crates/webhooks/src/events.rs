//! Event envelope and payload shapes (spec §4.6). Grounded on the reference
//! `WebhookEvent`/`WebhookEventType`/`*Payload` models in
//! `services/webhooks.py`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tessera_core::schema_diff::BreakingChange;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventType {
    ProposalCreated,
    ProposalAcknowledged,
    ProposalApproved,
    ProposalRejected,
    ProposalWithdrawn,
    ProposalForceApproved,
    ProposalExpired,
    ContractPublished,
}

impl WebhookEventType {
    /// Event name carried in the envelope and the `X-Tessera-Event` header,
    /// and stored verbatim in `webhook_deliveries.event_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProposalCreated => "proposal_created",
            Self::ProposalAcknowledged => "proposal_acknowledged",
            Self::ProposalApproved => "proposal_approved",
            Self::ProposalRejected => "proposal_rejected",
            Self::ProposalWithdrawn => "proposal_withdrawn",
            Self::ProposalForceApproved => "proposal_force_approved",
            Self::ProposalExpired => "proposal_expired",
            Self::ContractPublished => "contract_published",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactedConsumer {
    pub team_id: Uuid,
    pub team_name: String,
    pub pinned_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposalCreatedPayload {
    pub proposal_id: Uuid,
    pub asset_id: Uuid,
    pub asset_fqn: String,
    pub producer_team_id: Uuid,
    pub producer_team_name: String,
    pub proposed_version: String,
    pub breaking_changes: Vec<BreakingChange>,
    pub impacted_consumers: Vec<ImpactedConsumer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcknowledgmentPayload {
    pub proposal_id: Uuid,
    pub asset_id: Uuid,
    pub asset_fqn: String,
    pub consumer_team_id: Uuid,
    pub consumer_team_name: String,
    pub response: String,
    pub migration_deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub pending_count: u32,
    pub acknowledged_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposalStatusPayload {
    pub proposal_id: Uuid,
    pub asset_id: Uuid,
    pub asset_fqn: String,
    pub status: String,
    pub actor_team_id: Option<Uuid>,
    pub actor_team_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractPublishedPayload {
    pub contract_id: Uuid,
    pub asset_id: Uuid,
    pub asset_fqn: String,
    pub version: String,
    pub producer_team_id: Uuid,
    pub producer_team_name: String,
    pub from_proposal_id: Option<Uuid>,
}

/// Anything that can become an event's `payload` field. Implemented by each
/// `*Payload` struct rather than collapsing them into one enum, so a new
/// event type only needs a new struct and a `WebhookEventType` variant.
pub trait Payload: Serialize {
    fn event_type(&self) -> WebhookEventType;
}

impl Payload for ProposalCreatedPayload {
    fn event_type(&self) -> WebhookEventType {
        WebhookEventType::ProposalCreated
    }
}

impl Payload for AcknowledgmentPayload {
    fn event_type(&self) -> WebhookEventType {
        WebhookEventType::ProposalAcknowledged
    }
}

impl Payload for ContractPublishedPayload {
    fn event_type(&self) -> WebhookEventType {
        WebhookEventType::ContractPublished
    }
}

/// `ProposalStatusPayload` carries no fixed event type of its own: the
/// caller picks approved/rejected/withdrawn/force_approved/expired.
pub struct ProposalStatusEvent {
    pub event_type: WebhookEventType,
    pub payload: ProposalStatusPayload,
}

/// The JSON envelope actually POSTed: `{event, timestamp, payload}`.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub event: &'static str,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl WebhookEvent {
    pub fn new<P: Payload>(payload: &P, timestamp: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(Self { event: payload.event_type().as_str(), timestamp, payload: serde_json::to_value(payload)? })
    }

    pub fn from_status_event(event: ProposalStatusEvent, timestamp: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(Self { event: event.event_type.as_str(), timestamp, payload: serde_json::to_value(event.payload)? })
    }
}
