//! Entity types for the data-contract coordination domain (spec §3).
//!
//! These are plain data types — no persistence concerns. `tessera-db` maps
//! rows onto (and from) these; `tessera-api` serializes them directly as
//! response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    TeamAdmin,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyScope {
    Read,
    Write,
    Admin,
}

impl ApiKeyScope {
    /// Whether this scope permits an operation that needs at least `required`.
    pub fn satisfies(&self, required: ApiKeyScope) -> bool {
        let rank = |s: ApiKeyScope| match s {
            ApiKeyScope::Read => 0,
            ApiKeyScope::Write => 1,
            ApiKeyScope::Admin => 2,
        };
        rank(*self) >= rank(required)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub team_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Model,
    Source,
    Seed,
    Snapshot,
    KafkaTopic,
    ApiEndpoint,
    GraphqlQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuaranteeEvaluationMode {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub fqn: String,
    pub owner_team: Uuid,
    pub owner_user: Option<Uuid>,
    pub environment: String,
    pub resource_type: ResourceType,
    pub guarantee_evaluation_mode: GuaranteeEvaluationMode,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Asset {
    /// Invariant O1: if `owner_user` is set, it must belong to `owner_team`.
    pub fn check_owner_invariant(&self, owner_user_team: Option<Uuid>) -> bool {
        match self.owner_user {
            None => true,
            Some(_) => owner_user_team == Some(self.owner_team),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Ref,
    Source,
    Consumes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDependency {
    pub id: Uuid,
    pub downstream_asset_id: Uuid,
    pub upstream_asset_id: Uuid,
    pub kind: DependencyKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityMode {
    Backward,
    Forward,
    Full,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Deprecated,
    Withdrawn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub version: String,
    pub schema: serde_json::Value,
    pub schema_format: String,
    pub compatibility_mode: CompatibilityMode,
    pub guarantees: serde_json::Value,
    pub status: ContractStatus,
    pub producer_team: Uuid,
    pub published_by: Uuid,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Active,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub consumer_team: Uuid,
    pub pinned_version: Option<String>,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
    Expired,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub proposed_schema: serde_json::Value,
    pub proposed_guarantees: serde_json::Value,
    pub diff_classification: crate::schema_diff::ChangeType,
    pub breaking_changes: Vec<crate::schema_diff::BreakingChange>,
    pub proposer_team: Uuid,
    pub proposer_user: Uuid,
    pub status: ProposalStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_expire: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckResponse {
    Approved,
    Blocked,
    NeedsChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub consumer_team: Uuid,
    pub acknowledging_user: Uuid,
    pub response: AckResponse,
    pub migration_deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditRunStatus {
    Passed,
    Failed,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRun {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub status: AuditRunStatus,
    pub checked_count: i32,
    pub passed_count: i32,
    pub failed_count: i32,
    pub triggered_by: String,
    pub external_run_id: Option<String>,
    pub run_at: DateTime<Utc>,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub actor_user: Option<Uuid>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookDeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub target_url: String,
    pub status: WebhookDeliveryStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub last_status_code: Option<i32>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub hashed_key: String,
    pub scope: ApiKeyScope,
    pub owning_user: Option<Uuid>,
    pub owning_team: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_invariant_holds_when_no_owner_user() {
        let asset = Asset {
            id: Uuid::new_v4(),
            fqn: "db.schema.t".into(),
            owner_team: Uuid::new_v4(),
            owner_user: None,
            environment: "production".into(),
            resource_type: ResourceType::Model,
            guarantee_evaluation_mode: GuaranteeEvaluationMode::Automatic,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            deleted_at: None,
        };
        assert!(asset.check_owner_invariant(None));
    }

    #[test]
    fn owner_invariant_rejects_mismatched_team() {
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        let asset = Asset {
            id: Uuid::new_v4(),
            fqn: "db.schema.t".into(),
            owner_team: team_a,
            owner_user: Some(Uuid::new_v4()),
            environment: "production".into(),
            resource_type: ResourceType::Model,
            guarantee_evaluation_mode: GuaranteeEvaluationMode::Automatic,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            deleted_at: None,
        };
        assert!(!asset.check_owner_invariant(Some(team_b)));
        assert!(asset.check_owner_invariant(Some(team_a)));
    }

    #[test]
    fn proposal_status_terminality() {
        assert!(!ProposalStatus::Pending.is_terminal());
        assert!(ProposalStatus::Approved.is_terminal());
        assert!(ProposalStatus::Rejected.is_terminal());
        assert!(ProposalStatus::Withdrawn.is_terminal());
        assert!(ProposalStatus::Expired.is_terminal());
    }

    #[test]
    fn scope_satisfies_ranking() {
        assert!(ApiKeyScope::Admin.satisfies(ApiKeyScope::Read));
        assert!(ApiKeyScope::Admin.satisfies(ApiKeyScope::Write));
        assert!(ApiKeyScope::Write.satisfies(ApiKeyScope::Read));
        assert!(!ApiKeyScope::Read.satisfies(ApiKeyScope::Write));
    }
}
