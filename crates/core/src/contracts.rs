//! Contract publication decision tree (spec §4.2).
//!
//! `decide_publish` is the pure core of `ContractService::publish`: given
//! the current active contract (if any) and a candidate schema/version, it
//! decides whether to publish, propose, or force-publish. The repository
//! layer is responsible for steps 1 (external schema validation) and 2 (row
//! locking) around this call, and for actually writing the resulting rows.

use serde_json::Value;

use crate::domain::CompatibilityMode;
use crate::error::{DomainError, Result};
use crate::schema_diff::{self, BreakingChange};
use crate::version;

#[derive(Debug, Clone)]
pub struct CurrentContract<'a> {
    pub version: &'a str,
    pub schema: &'a Value,
    pub compatibility_mode: CompatibilityMode,
}

#[derive(Debug, Clone)]
pub enum Decision {
    Published,
    ProposalCreated { breaking_changes: Vec<BreakingChange> },
    ForcePublished { warning: String },
}

/// Recognized guarantee keys (spec §4.2); unknown keys are preserved
/// verbatim by the caller rather than rejected here.
pub const KNOWN_GUARANTEE_KEYS: &[&str] =
    &["freshness", "volume", "nullability", "accepted_values", "custom"];

pub fn decide_publish(
    current: Option<CurrentContract<'_>>,
    new_version: &str,
    new_schema: &Value,
    force: bool,
) -> Result<Decision> {
    let Some(current) = current else {
        return Ok(Decision::Published);
    };

    if !version::is_strictly_greater(current.version, new_version) {
        return Err(DomainError::bad_request(format!(
            "new version '{new_version}' must be strictly greater than current active version '{}'",
            current.version
        )));
    }

    let (compatible, breaking) =
        schema_diff::check_compatibility(current.schema, new_schema, current.compatibility_mode);

    if compatible {
        return Ok(Decision::Published);
    }

    if force {
        return Ok(Decision::ForcePublished {
            warning: format!(
                "forced past {} breaking change(s) under {:?} compatibility",
                breaking.len(),
                current.compatibility_mode
            ),
        });
    }

    Ok(Decision::ProposalCreated {
        breaking_changes: breaking,
    })
}

/// Guarantees update is only legal against an active contract (spec §4.2).
pub fn require_active_for_guarantee_update(
    status: crate::domain::ContractStatus,
) -> Result<()> {
    use crate::domain::ContractStatus::*;
    match status {
        Active => Ok(()),
        Deprecated | Withdrawn => Err(DomainError::bad_request(
            "guarantees can only be updated on an active contract",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_v1() -> Value {
        json!({"type": "object", "properties": {"id": {"type": "integer"}, "total": {"type": "number"}}, "required": ["id"]})
    }

    #[test]
    fn first_contract_always_publishes() {
        let decision = decide_publish(None, "1.0.0", &schema_v1(), false).unwrap();
        assert!(matches!(decision, Decision::Published));
    }

    #[test]
    fn compatible_minor_publishes() {
        let mut new_schema = schema_v1();
        new_schema["properties"]["created_at"] = json!({"type": "string"});
        let current = CurrentContract {
            version: "1.0.0",
            schema: &schema_v1(),
            compatibility_mode: CompatibilityMode::Backward,
        };
        let decision = decide_publish(Some(current), "1.1.0", &new_schema, false).unwrap();
        assert!(matches!(decision, Decision::Published));
    }

    #[test]
    fn breaking_change_creates_proposal() {
        let mut new_schema = schema_v1();
        new_schema["properties"].as_object_mut().unwrap().remove("total");
        let current = CurrentContract {
            version: "1.1.0",
            schema: &schema_v1(),
            compatibility_mode: CompatibilityMode::Backward,
        };
        let decision = decide_publish(Some(current), "2.0.0", &new_schema, false).unwrap();
        match decision {
            Decision::ProposalCreated { breaking_changes } => {
                assert_eq!(breaking_changes.len(), 1);
            }
            _ => panic!("expected proposal_created"),
        }
    }

    #[test]
    fn breaking_change_with_force_force_publishes() {
        let mut new_schema = schema_v1();
        new_schema["properties"].as_object_mut().unwrap().remove("total");
        let current = CurrentContract {
            version: "1.1.0",
            schema: &schema_v1(),
            compatibility_mode: CompatibilityMode::Backward,
        };
        let decision = decide_publish(Some(current), "2.0.0", &new_schema, true).unwrap();
        assert!(matches!(decision, Decision::ForcePublished { .. }));
    }

    #[test]
    fn non_greater_version_is_rejected() {
        let current = CurrentContract {
            version: "1.1.0",
            schema: &schema_v1(),
            compatibility_mode: CompatibilityMode::Backward,
        };
        let err = decide_publish(Some(current), "1.0.0", &schema_v1(), false).unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }
}
