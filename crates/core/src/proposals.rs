//! Proposal state machine (spec §4.3).
//!
//! These are pure decision functions over snapshots the repository layer
//! reads within one transaction; `tessera-db::repo::proposals` is what
//! actually loads `R` and `A` and drives the row updates.

use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::{AckResponse, ProposalStatus};
use crate::error::{DomainError, Result};

/// Outcome of applying the auto-approval rule after an acknowledgment insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoApprovalOutcome {
    /// `R` not yet fully covered by `A`, or `R` is empty — stays pending.
    StillPending,
    /// Every consumer in `R` acknowledged and none blocked.
    Approved,
    /// At least one acknowledgment in `A` is `blocked`.
    Rejected,
}

/// Derive the next state per spec §4.3's auto-approval rule.
///
/// `registered_consumers` = `R`: consumer-team ids with an active
/// Registration against the asset's currently active contract.
/// `acknowledgments` = `A`: (consumer_team, response) pairs recorded against
/// this proposal (including acks from teams outside `R`, which do not
/// influence the outcome but are accepted).
pub fn derive_auto_approval(
    registered_consumers: &HashSet<Uuid>,
    acknowledgments: &[(Uuid, AckResponse)],
) -> AutoApprovalOutcome {
    if acknowledgments
        .iter()
        .any(|(_, resp)| *resp == AckResponse::Blocked)
    {
        return AutoApprovalOutcome::Rejected;
    }

    if registered_consumers.is_empty() {
        // Edge case: no known consumers, stays pending until the producer
        // forces/withdraws/expires it.
        return AutoApprovalOutcome::StillPending;
    }

    let acked: HashSet<Uuid> = acknowledgments.iter().map(|(team, _)| *team).collect();
    if registered_consumers.is_subset(&acked) {
        AutoApprovalOutcome::Approved
    } else {
        AutoApprovalOutcome::StillPending
    }
}

/// Guard: is a status transition or acknowledgment allowed from `status`?
/// Invariant P1 — `pending` is the only mutable state.
pub fn require_mutable(status: ProposalStatus) -> Result<()> {
    if status.is_terminal() {
        return Err(DomainError::bad_request(format!(
            "proposal is already {status:?} and cannot be modified"
        )));
    }
    Ok(())
}

/// Producer-explicit withdraw: only valid from `pending`.
pub fn withdraw(status: ProposalStatus) -> Result<ProposalStatus> {
    require_mutable(status)?;
    Ok(ProposalStatus::Withdrawn)
}

/// Producer-explicit expire: only valid from `pending`.
pub fn expire(status: ProposalStatus) -> Result<ProposalStatus> {
    require_mutable(status)?;
    Ok(ProposalStatus::Expired)
}

/// Force-approve: producer force + admin/ownership authorization is checked
/// by the caller; this only enforces the state-machine precondition.
pub fn force_approve(status: ProposalStatus) -> Result<ProposalStatus> {
    require_mutable(status)?;
    Ok(ProposalStatus::Approved)
}

/// Auto-expiration check: only applies when `auto_expire` is set and
/// `expires_at` has passed.
pub fn should_auto_expire(
    status: ProposalStatus,
    auto_expire: bool,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
    now: chrono::DateTime<chrono::Utc>,
) -> bool {
    status == ProposalStatus::Pending
        && auto_expire
        && expires_at.map(|exp| now >= exp).unwrap_or(false)
}

/// Precondition for `publish_from`: proposal must be `approved`.
pub fn require_approved(status: ProposalStatus) -> Result<()> {
    if status != ProposalStatus::Approved {
        return Err(DomainError::bad_request(
            "proposal must be approved before it can be published",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(n: u8) -> Uuid {
        Uuid::from_u128(n as u128)
    }

    #[test]
    fn empty_registered_set_stays_pending_regardless_of_acks() {
        let registered = HashSet::new();
        let acks = vec![(team(1), AckResponse::Approved)];
        assert_eq!(
            derive_auto_approval(&registered, &acks),
            AutoApprovalOutcome::StillPending
        );
    }

    #[test]
    fn approves_once_all_registered_consumers_acked_approved() {
        let registered: HashSet<Uuid> = [team(1), team(2)].into_iter().collect();
        let acks = vec![(team(1), AckResponse::Approved)];
        assert_eq!(
            derive_auto_approval(&registered, &acks),
            AutoApprovalOutcome::StillPending
        );

        let acks = vec![
            (team(1), AckResponse::Approved),
            (team(2), AckResponse::Approved),
        ];
        assert_eq!(
            derive_auto_approval(&registered, &acks),
            AutoApprovalOutcome::Approved
        );
    }

    #[test]
    fn any_blocked_ack_rejects_immediately() {
        let registered: HashSet<Uuid> = [team(1), team(2)].into_iter().collect();
        let acks = vec![
            (team(1), AckResponse::Approved),
            (team(2), AckResponse::Blocked),
        ];
        assert_eq!(
            derive_auto_approval(&registered, &acks),
            AutoApprovalOutcome::Rejected
        );
    }

    #[test]
    fn acks_outside_registered_set_do_not_influence_outcome() {
        let registered: HashSet<Uuid> = [team(1)].into_iter().collect();
        let acks = vec![(team(99), AckResponse::Approved)];
        assert_eq!(
            derive_auto_approval(&registered, &acks),
            AutoApprovalOutcome::StillPending
        );
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        assert!(require_mutable(ProposalStatus::Pending).is_ok());
        assert!(require_mutable(ProposalStatus::Approved).is_err());
        assert!(withdraw(ProposalStatus::Rejected).is_err());
    }

    #[test]
    fn publish_from_requires_approved() {
        assert!(require_approved(ProposalStatus::Approved).is_ok());
        assert!(require_approved(ProposalStatus::Pending).is_err());
    }
}
