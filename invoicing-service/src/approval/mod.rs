//! Invoice lifecycle state machine.
//!
//! Incoming invoices: Draft -> PendingApproval -> Approved | Rejected, with
//! one sequential sign-off per level. Outgoing invoices: Draft -> Submitted
//! -> Verified -> Sent.
//!
//! Every operation takes `&Invoice` and returns the next invoice, so a
//! failed precondition leaves the caller's value untouched. Each successful
//! transition appends exactly one audit entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::audit::AuditEntry;
use service_core::middleware::ActorContext;
use thiserror::Error;

use crate::models::{
    ApprovalWorkflow, ApproverAssignment, ApproverStatus, Invoice, InvoiceDirection,
    InvoiceStatus,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error("cannot {action} invoice {number}: {reason}")]
    InvalidTransition {
        number: String,
        action: &'static str,
        reason: String,
    },

    #[error("level {level} of invoice {number} is assigned to another approver")]
    NotAssignedApprover { number: String, level: u32 },

    #[error("invoice {number} needs at least one approver")]
    NoApprovers { number: String },
}

/// A requested state change, applied atomically by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InvoiceCommand {
    SubmitForApproval { approvers: Vec<ApproverAssignment> },
    Approve { level: u32, comments: Option<String> },
    Reject { level: u32, comments: Option<String> },
    Submit,
    Verify,
    Send,
}

impl InvoiceCommand {
    pub fn name(&self) -> &'static str {
        match self {
            InvoiceCommand::SubmitForApproval { .. } => "submit_for_approval",
            InvoiceCommand::Approve { .. } => "approve",
            InvoiceCommand::Reject { .. } => "reject",
            InvoiceCommand::Submit => "submit",
            InvoiceCommand::Verify => "verify",
            InvoiceCommand::Send => "send",
        }
    }
}

#[derive(Clone, Copy)]
enum Decision {
    Approve,
    Reject,
}

impl Decision {
    fn action(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl Invoice {
    fn invalid(&self, action: &'static str, reason: impl Into<String>) -> ApprovalError {
        ApprovalError::InvalidTransition {
            number: self.number.clone(),
            action,
            reason: reason.into(),
        }
    }

    fn require(
        &self,
        action: &'static str,
        direction: InvoiceDirection,
        status: InvoiceStatus,
    ) -> Result<(), ApprovalError> {
        if self.direction != direction {
            return Err(self.invalid(
                action,
                format!("only {} invoices can do this", direction.as_str()),
            ));
        }
        if self.status != status {
            return Err(self.invalid(
                action,
                format!("status is {}, expected {}", self.status, status),
            ));
        }
        Ok(())
    }

    fn advanced(
        &self,
        to: InvoiceStatus,
        action: &str,
        details: String,
        level: Option<u32>,
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Invoice {
        let mut next = self.clone();
        next.status = to;
        next.updated_at = now;
        next.audit_trail
            .push(AuditEntry::new(now, action, actor, details, level));
        next
    }

    pub fn apply(
        &self,
        command: InvoiceCommand,
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Result<Invoice, ApprovalError> {
        match command {
            InvoiceCommand::SubmitForApproval { approvers } => {
                self.submit_for_approval(approvers, now, actor)
            }
            InvoiceCommand::Approve { level, comments } => {
                self.approve(level, comments, now, actor)
            }
            InvoiceCommand::Reject { level, comments } => self.reject(level, comments, now, actor),
            InvoiceCommand::Submit => self.submit(now, actor),
            InvoiceCommand::Verify => self.verify(now, actor),
            InvoiceCommand::Send => self.send(now, actor),
        }
    }

    /// Open the approval workflow with one level per approver, in order.
    pub fn submit_for_approval(
        &self,
        approvers: Vec<ApproverAssignment>,
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Result<Invoice, ApprovalError> {
        self.require(
            "submit for approval",
            InvoiceDirection::Incoming,
            InvoiceStatus::Draft,
        )?;
        if approvers.is_empty() {
            return Err(ApprovalError::NoApprovers {
                number: self.number.clone(),
            });
        }

        let workflow = ApprovalWorkflow::new(approvers);
        let details = format!("{} approval levels", workflow.max_levels);
        let mut next = self.advanced(
            InvoiceStatus::PendingApproval,
            "submitted_for_approval",
            details,
            None,
            now,
            actor,
        );
        next.approval_workflow = Some(workflow);
        Ok(next)
    }

    pub fn approve(
        &self,
        level: u32,
        comments: Option<String>,
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Result<Invoice, ApprovalError> {
        self.decide(Decision::Approve, level, comments, now, actor)
    }

    /// Rejection at any level ends the workflow; later levels stay pending.
    pub fn reject(
        &self,
        level: u32,
        comments: Option<String>,
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Result<Invoice, ApprovalError> {
        self.decide(Decision::Reject, level, comments, now, actor)
    }

    fn decide(
        &self,
        decision: Decision,
        level: u32,
        comments: Option<String>,
        now: DateTime<Utc>,
        actor: &ActorContext,
    ) -> Result<Invoice, ApprovalError> {
        let action = decision.action();
        self.require(action, InvoiceDirection::Incoming, InvoiceStatus::PendingApproval)?;
        let workflow = self
            .approval_workflow
            .as_ref()
            .ok_or_else(|| self.invalid(action, "no approval workflow"))?;

        if level != workflow.current_level {
            return Err(self.invalid(
                action,
                format!(
                    "level {} is not the current level {}",
                    level, workflow.current_level
                ),
            ));
        }
        let approver = workflow
            .approver(level)
            .ok_or_else(|| self.invalid(action, format!("level {level} does not exist")))?;
        if approver.is_decided() {
            return Err(self.invalid(
                action,
                format!("level {} is already {}", level, approver.status.as_str()),
            ));
        }
        if let Some(assigned) = approver.approver_id.as_deref() {
            if assigned != actor.user_id {
                return Err(ApprovalError::NotAssignedApprover {
                    number: self.number.clone(),
                    level,
                });
            }
        }

        let mut workflow = workflow.clone();
        let last = workflow.is_last_level();
        let max_levels = workflow.max_levels;
        let (approver_status, to, audit_action) = match decision {
            Decision::Approve if last => (
                ApproverStatus::Approved,
                InvoiceStatus::Approved,
                "approved",
            ),
            Decision::Approve => (
                ApproverStatus::Approved,
                InvoiceStatus::PendingApproval,
                "level_approved",
            ),
            Decision::Reject => (
                ApproverStatus::Rejected,
                InvoiceStatus::Rejected,
                "rejected",
            ),
        };

        if let Some(approver) = workflow.approver_mut(level) {
            approver.status = approver_status;
            approver.decided_at = Some(now);
            approver.decided_by = Some(actor.label().to_string());
            approver.comments = comments.clone();
        }
        if matches!(decision, Decision::Approve) && !last {
            workflow.current_level += 1;
        }

        let mut details = format!(
            "level {} of {} {}",
            level,
            max_levels,
            approver_status.as_str()
        );
        if let Some(c) = comments.as_deref().filter(|c| !c.trim().is_empty()) {
            details.push_str(": ");
            details.push_str(c.trim());
        }

        let mut next = self.advanced(to, audit_action, details, Some(level), now, actor);
        next.approval_workflow = Some(workflow);
        Ok(next)
    }

    pub fn submit(&self, now: DateTime<Utc>, actor: &ActorContext) -> Result<Invoice, ApprovalError> {
        self.require("submit", InvoiceDirection::Outgoing, InvoiceStatus::Draft)?;
        Ok(self.advanced(
            InvoiceStatus::Submitted,
            "submitted",
            format!("invoice {} submitted", self.number),
            None,
            now,
            actor,
        ))
    }

    pub fn verify(&self, now: DateTime<Utc>, actor: &ActorContext) -> Result<Invoice, ApprovalError> {
        self.require("verify", InvoiceDirection::Outgoing, InvoiceStatus::Submitted)?;
        Ok(self.advanced(
            InvoiceStatus::Verified,
            "verified",
            format!("invoice {} verified", self.number),
            None,
            now,
            actor,
        ))
    }

    pub fn send(&self, now: DateTime<Utc>, actor: &ActorContext) -> Result<Invoice, ApprovalError> {
        self.require("send", InvoiceDirection::Outgoing, InvoiceStatus::Verified)?;
        Ok(self.advanced(
            InvoiceStatus::Sent,
            "sent",
            format!("invoice {} sent to {}", self.number, self.counterparty),
            None,
            now,
            actor,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewInvoice;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn actor(id: &str) -> ActorContext {
        ActorContext::new(id, None)
    }

    fn invoice(direction: InvoiceDirection) -> Invoice {
        Invoice::new(
            NewInvoice {
                number: "FV-2025-001".into(),
                counterparty: "Suministros SL".into(),
                amount: dec!(1250.00),
                currency: "EUR".into(),
                direction,
                due_date: None,
                description: None,
            },
            now(),
            &actor("clerk"),
        )
    }

    fn levels(n: usize) -> Vec<ApproverAssignment> {
        (1..=n)
            .map(|i| ApproverAssignment {
                approver_id: None,
                name: format!("Approver {i}"),
            })
            .collect()
    }

    fn pending(n: usize) -> Invoice {
        invoice(InvoiceDirection::Incoming)
            .submit_for_approval(levels(n), now(), &actor("clerk"))
            .unwrap()
    }

    #[test]
    fn test_submit_for_approval_opens_workflow() {
        let inv = pending(3);
        assert_eq!(inv.status, InvoiceStatus::PendingApproval);
        let wf = inv.approval_workflow.as_ref().unwrap();
        assert_eq!(wf.current_level, 1);
        assert_eq!(wf.max_levels, 3);
        assert_eq!(inv.audit_trail.len(), 2);
    }

    #[test]
    fn test_submit_without_approvers_fails() {
        let draft = invoice(InvoiceDirection::Incoming);
        let err = draft
            .submit_for_approval(vec![], now(), &actor("clerk"))
            .unwrap_err();
        assert!(matches!(err, ApprovalError::NoApprovers { .. }));
        assert_eq!(draft.status, InvoiceStatus::Draft);
    }

    #[test]
    fn test_n_approvals_in_order_approve_invoice() {
        let mut inv = pending(3);
        for level in 1..=3 {
            assert_eq!(inv.status, InvoiceStatus::PendingApproval);
            let before = inv.audit_trail.len();
            inv = inv.approve(level, None, now(), &actor("boss")).unwrap();
            assert_eq!(inv.audit_trail.len(), before + 1);
            assert_eq!(inv.audit_trail.last().unwrap().level, Some(level));
        }
        assert_eq!(inv.status, InvoiceStatus::Approved);
        let wf = inv.approval_workflow.unwrap();
        assert_eq!(wf.current_level, 3);
        assert!(wf
            .approvers
            .iter()
            .all(|a| a.status == ApproverStatus::Approved));
    }

    #[test]
    fn test_reject_short_circuits_later_levels() {
        let inv = pending(3)
            .approve(1, None, now(), &actor("lead"))
            .unwrap()
            .reject(2, Some("duplicate invoice".into()), now(), &actor("cfo"))
            .unwrap();

        assert_eq!(inv.status, InvoiceStatus::Rejected);
        let wf = inv.approval_workflow.as_ref().unwrap();
        assert_eq!(wf.approver(1).unwrap().status, ApproverStatus::Approved);
        assert_eq!(wf.approver(2).unwrap().status, ApproverStatus::Rejected);
        assert_eq!(wf.approver(3).unwrap().status, ApproverStatus::Pending);

        let entry = inv.audit_trail.last().unwrap();
        assert_eq!(entry.action, "rejected");
        assert_eq!(entry.details, "level 2 of 3 rejected: duplicate invoice");
    }

    #[test]
    fn test_wrong_level_is_rejected_without_change() {
        let inv = pending(2);
        let snapshot = inv.clone();
        for level in [0, 2, 3] {
            let err = inv.approve(level, None, now(), &actor("x")).unwrap_err();
            assert!(matches!(err, ApprovalError::InvalidTransition { .. }));
            let err = inv.reject(level, None, now(), &actor("x")).unwrap_err();
            assert!(matches!(err, ApprovalError::InvalidTransition { .. }));
        }
        assert_eq!(inv, snapshot);
        assert_eq!(inv.audit_trail.len(), 2);
    }

    #[test]
    fn test_decided_invoice_accepts_no_more_decisions() {
        let approved = pending(1).approve(1, None, now(), &actor("x")).unwrap();
        let err = approved.approve(1, None, now(), &actor("x")).unwrap_err();
        assert!(matches!(err, ApprovalError::InvalidTransition { .. }));

        let rejected = pending(2).reject(1, None, now(), &actor("x")).unwrap();
        let err = rejected.approve(2, None, now(), &actor("x")).unwrap_err();
        assert!(matches!(err, ApprovalError::InvalidTransition { .. }));
    }

    #[test]
    fn test_assigned_approver_must_match_actor() {
        let inv = invoice(InvoiceDirection::Incoming)
            .submit_for_approval(
                vec![ApproverAssignment {
                    approver_id: Some("u-cfo".into()),
                    name: "CFO".into(),
                }],
                now(),
                &actor("clerk"),
            )
            .unwrap();

        let err = inv.approve(1, None, now(), &actor("u-intern")).unwrap_err();
        assert!(matches!(err, ApprovalError::NotAssignedApprover { level: 1, .. }));

        let approved = inv
            .approve(1, Some("ok".into()), now(), &ActorContext::new("u-cfo", Some("Eva".into())))
            .unwrap();
        let approver = approved.approval_workflow.unwrap().approvers[0].clone();
        assert_eq!(approver.decided_by.as_deref(), Some("Eva"));
        assert_eq!(approver.comments.as_deref(), Some("ok"));
        assert_eq!(approver.decided_at, Some(now()));
    }

    #[test]
    fn test_outgoing_track() {
        let inv = invoice(InvoiceDirection::Outgoing);
        let inv = inv.submit(now(), &actor("a")).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Submitted);
        let err = inv.send(now(), &actor("a")).unwrap_err();
        assert!(matches!(err, ApprovalError::InvalidTransition { .. }));

        let inv = inv
            .verify(now(), &actor("a"))
            .unwrap()
            .send(now(), &actor("a"))
            .unwrap();
        assert_eq!(inv.status, InvoiceStatus::Sent);
        let actions: Vec<&str> = inv
            .audit_trail
            .entries()
            .iter()
            .map(|e| e.action.as_str())
            .collect();
        assert_eq!(actions, vec!["invoice_created", "submitted", "verified", "sent"]);
    }

    #[test]
    fn test_tracks_do_not_mix() {
        let incoming = invoice(InvoiceDirection::Incoming);
        assert!(incoming.submit(now(), &actor("a")).is_err());

        let outgoing = invoice(InvoiceDirection::Outgoing);
        assert!(outgoing
            .submit_for_approval(levels(1), now(), &actor("a"))
            .is_err());
    }

    #[test]
    fn test_apply_dispatches_commands() {
        let inv = invoice(InvoiceDirection::Incoming)
            .apply(
                InvoiceCommand::SubmitForApproval { approvers: levels(1) },
                now(),
                &actor("a"),
            )
            .unwrap()
            .apply(
                InvoiceCommand::Approve {
                    level: 1,
                    comments: None,
                },
                now(),
                &actor("b"),
            )
            .unwrap();
        assert_eq!(inv.status, InvoiceStatus::Approved);
        assert_eq!(inv.audit_trail.last().unwrap().action, "approved");
    }
}
