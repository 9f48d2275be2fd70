//! Multi-level approval workflow attached to incoming invoices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApproverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApproverStatus::Pending => "pending",
            ApproverStatus::Approved => "approved",
            ApproverStatus::Rejected => "rejected",
        }
    }
}

/// Who signs off a level. Without an `approver_id` any actor may decide it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverAssignment {
    pub approver_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    /// 1-based.
    pub level: u32,
    pub approver_id: Option<String>,
    pub name: String,
    pub status: ApproverStatus,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub comments: Option<String>,
}

impl Approver {
    pub fn is_decided(&self) -> bool {
        self.status != ApproverStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    pub current_level: u32,
    pub max_levels: u32,
    pub approvers: Vec<Approver>,
}

impl ApprovalWorkflow {
    /// Levels are numbered in the order the assignments are given.
    pub fn new(assignments: Vec<ApproverAssignment>) -> Self {
        let approvers: Vec<Approver> = assignments
            .into_iter()
            .zip(1u32..)
            .map(|(a, level)| Approver {
                level,
                approver_id: a.approver_id,
                name: a.name,
                status: ApproverStatus::Pending,
                decided_at: None,
                decided_by: None,
                comments: None,
            })
            .collect();

        Self {
            current_level: 1,
            max_levels: approvers.len() as u32,
            approvers,
        }
    }

    pub fn approver(&self, level: u32) -> Option<&Approver> {
        level
            .checked_sub(1)
            .and_then(|i| self.approvers.get(i as usize))
    }

    pub(crate) fn approver_mut(&mut self, level: u32) -> Option<&mut Approver> {
        level
            .checked_sub(1)
            .and_then(|i| self.approvers.get_mut(i as usize))
    }

    pub fn is_last_level(&self) -> bool {
        self.current_level >= self.max_levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(name: &str) -> ApproverAssignment {
        ApproverAssignment {
            approver_id: None,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_levels_follow_assignment_order() {
        let wf = ApprovalWorkflow::new(vec![assignment("Lead"), assignment("CFO")]);
        assert_eq!(wf.current_level, 1);
        assert_eq!(wf.max_levels, 2);
        assert_eq!(wf.approver(2).map(|a| a.name.as_str()), Some("CFO"));
        assert!(wf.approver(0).is_none());
        assert!(wf.approver(3).is_none());
        assert!(!wf.is_last_level());
    }
}
