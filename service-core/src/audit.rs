//! Append-only audit trail entries shared by the payment and invoice flows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::ActorContext;

/// One state transition. Entries are created once and never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub actor: String,
    pub actor_id: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

impl AuditEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        action: impl Into<String>,
        actor: &ActorContext,
        details: impl Into<String>,
        level: Option<u32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            action: action.into(),
            actor: actor.label().to_string(),
            actor_id: actor.user_id.clone(),
            details: details.into(),
            level,
        }
    }
}

/// Append-only log. Only `push` and read access are exposed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditTrail(Vec<AuditEntry>);

impl AuditTrail {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, entry: AuditEntry) {
        self.0.push(entry);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.0.last()
    }
}
