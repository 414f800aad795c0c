//! Truth ledger data model (spec §3.3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruthStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruthFact {
    pub id: String,
    pub kind: String,
    pub status: TruthStatus,
    pub severity: Severity,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default)]
    pub evidence_ids: Vec<String>,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TruthState {
    #[serde(default)]
    pub facts: Vec<TruthFact>,
}

impl TruthState {
    pub fn index(&self, id: &str) -> Option<usize> {
        self.facts.iter().position(|f| f.id == id)
    }

    /// Active facts informing `TaskState.status.truthFactIds`: top 6 by
    /// severity desc, then `lastSeenAt` desc (spec §4.C).
    pub fn top_active_ids(&self, limit: usize) -> Vec<String> {
        let mut active: Vec<&TruthFact> = self
            .facts
            .iter()
            .filter(|f| f.status == TruthStatus::Active)
            .collect();
        active.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.last_seen_at.cmp(&a.last_seen_at))
        });
        active.into_iter().take(limit).map(|f| f.id.clone()).collect()
    }
}
