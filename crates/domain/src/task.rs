//! Task ledger data model (spec §3.2).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Todo,
    Doing,
    Done,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Align,
    Investigate,
    Execute,
    Verify,
    Blocked,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskHealth {
    Ok,
    NeedsSpec,
    Blocked,
    VerificationFailed,
    BudgetPressure,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskTargets {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default = "schema_v1")]
    pub schema: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<TaskTargets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_behavior: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<TaskVerificationSpec>,
}

fn schema_v1() -> String {
    "task.v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskVerificationSpec {
    pub level: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub text: String,
    pub status: ItemStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blocker {
    pub id: String,
    pub message: String,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth_fact_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusBlock {
    pub phase: TaskPhase,
    pub health: TaskHealth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub truth_fact_ids: Vec<String>,
}

impl PartialEq for TaskStatusBlock {
    /// Status updates are idempotent on `(phase, health, reason, sorted
    /// truthFactIds)` — `updated_at` is deliberately excluded (spec §4.P).
    fn eq(&self, other: &Self) -> bool {
        let mut a = self.truth_fact_ids.clone();
        let mut b = other.truth_fact_ids.clone();
        a.sort();
        b.sort();
        self.phase == other.phase && self.health == other.health && self.reason == other.reason && a == b
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<TaskSpec>,
    #[serde(default)]
    pub items: Vec<TaskItem>,
    #[serde(default)]
    pub blockers: Vec<Blocker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatusBlock>,
}

impl TaskState {
    pub fn item_index(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    pub fn blocker_index(&self, id: &str) -> Option<usize> {
        self.blockers.iter().position(|b| b.id == id)
    }

    pub fn item_ids(&self) -> HashMap<&str, usize> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.as_str(), i))
            .collect()
    }
}
