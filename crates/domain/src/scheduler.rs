//! Scheduler intent data model (spec §3.10).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuityMode {
    Inherit,
    Fresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Active,
    Cancelled,
    Converged,
    Error,
}

/// Catch-up policy for fires missed while the runtime was offline.
/// Supplemented feature, grounded on the teacher's `MissedPolicy`
/// (`crates/gateway/src/runtime/schedules/model.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedPolicy {
    Skip,
    RunOnce,
    CatchUp,
}

impl Default for MissedPolicy {
    fn default() -> Self {
        MissedPolicy::RunOnce
    }
}

/// Closed algebra of convergence predicates (spec §3.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConvergenceCondition {
    TruthResolved { fact_id: String },
    TaskPhase { phase: String },
    MaxRuns { limit: u32 },
    AllOf { predicates: Vec<ConvergenceCondition> },
    AnyOf { predicates: Vec<ConvergenceCondition> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerIntent {
    pub intent_id: String,
    pub parent_session_id: String,
    pub reason: String,
    pub continuity_mode: ContinuityMode,
    pub max_runs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_condition: Option<ConvergenceCondition>,
    #[serde(default)]
    pub missed_policy: MissedPolicy,
    pub status: IntentStatus,
    pub run_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<i64>,
    pub updated_at: i64,
    pub event_offset: u64,
    /// Consecutive run/convergence-check failures, driving exponential
    /// backoff cooldown (teacher's `cooldown_minutes`).
    #[serde(default)]
    pub consecutive_failures: u32,
    /// Upper bound on how many missed cron windows `MissedPolicy::CatchUp`
    /// will fire in one reconciliation (teacher's `max_catchup_runs`).
    #[serde(default = "default_max_catchup_runs")]
    pub max_catchup_runs: usize,
    /// Set by a failed run; due-intent evaluation holds the intent back
    /// until this instant (teacher's `Schedule::cooldown_until`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<i64>,
}

fn default_max_catchup_runs() -> usize {
    5
}
