//! Event tape record (spec §3.1, §6).
//!
//! `payload` is a tagged variant keyed by `schema`/`kind`. Coercion from
//! untyped on-disk JSON is kept as a separate, fallible function (`decode`)
//! so a malformed line can be skipped rather than aborting the fold —
//! see spec §7 `tape_corrupt_line`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of the append-only per-session tape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u64>,
    pub payload: Value,
}

impl EventRecord {
    pub fn new(
        id: impl Into<String>,
        session_id: impl Into<String>,
        event_type: impl Into<String>,
        timestamp: i64,
        turn: Option<u64>,
        payload: Value,
    ) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            event_type: event_type.into(),
            timestamp,
            turn,
            payload,
        }
    }

    /// Decode `payload` into a typed variant. Returns `None` on shape
    /// mismatch rather than erroring — callers skip the line and emit a
    /// one-time warning (spec §7).
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// Well-known event type strings used across the tape. Kept as constants
/// rather than an enum because the tape's `type` field is open — external
/// collaborators (scheduler, cost tracker, skill router) all append their
/// own event types through the same store.
pub mod kinds {
    pub const CHECKPOINT: &str = "tape.checkpoint.v1";
    pub const ANCHOR: &str = "tape.anchor.v1";

    pub const TASK_SPEC_SET: &str = "task.spec_set";
    pub const TASK_CHECKPOINT_SET: &str = "task.checkpoint_set";
    pub const TASK_ITEM_ADDED: &str = "task.item_added";
    pub const TASK_ITEM_UPDATED: &str = "task.item_updated";
    pub const TASK_BLOCKER_RECORDED: &str = "task.blocker_recorded";
    pub const TASK_BLOCKER_RESOLVED: &str = "task.blocker_resolved";
    pub const TASK_STATUS_UPDATED: &str = "task.status_updated";
    pub const TASK_LEDGER_COMPACTED: &str = "task_ledger_compacted";

    pub const TRUTH_FACT_UPSERTED: &str = "truth.fact_upserted";
    pub const TRUTH_FACT_RESOLVED: &str = "truth.fact_resolved";

    pub const TOOL_RESULT: &str = "tool.result";

    pub const COST_USAGE_RECORDED: &str = "cost.usage_recorded";
    pub const MEMORY_RECALL_RECORDED: &str = "memory.recall_recorded";

    pub const CONTEXT_INJECTED: &str = "context_injected";
    pub const CONTEXT_INJECTION_DROPPED: &str = "context_injection_dropped";

    pub const COMPACTION_BREAKER_OPENED: &str = "context_compaction_breaker_opened";
    pub const COMPACTION_BREAKER_CLOSED: &str = "context_compaction_breaker_closed";
    pub const COMPACTION_GATE_BLOCKED_TOOL: &str = "context_compaction_gate_blocked_tool";

    pub const SKILL_ROUTING_OVERRIDDEN: &str = "skill_routing_overridden";
    pub const SKILL_ROUTING_FOLLOWED: &str = "skill_routing_followed";
    pub const SKILL_ROUTING_IGNORED: &str = "skill_routing_ignored";
    pub const SKILL_DISPATCH_GATE_WARNING: &str = "skill_dispatch_gate_warning";
    pub const SKILL_DISPATCH_GATE_BLOCKED_TOOL: &str = "skill_dispatch_gate_blocked_tool";

    pub const COST_BUDGET_BLOCKED_TOOL: &str = "cost_budget_blocked_tool";
    pub const COST_BUDGET_ALERT: &str = "cost_budget_alert";

    pub const INTENT_CREATED: &str = "intent_created";
    pub const INTENT_UPDATED: &str = "intent_updated";
    pub const INTENT_CANCELLED: &str = "intent_cancelled";
    pub const INTENT_FIRED: &str = "intent_fired";
    pub const INTENT_CONVERGED: &str = "intent_converged";
}
