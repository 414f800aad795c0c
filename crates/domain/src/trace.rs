use serde::Serialize;

/// Structured trace events emitted across the runtime core. Mirrors the
/// teacher's `TraceEvent` (`tag = "event"`, serialized to JSON and emitted
/// through `tracing::info!`) but carries the event catalog this spec names
/// instead of the teacher's LLM-routing/context-bootstrap events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ContextInjected {
        session_id: String,
        estimated_tokens: u32,
        entries: usize,
        truncated: bool,
    },
    ContextInjectionDropped {
        session_id: String,
        reason: String,
    },
    ArenaSloEnforced {
        session_id: String,
        dropped: bool,
        evicted_key: Option<String>,
    },
    CompactionBreakerOpened {
        session_id: String,
        cooldown_turns: u32,
    },
    CompactionBreakerClosed {
        session_id: String,
    },
    SkillRoutingFollowed {
        session_id: String,
        skill: String,
    },
    SkillRoutingOverridden {
        session_id: String,
        skill: String,
    },
    SkillRoutingIgnored {
        session_id: String,
        recommended: String,
    },
    SkillDispatchGateBlockedTool {
        session_id: String,
        tool: String,
        reason: String,
    },
    CostBudgetBlockedTool {
        session_id: String,
        tool: String,
        reason: String,
    },
    TaskLedgerCompacted {
        session_id: String,
        bytes_before: u64,
        bytes_after: u64,
        compacted: usize,
        kept: usize,
        duration_ms: u64,
    },
    IntentFired {
        intent_id: String,
        run_count: u32,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sa_event");
    }
}
