//! Turn-Replay Engine (spec §4.D, component D).
//!
//! Rebuilds `TaskState`/`TruthState`/`CostSummary`/`EvidenceState`/
//! `MemoryState` from the latest `tape.checkpoint.v1` event plus its
//! forward tail, caches the result per session, and folds subsequent
//! events incrementally via `observe_event` rather than rescanning the
//! whole tape every turn.

use std::collections::HashMap;

use parking_lot::RwLock;
use sa_cost::{record_assistant_usage, SkillBudget, UsageDelta};
use sa_domain::checkpoint::CheckpointPayload;
use sa_domain::config::CostTrackingConfig;
use sa_domain::cost::CostSummary;
use sa_domain::event::{kinds, EventRecord};
use sa_domain::evidence::EvidenceState;
use sa_domain::memory::{MemoryState, RecallSource};
use sa_domain::task::TaskState;
use sa_domain::truth::TruthState;
use serde::Deserialize;

use crate::failure;
use crate::task as task_reducer;
use crate::truth as truth_reducer;

/// Everything the Turn-Replay Engine exposes for a session at a point in
/// the tape (spec §4.D).
#[derive(Debug, Clone, Default)]
pub struct TurnReplayView {
    pub turn: u64,
    pub latest_event_id: Option<String>,
    pub checkpoint_event_id: Option<String>,
    pub task_state: TaskState,
    pub truth_state: TruthState,
    pub cost_state: CostSummary,
    pub evidence_state: EvidenceState,
    pub memory_state: MemoryState,
}

#[derive(Debug, Deserialize)]
struct CostUsagePayload {
    model: String,
    #[serde(default)]
    skill: Option<String>,
    #[serde(default)]
    skill_max_tokens: Option<u64>,
    turn: u64,
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_read_tokens: u64,
    #[serde(default)]
    cache_write_tokens: u64,
    #[serde(default)]
    cost_usd: f64,
}

#[derive(Debug, Deserialize)]
struct MemoryRecallPayload {
    query: String,
    source: RecallSource,
    #[serde(default)]
    hits: Vec<sa_domain::ports::MemoryHit>,
}

/// Fold one event into the four mutable slices (task/truth/cost/evidence
/// cascade together through `tool.result`; memory and cost have their own
/// event kinds). `checkpoint_event_id`/`latest_event_id`/`turn` bookkeeping
/// is the caller's responsibility (`build`/`observe_event` below), so this
/// stays a pure, total dispatch over one record.
fn fold_one(view: &mut TurnReplayView, record: &EventRecord, cost_config: &CostTrackingConfig) {
    match record.event_type.as_str() {
        kinds::ANCHOR => {
            view.evidence_state.bump_anchor();
        }
        kinds::TOOL_RESULT => {
            failure::reduce_tool_result(
                &mut view.task_state,
                &mut view.truth_state,
                &mut view.evidence_state,
                record.timestamp,
                &record.payload,
            );
        }
        kinds::COST_USAGE_RECORDED => {
            if let Some(p) = record.decode::<CostUsagePayload>() {
                let skill_budget = p.skill.as_ref().map(|s| SkillBudget {
                    skill: s.clone(),
                    max_tokens: p.skill_max_tokens,
                });
                record_assistant_usage(
                    &mut view.cost_state,
                    cost_config,
                    &p.model,
                    skill_budget.as_ref(),
                    p.turn,
                    record.timestamp,
                    &UsageDelta {
                        input_tokens: p.input_tokens,
                        output_tokens: p.output_tokens,
                        cache_read_tokens: p.cache_read_tokens,
                        cache_write_tokens: p.cache_write_tokens,
                        cost_usd: p.cost_usd,
                    },
                );
            }
        }
        kinds::MEMORY_RECALL_RECORDED => {
            if let Some(p) = record.decode::<MemoryRecallPayload>() {
                view.memory_state = MemoryState {
                    last_query: Some(p.query),
                    last_source: Some(p.source),
                    hits: p.hits,
                    updated_at: record.timestamp,
                };
            }
        }
        event_type if event_type.starts_with("task.") => {
            task_reducer::reduce(&mut view.task_state, event_type, record.timestamp, &record.payload);
        }
        event_type if event_type.starts_with("truth.") => {
            truth_reducer::reduce(&mut view.truth_state, event_type, record.timestamp, &record.payload);
        }
        _ => {}
    }
}

/// Rebuild a `TurnReplayView` from scratch (spec §4.D build algorithm):
/// scan right-to-left for the latest checkpoint, seed from it, then replay
/// everything strictly after it in forward order.
pub fn replay(events: &[EventRecord], get_turn: impl Fn(&EventRecord) -> u64, cost_config: &CostTrackingConfig) -> TurnReplayView {
    let checkpoint_pos = events.iter().rposition(|e| e.event_type == kinds::CHECKPOINT);

    let mut view = TurnReplayView::default();
    let start = match checkpoint_pos {
        Some(idx) => {
            if let Some(payload) = events[idx].decode::<CheckpointPayload>() {
                view.task_state = payload.task_state;
                view.truth_state = payload.truth_state;
                view.cost_state = payload.cost_state;
                view.evidence_state = payload.evidence_state;
                view.memory_state = payload.memory_state;
                view.turn = payload.turn;
            }
            view.checkpoint_event_id = Some(events[idx].id.clone());
            idx + 1
        }
        None => 0,
    };

    for record in &events[start..] {
        fold_one(&mut view, record, cost_config);
        view.turn = get_turn(record).max(view.turn);
        view.latest_event_id = Some(record.id.clone());
    }
    if let Some(last) = events.last() {
        if view.latest_event_id.is_none() {
            view.latest_event_id = Some(last.id.clone());
        }
    }
    view
}

/// Per-session cache of the latest replayed view, guarded by
/// `parking_lot::RwLock` (spec §9: teacher's consistent choice of
/// `parking_lot` over `std::sync::RwLock`).
#[derive(Default)]
pub struct ReplayCache {
    views: RwLock<HashMap<String, TurnReplayView>>,
}

impl ReplayCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached view for `session_id`, or build and cache it from
    /// `events` if absent.
    pub fn get_or_build(
        &self,
        session_id: &str,
        events: &[EventRecord],
        get_turn: impl Fn(&EventRecord) -> u64,
        cost_config: &CostTrackingConfig,
    ) -> TurnReplayView {
        if let Some(cached) = self.views.read().get(session_id) {
            return cached.clone();
        }
        let view = replay(events, get_turn, cost_config);
        self.views.write().insert(session_id.to_string(), view.clone());
        view
    }

    /// Incrementally fold one freshly-appended event into the cached view
    /// (spec §4.D `observeEvent`). A `tape.checkpoint.v1` event replaces
    /// the cached slices wholesale rather than folding on top of them.
    pub fn observe_event(&self, session_id: &str, record: &EventRecord, cost_config: &CostTrackingConfig) {
        let mut views = self.views.write();
        let view = views.entry(session_id.to_string()).or_default();
        if record.event_type == kinds::CHECKPOINT {
            if let Some(payload) = record.decode::<CheckpointPayload>() {
                view.task_state = payload.task_state;
                view.truth_state = payload.truth_state;
                view.cost_state = payload.cost_state;
                view.evidence_state = payload.evidence_state;
                view.memory_state = payload.memory_state;
                view.turn = payload.turn;
            }
            view.checkpoint_event_id = Some(record.id.clone());
        } else {
            fold_one(view, record, cost_config);
        }
        view.latest_event_id = Some(record.id.clone());
        if let Some(turn) = record.turn {
            view.turn = view.turn.max(turn);
        }
    }

    /// Bump the cached turn without reworking any folded slice — turn
    /// bumps reuse cached slices (spec §4.D).
    pub fn bump_turn(&self, session_id: &str, turn: u64) {
        if let Some(view) = self.views.write().get_mut(session_id) {
            view.turn = view.turn.max(turn);
        }
    }

    /// Drop the cached view; the next `get_or_build` rebuilds from scratch
    /// (spec §4.D `invalidate`).
    pub fn invalidate(&self, session_id: &str) {
        self.views.write().remove(session_id);
    }
}
