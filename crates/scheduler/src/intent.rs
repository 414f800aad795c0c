//! Scheduler Intent Store (spec §4.N, component N).
//!
//! A JSONL projection of active `SchedulerIntent` records, recovered from
//! the event tape. Grounded on the teacher's checkpoint-plus-replay
//! pattern (`crates/tape/src/store.rs`'s `rewrite`, itself modeled on the
//! teacher's `runs.rs:294` temp-file-then-rename) applied here to a
//! standalone projection file rather than the tape itself: a `meta` line
//! records how far the projection has folded, and recovery only needs to
//! replay events after that watermark rather than the whole intent
//! history.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use sa_domain::error::{Error, Result};
use sa_domain::event::{kinds, EventRecord};
use sa_domain::scheduler::{IntentStatus, SchedulerIntent};
use sa_tape::{EventStore, ListFilter};

const PROJECTION_SCHEMA: &str = "schedule.projection.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetaLine {
    schema: String,
    kind: String,
    generated_at: i64,
    watermark_offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IntentLine {
    kind: String,
    #[serde(flatten)]
    intent: SchedulerIntent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IntentCancelledPayload {
    intent_id: String,
    updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IntentFiredPayload {
    intent_id: String,
    run_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_run_at: Option<i64>,
    updated_at: i64,
    /// Whether the run this fire represents failed. Drives the same
    /// failure-counter/cooldown bookkeeping as the teacher's
    /// `record_success`/`record_failure` (`schedules/store.rs`).
    #[serde(default)]
    failed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IntentConvergedPayload {
    intent_id: String,
    updated_at: i64,
}

struct ProjectionState {
    intents: HashMap<String, SchedulerIntent>,
    watermark_offset: u64,
}

/// Holds the in-memory projection and persists it to `projection_path`.
pub struct IntentStore {
    projection_path: PathBuf,
    state: RwLock<ProjectionState>,
}

impl IntentStore {
    /// Load an existing projection file, or start empty (watermark 0) if
    /// one doesn't exist yet.
    pub fn open(projection_path: impl Into<PathBuf>) -> Result<Self> {
        let projection_path = projection_path.into();
        let state = if projection_path.exists() {
            Self::load_projection(&projection_path)?
        } else {
            ProjectionState { intents: HashMap::new(), watermark_offset: 0 }
        };
        Ok(Self { projection_path, state: RwLock::new(state) })
    }

    fn load_projection(path: &Path) -> Result<ProjectionState> {
        let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut watermark_offset = 0u64;
        let mut intents = HashMap::new();
        for (offset, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(offset, error = %e, "skipping corrupt projection line");
                    continue;
                }
            };
            match value.get("kind").and_then(|k| k.as_str()) {
                Some("meta") => {
                    if let Ok(meta) = serde_json::from_value::<MetaLine>(value) {
                        watermark_offset = meta.watermark_offset;
                    }
                }
                Some("intent") => {
                    if let Ok(line) = serde_json::from_value::<IntentLine>(value) {
                        intents.insert(line.intent.intent_id.clone(), line.intent);
                    }
                }
                _ => {}
            }
        }
        Ok(ProjectionState { intents, watermark_offset })
    }

    /// Fold every tape event for `session_id` after the current watermark
    /// into the projection, then atomically rewrite the projection file.
    /// `now` stamps the rewritten projection's `generated_at`.
    pub fn recover(&self, tape: &EventStore, session_id: &str, now: i64) -> Result<()> {
        let all = tape.list(session_id, &ListFilter::default())?;
        let mut state = self.state.write();
        let start = state.watermark_offset as usize;
        if start >= all.len() {
            return Ok(());
        }
        for record in &all[start..] {
            apply_event(&mut state.intents, record);
        }
        state.watermark_offset = all.len() as u64;
        self.rewrite_locked(&state, now)
    }

    /// Apply a single freshly-appended event without a full tape scan
    /// (the incremental counterpart to `recover`).
    pub fn observe_event(&self, record: &EventRecord, now: i64) -> Result<()> {
        let mut state = self.state.write();
        apply_event(&mut state.intents, record);
        state.watermark_offset += 1;
        self.rewrite_locked(&state, now)
    }

    fn rewrite_locked(&self, state: &ProjectionState, now: i64) -> Result<()> {
        std::fs::create_dir_all(
            self.projection_path.parent().unwrap_or_else(|| Path::new(".")),
        )
        .map_err(Error::Io)?;

        let mut buf = String::new();
        let meta = MetaLine {
            schema: PROJECTION_SCHEMA.to_string(),
            kind: "meta".to_string(),
            generated_at: now,
            watermark_offset: state.watermark_offset,
        };
        buf.push_str(&serde_json::to_string(&meta).map_err(Error::Json)?);
        buf.push('\n');

        let mut active: Vec<&SchedulerIntent> =
            state.intents.values().filter(|i| i.status == IntentStatus::Active).collect();
        active.sort_by(|a, b| a.intent_id.cmp(&b.intent_id));
        for intent in active {
            let line = IntentLine { kind: "intent".to_string(), intent: intent.clone() };
            buf.push_str(&serde_json::to_string(&line).map_err(Error::Json)?);
            buf.push('\n');
        }

        let tmp = self.projection_path.with_extension("jsonl.tmp");
        std::fs::write(&tmp, buf).map_err(Error::Io)?;
        std::fs::rename(&tmp, &self.projection_path).map_err(Error::Io)?;
        Ok(())
    }

    pub fn active_intents(&self) -> Vec<SchedulerIntent> {
        let state = self.state.read();
        let mut active: Vec<SchedulerIntent> =
            state.intents.values().filter(|i| i.status == IntentStatus::Active).cloned().collect();
        active.sort_by(|a, b| a.intent_id.cmp(&b.intent_id));
        active
    }

    pub fn get(&self, intent_id: &str) -> Option<SchedulerIntent> {
        self.state.read().intents.get(intent_id).cloned()
    }

    pub fn watermark_offset(&self) -> u64 {
        self.state.read().watermark_offset
    }
}

fn apply_event(intents: &mut HashMap<String, SchedulerIntent>, record: &EventRecord) {
    match record.event_type.as_str() {
        kinds::INTENT_CREATED | kinds::INTENT_UPDATED => {
            if let Some(intent) = record.decode::<SchedulerIntent>() {
                intents.insert(intent.intent_id.clone(), intent);
            } else {
                tracing::warn!(event_id = %record.id, "malformed intent_created/updated payload");
            }
        }
        kinds::INTENT_CANCELLED => {
            if let Some(payload) = record.decode::<IntentCancelledPayload>() {
                if let Some(intent) = intents.get_mut(&payload.intent_id) {
                    intent.status = IntentStatus::Cancelled;
                    intent.updated_at = payload.updated_at;
                }
            }
        }
        kinds::INTENT_FIRED => {
            if let Some(payload) = record.decode::<IntentFiredPayload>() {
                if let Some(intent) = intents.get_mut(&payload.intent_id) {
                    intent.run_count = payload.run_count;
                    intent.next_run_at = payload.next_run_at;
                    intent.updated_at = payload.updated_at;
                    if payload.failed {
                        intent.consecutive_failures += 1;
                        let cooldown = crate::missed::cooldown_minutes(intent.consecutive_failures);
                        intent.cooldown_until = Some(payload.updated_at + cooldown as i64 * 60_000);
                    } else {
                        intent.consecutive_failures = 0;
                        intent.cooldown_until = None;
                    }
                    if intent.max_runs > 0 && intent.run_count >= intent.max_runs {
                        intent.status = IntentStatus::Converged;
                    }
                }
            }
        }
        kinds::INTENT_CONVERGED => {
            if let Some(payload) = record.decode::<IntentConvergedPayload>() {
                if let Some(intent) = intents.get_mut(&payload.intent_id) {
                    intent.status = IntentStatus::Converged;
                    intent.updated_at = payload.updated_at;
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::scheduler::ContinuityMode;
    use serde_json::json;

    fn intent_record(id: &str, intent_id: &str, event_type: &str, ts: i64, payload: serde_json::Value) -> EventRecord {
        EventRecord::new(id, "scheduler", event_type, ts, None, payload)
    }

    fn base_intent(intent_id: &str) -> SchedulerIntent {
        SchedulerIntent {
            intent_id: intent_id.to_string(),
            parent_session_id: "s1".to_string(),
            reason: "recurring sync".to_string(),
            continuity_mode: ContinuityMode::Fresh,
            max_runs: 0,
            run_at: None,
            cron: Some("*/5 * * * *".to_string()),
            time_zone: None,
            goal_ref: None,
            convergence_condition: None,
            missed_policy: Default::default(),
            status: IntentStatus::Active,
            run_count: 0,
            next_run_at: Some(100),
            updated_at: 1,
            event_offset: 0,
            consecutive_failures: 0,
            max_catchup_runs: 5,
            cooldown_until: None,
        }
    }

    #[test]
    fn recover_folds_created_events_and_persists_active_only() {
        let dir = tempfile::tempdir().unwrap();
        let tape = EventStore::new(dir.path().join("events"), true);
        let created = serde_json::to_value(base_intent("i1")).unwrap();
        tape.append(&intent_record("e1", "i1", kinds::INTENT_CREATED, 1, created)).unwrap();

        let store = IntentStore::open(dir.path().join("intents.jsonl")).unwrap();
        store.recover(&tape, "scheduler", 1000).unwrap();

        let active = store.active_intents();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].intent_id, "i1");
        assert_eq!(store.watermark_offset(), 1);
    }

    #[test]
    fn cancelled_intent_drops_out_of_active_projection() {
        let dir = tempfile::tempdir().unwrap();
        let tape = EventStore::new(dir.path().join("events"), true);
        let created = serde_json::to_value(base_intent("i1")).unwrap();
        tape.append(&intent_record("e1", "i1", kinds::INTENT_CREATED, 1, created)).unwrap();
        tape.append(&intent_record(
            "e2",
            "i1",
            kinds::INTENT_CANCELLED,
            2,
            json!({"intent_id": "i1", "updated_at": 2}),
        ))
        .unwrap();

        let store = IntentStore::open(dir.path().join("intents.jsonl")).unwrap();
        store.recover(&tape, "scheduler", 1000).unwrap();
        assert!(store.active_intents().is_empty());
        assert_eq!(store.get("i1").unwrap().status, IntentStatus::Cancelled);
    }

    #[test]
    fn fired_past_max_runs_auto_converges() {
        let dir = tempfile::tempdir().unwrap();
        let tape = EventStore::new(dir.path().join("events"), true);
        let mut intent = base_intent("i1");
        intent.max_runs = 3;
        let created = serde_json::to_value(&intent).unwrap();
        tape.append(&intent_record("e1", "i1", kinds::INTENT_CREATED, 1, created)).unwrap();
        tape.append(&intent_record(
            "e2",
            "i1",
            kinds::INTENT_FIRED,
            2,
            json!({"intent_id": "i1", "run_count": 3, "next_run_at": null, "updated_at": 2}),
        ))
        .unwrap();

        let store = IntentStore::open(dir.path().join("intents.jsonl")).unwrap();
        store.recover(&tape, "scheduler", 1000).unwrap();
        assert_eq!(store.get("i1").unwrap().status, IntentStatus::Converged);
        assert!(store.active_intents().is_empty());
    }

    #[test]
    fn failed_fire_sets_cooldown_and_increments_failures() {
        let dir = tempfile::tempdir().unwrap();
        let tape = EventStore::new(dir.path().join("events"), true);
        let created = serde_json::to_value(base_intent("i1")).unwrap();
        tape.append(&intent_record("e1", "i1", kinds::INTENT_CREATED, 1, created)).unwrap();
        tape.append(&intent_record(
            "e2",
            "i1",
            kinds::INTENT_FIRED,
            2,
            json!({"intent_id": "i1", "run_count": 1, "next_run_at": 200, "updated_at": 2, "failed": true}),
        ))
        .unwrap();

        let store = IntentStore::open(dir.path().join("intents.jsonl")).unwrap();
        store.recover(&tape, "scheduler", 1000).unwrap();
        let intent = store.get("i1").unwrap();
        assert_eq!(intent.consecutive_failures, 1);
        assert_eq!(intent.cooldown_until, Some(2 + 60_000));
    }

    #[test]
    fn successful_fire_after_failures_clears_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let tape = EventStore::new(dir.path().join("events"), true);
        let mut intent = base_intent("i1");
        intent.consecutive_failures = 3;
        intent.cooldown_until = Some(500);
        let created = serde_json::to_value(&intent).unwrap();
        tape.append(&intent_record("e1", "i1", kinds::INTENT_CREATED, 1, created)).unwrap();
        tape.append(&intent_record(
            "e2",
            "i1",
            kinds::INTENT_FIRED,
            2,
            json!({"intent_id": "i1", "run_count": 1, "next_run_at": 600, "updated_at": 600, "failed": false}),
        ))
        .unwrap();

        let store = IntentStore::open(dir.path().join("intents.jsonl")).unwrap();
        store.recover(&tape, "scheduler", 1000).unwrap();
        let intent = store.get("i1").unwrap();
        assert_eq!(intent.consecutive_failures, 0);
        assert_eq!(intent.cooldown_until, None);
    }

    #[test]
    fn recovery_only_replays_events_after_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let tape = EventStore::new(dir.path().join("events"), true);
        let created = serde_json::to_value(base_intent("i1")).unwrap();
        tape.append(&intent_record("e1", "i1", kinds::INTENT_CREATED, 1, created)).unwrap();

        let projection_path = dir.path().join("intents.jsonl");
        let store = IntentStore::open(&projection_path).unwrap();
        store.recover(&tape, "scheduler", 1000).unwrap();
        assert_eq!(store.watermark_offset(), 1);

        tape.append(&intent_record(
            "e2",
            "i1",
            kinds::INTENT_CANCELLED,
            2,
            json!({"intent_id": "i1", "updated_at": 2}),
        ))
        .unwrap();

        let reopened = IntentStore::open(&projection_path).unwrap();
        assert_eq!(reopened.watermark_offset(), 1);
        reopened.recover(&tape, "scheduler", 2000).unwrap();
        assert_eq!(reopened.watermark_offset(), 2);
        assert!(reopened.active_intents().is_empty());
    }
}
