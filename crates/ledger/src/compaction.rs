//! Task ledger tape compaction (spec §4.B compaction policy).
//!
//! Grounded on the teacher's `runs.rs` log-rotation gates (size + count +
//! cooldown, atomic rewrite via `std::fs::rename`) but triggered on task
//! event count rather than run count, and folding the compacted prefix into
//! one synthetic `task.checkpoint_set` event instead of deleting it outright.

use sa_domain::error::Result;
use sa_domain::event::{kinds, EventRecord};
use sa_domain::task::TaskState;
use sa_domain::time::Clock;
use sa_tape::EventStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Thresholds gating compaction (spec §4.B): "when log size >= 64 KiB and
/// <= 50 MiB, task event count >= 220, and cooldown 60s elapsed".
#[derive(Debug, Clone, Copy)]
pub struct CompactionPolicy {
    pub min_log_bytes: u64,
    pub max_log_bytes: u64,
    pub min_task_events: usize,
    pub cooldown_ms: i64,
    pub keep_last: usize,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            min_log_bytes: 64 * 1024,
            max_log_bytes: 50 * 1024 * 1024,
            min_task_events: 220,
            cooldown_ms: 60_000,
            keep_last: 80,
        }
    }
}

fn is_task_event(event_type: &str) -> bool {
    matches!(
        event_type,
        kinds::TASK_SPEC_SET
            | kinds::TASK_CHECKPOINT_SET
            | kinds::TASK_ITEM_ADDED
            | kinds::TASK_ITEM_UPDATED
            | kinds::TASK_BLOCKER_RECORDED
            | kinds::TASK_BLOCKER_RESOLVED
            | kinds::TASK_STATUS_UPDATED
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveHeader {
    pub kind: String,
    pub session_id: String,
    pub created_at: i64,
    pub checkpoint_event_id: String,
    pub compacted: usize,
    pub kept: usize,
}

#[derive(Debug, Clone)]
pub struct CompactionOutcome {
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub compacted: usize,
    pub kept: usize,
    pub duration_ms: u64,
    pub checkpoint_event_id: String,
}

fn last_compaction_timestamp(events: &[EventRecord]) -> Option<i64> {
    events
        .iter()
        .rev()
        .find(|e| e.event_type == kinds::TASK_LEDGER_COMPACTED)
        .map(|e| e.timestamp)
}

/// Archive the compacted prefix under `{archive_dir}/{session_id}.jsonl`
/// with the header described by spec §4.B, appended so repeated
/// compactions accumulate rather than clobber history.
fn archive_compacted(
    archive_dir: &Path,
    session_id: &str,
    header: &ArchiveHeader,
    compacted_events: &[EventRecord],
) -> Result<()> {
    std::fs::create_dir_all(archive_dir).map_err(sa_domain::error::Error::Io)?;
    let path = archive_dir.join(format!("{session_id}.jsonl"));
    let mut buf = String::new();
    buf.push_str(&serde_json::to_string(header).map_err(sa_domain::error::Error::Json)?);
    buf.push('\n');
    for event in compacted_events {
        buf.push_str(&serde_json::to_string(event).map_err(sa_domain::error::Error::Json)?);
        buf.push('\n');
    }
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(sa_domain::error::Error::Io)?;
    file.write_all(buf.as_bytes())
        .map_err(sa_domain::error::Error::Io)?;
    Ok(())
}

/// Run the compaction check-and-act for one session's tape. Returns `None`
/// when thresholds aren't met (no-op); otherwise performs the atomic
/// rewrite + archive and returns telemetry for a `task_ledger_compacted`
/// event.
pub fn compact_if_due(
    store: &EventStore,
    session_id: &str,
    clock: &dyn Clock,
    id_gen: &dyn sa_domain::time::IdGenerator,
    archive_dir: &Path,
    policy: &CompactionPolicy,
) -> Result<Option<CompactionOutcome>> {
    let bytes_before = store.size_bytes(session_id);
    if bytes_before < policy.min_log_bytes || bytes_before > policy.max_log_bytes {
        return Ok(None);
    }

    let all = store.list(session_id, &sa_tape::ListFilter::default())?;
    let task_event_count = all.iter().filter(|e| is_task_event(&e.event_type)).count();
    if task_event_count < policy.min_task_events {
        return Ok(None);
    }

    let now = clock.now_ms();
    if let Some(last) = last_compaction_timestamp(&all) {
        if now - last < policy.cooldown_ms {
            return Ok(None);
        }
    }

    // Partition: keep the last `keep_last` task events verbatim; everything
    // before the earliest kept task event (task or otherwise) folds into
    // one synthetic checkpoint at that position.
    let task_indices: Vec<usize> = all
        .iter()
        .enumerate()
        .filter(|(_, e)| is_task_event(&e.event_type))
        .map(|(i, _)| i)
        .collect();
    if task_indices.len() <= policy.keep_last {
        return Ok(None);
    }
    let split_at = task_indices[task_indices.len() - policy.keep_last];

    let compacted_events = &all[..split_at];
    let kept_events = &all[split_at..];

    let mut folded = TaskState::default();
    for event in compacted_events {
        task::reduce(&mut folded, &event.event_type, event.timestamp, &event.payload);
    }

    let checkpoint_id = id_gen.next_id(session_id);
    let checkpoint = EventRecord::new(
        checkpoint_id.clone(),
        session_id,
        kinds::TASK_CHECKPOINT_SET,
        now,
        None,
        serde_json::to_value(&folded).unwrap_or_else(|_| json!({})),
    );

    let header = ArchiveHeader {
        kind: "compacted".to_string(),
        session_id: session_id.to_string(),
        created_at: now,
        checkpoint_event_id: checkpoint_id.clone(),
        compacted: compacted_events.len(),
        kept: kept_events.len(),
    };
    archive_compacted(archive_dir, session_id, &header, compacted_events)?;

    let mut new_tape: Vec<EventRecord> = Vec::with_capacity(kept_events.len() + 1);
    new_tape.push(checkpoint);
    new_tape.extend(kept_events.iter().cloned());
    store.rewrite(session_id, &new_tape)?;

    let bytes_after = store.size_bytes(session_id);

    Ok(Some(CompactionOutcome {
        bytes_before,
        bytes_after,
        compacted: compacted_events.len(),
        kept: kept_events.len(),
        duration_ms: (clock.now_ms() - now).max(0) as u64,
        checkpoint_event_id: checkpoint_id,
    }))
}

use crate::task;

fn archive_path(base: &Path, session_id: &str) -> PathBuf {
    base.join(format!("{session_id}.jsonl"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::time::{CountingIdGenerator, FixedClock};
    use serde_json::json as j;

    fn rec(id: &str, session: &str, ty: &str, ts: i64, payload: serde_json::Value) -> EventRecord {
        EventRecord::new(id, session, ty, ts, None, payload)
    }

    #[test]
    fn below_event_count_threshold_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path(), true);
        let big_payload = "x".repeat(100_000);
        for i in 0..10 {
            store
                .append(&rec(
                    &format!("e{i}"),
                    "s1",
                    kinds::TASK_ITEM_ADDED,
                    i as i64,
                    j!({"id": format!("i{i}"), "text": big_payload}),
                ))
                .unwrap();
        }
        let clock = FixedClock::new(0);
        let idgen = CountingIdGenerator::new();
        let archive = dir.path().join("archive");
        let outcome = compact_if_due(&store, "s1", &clock, &idgen, &archive, &CompactionPolicy::default()).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn compacts_and_archives_when_thresholds_met() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path(), true);
        let filler = "x".repeat(400);
        for i in 0..300 {
            store
                .append(&rec(
                    &format!("e{i}"),
                    "s1",
                    kinds::TASK_ITEM_ADDED,
                    i as i64,
                    j!({"id": format!("i{i}"), "text": filler}),
                ))
                .unwrap();
        }
        let clock = FixedClock::new(10_000_000);
        let idgen = CountingIdGenerator::new();
        let archive = dir.path().join("archive");
        let policy = CompactionPolicy { min_log_bytes: 1024, ..CompactionPolicy::default() };
        let outcome = compact_if_due(&store, "s1", &clock, &idgen, &archive, &policy)
            .unwrap()
            .expect("should compact");
        assert_eq!(outcome.kept, 80);
        assert_eq!(outcome.compacted, 220);

        let remaining = store.list("s1", &sa_tape::ListFilter::default()).unwrap();
        assert_eq!(remaining.len(), 81);
        assert_eq!(remaining[0].event_type, kinds::TASK_CHECKPOINT_SET);

        let archive_path = archive_path(&archive, "s1");
        assert!(archive_path.exists());
    }

    #[test]
    fn cooldown_blocks_immediate_recompaction() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path(), true);
        let filler = "x".repeat(400);
        for i in 0..300 {
            store
                .append(&rec(&format!("e{i}"), "s1", kinds::TASK_ITEM_ADDED, i as i64, j!({"id": format!("i{i}"), "text": filler})))
                .unwrap();
        }
        let clock = FixedClock::new(10_000_000);
        let idgen = CountingIdGenerator::new();
        let archive = dir.path().join("archive");
        let policy = CompactionPolicy { min_log_bytes: 1024, ..CompactionPolicy::default() };
        compact_if_due(&store, "s1", &clock, &idgen, &archive, &policy).unwrap();

        clock.advance(1_000);
        for i in 0..250 {
            store
                .append(&rec(&format!("f{i}"), "s1", kinds::TASK_ITEM_ADDED, i as i64, j!({"id": format!("j{i}"), "text": filler})))
                .unwrap();
        }
        let outcome = compact_if_due(&store, "s1", &clock, &idgen, &archive, &policy).unwrap();
        assert!(outcome.is_none(), "cooldown should block recompaction");
    }
}
