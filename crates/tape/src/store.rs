//! Event Store (spec §4.A, component A).
//!
//! Append-only per-session JSONL log. Grounded on the teacher's
//! `TranscriptWriter` (`crates/sessions/src/transcript.rs`):
//! `OpenOptions::new().create(true).append(true)` for atomic-at-the-line
//! appends, and the same malformed-line-skips-with-a-warning handling for
//! `list`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use sa_domain::error::{Error, Result};
use sa_domain::event::EventRecord;

/// Sanitize a session id into a safe filename component: keep
/// alphanumerics, `-`, `_`; everything else becomes `_`. Prevents path
/// traversal via a hostile session id reaching the filesystem.
pub fn sanitize_session_id(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub event_type: Option<String>,
    /// Only the last N events (after type filtering).
    pub last: Option<usize>,
}

/// Append-only durable per-session event log.
///
/// `append` returns `None` when the store is disabled (spec §4.A failure
/// rule) — callers must tolerate this without aborting the turn.
pub struct EventStore {
    enabled: bool,
    events_dir: PathBuf,
    /// In-memory per-session cache, invalidated by `clear_session_cache`.
    /// Never the source of truth — always a read-through of the file.
    cache: RwLock<std::collections::HashMap<String, Vec<EventRecord>>>,
}

impl EventStore {
    pub fn new(events_dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            enabled,
            events_dir: events_dir.into(),
            cache: RwLock::new(std::collections::HashMap::new()),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.events_dir.join(format!("{}.jsonl", sanitize_session_id(session_id)))
    }

    /// Append exactly one line. Returns `Ok(None)` when the store is
    /// disabled; `Ok(Some(()))` on success.
    pub fn append(&self, record: &EventRecord) -> Result<Option<()>> {
        if !self.enabled {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.events_dir).map_err(Error::Io)?;
        let path = self.path_for(&record.session_id);
        let line = serde_json::to_string(record).map_err(Error::Json)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::Io)?;
        file.write_all(line.as_bytes()).map_err(Error::Io)?;
        file.write_all(b"\n").map_err(Error::Io)?;

        self.cache.write().remove(&record.session_id);
        tracing::debug!(
            session_id = %record.session_id,
            event_type = %record.event_type,
            "tape append"
        );
        Ok(Some(()))
    }

    /// Read back all events for a session, in append order. Malformed
    /// lines are skipped with a warning rather than aborting the read
    /// (spec §7 `tape_corrupt_line`).
    pub fn list(&self, session_id: &str, filter: &ListFilter) -> Result<Vec<EventRecord>> {
        let all = self.load_all(session_id)?;
        let mut filtered: Vec<EventRecord> = match &filter.event_type {
            Some(t) => all.into_iter().filter(|e| &e.event_type == t).collect(),
            None => all,
        };
        if let Some(last) = filter.last {
            if filtered.len() > last {
                let drop = filtered.len() - last;
                filtered.drain(0..drop);
            }
        }
        Ok(filtered)
    }

    fn load_all(&self, session_id: &str) -> Result<Vec<EventRecord>> {
        if let Some(cached) = self.cache.read().get(session_id) {
            return Ok(cached.clone());
        }
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut events = Vec::new();
        for (offset, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EventRecord>(line) {
                Ok(rec) => events.push(rec),
                Err(e) => {
                    tracing::warn!(session_id = %session_id, offset, error = %e, "skipping corrupt tape line");
                }
            }
        }
        self.cache.write().insert(session_id.to_string(), events.clone());
        Ok(events)
    }

    /// Drop in-memory caches for a session without rewriting history.
    pub fn clear_session_cache(&self, session_id: &str) {
        self.cache.write().remove(session_id);
    }

    /// Current on-disk size in bytes, used by compaction size gates.
    pub fn size_bytes(&self, session_id: &str) -> u64 {
        std::fs::metadata(self.path_for(session_id)).map(|m| m.len()).unwrap_or(0)
    }

    /// Atomically replace a session's tape with `records`, used by
    /// checkpoint compaction (spec §4.B). Writes to a temp file then
    /// renames over the original — matches the teacher's
    /// `std::fs::rename(&tmp, path)` idiom (`runs.rs:294`).
    pub fn rewrite(&self, session_id: &str, records: &[EventRecord]) -> Result<()> {
        std::fs::create_dir_all(&self.events_dir).map_err(Error::Io)?;
        let path = self.path_for(session_id);
        let tmp = path.with_extension("jsonl.tmp");
        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(record).map_err(Error::Json)?);
            buf.push('\n');
        }
        std::fs::write(&tmp, buf).map_err(Error::Io)?;
        std::fs::rename(&tmp, &path).map_err(Error::Io)?;
        self.cache.write().remove(session_id);
        Ok(())
    }

    pub fn events_dir(&self) -> &Path {
        &self.events_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str, session: &str, ty: &str, ts: i64) -> EventRecord {
        EventRecord::new(id, session, ty, ts, None, json!({}))
    }

    #[test]
    fn append_then_query_by_type_returns_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path(), true);
        store.append(&rec("e1", "s1", "task.item_added", 1)).unwrap();
        store.append(&rec("e2", "s1", "truth.fact_upserted", 2)).unwrap();

        let filtered = store
            .list("s1", &ListFilter { event_type: Some("task.item_added".into()), last: None })
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "e1");
    }

    #[test]
    fn disabled_store_append_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path(), false);
        let result = store.append(&rec("e1", "s1", "x", 1)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn corrupt_line_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path(), true);
        store.append(&rec("e1", "s1", "x", 1)).unwrap();
        let path = dir.path().join("s1.jsonl");
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{not valid json\n").unwrap();
        store.clear_session_cache("s1");

        let all = store.list("s1", &ListFilter::default()).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn sanitize_strips_path_traversal() {
        assert_eq!(sanitize_session_id("../../etc/passwd"), "______etc_passwd");
    }

    #[test]
    fn rewrite_replaces_tape_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path(), true);
        store.append(&rec("e1", "s1", "x", 1)).unwrap();
        store.append(&rec("e2", "s1", "x", 2)).unwrap();

        store.rewrite("s1", &[rec("checkpoint", "s1", "tape.checkpoint.v1", 3)]).unwrap();
        let all = store.list("s1", &ListFilter::default()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "checkpoint");
    }
}
