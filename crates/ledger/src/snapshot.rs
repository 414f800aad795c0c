//! Task ledger snapshot store (spec §4.B, §6).

use std::path::{Path, PathBuf};

use sa_domain::error::{Error, Result};
use sa_domain::task::TaskState;
use sa_tape::sanitize_session_id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub version: u32,
    pub session_id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub log_offset_bytes: u64,
    pub state: TaskState,
}

pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join("task-ledger").join(format!("{}.json", sanitize_session_id(session_id)))
    }

    pub fn save(&self, snapshot: &TaskSnapshot) -> Result<()> {
        let path = self.path_for(&snapshot.session_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(snapshot).map_err(Error::Json)?;
        std::fs::write(&tmp, body).map_err(Error::Io)?;
        std::fs::rename(&tmp, &path).map_err(Error::Io)?;
        Ok(())
    }

    /// Load a snapshot, discarding it as stale if the log on disk is
    /// shorter than `logOffsetBytes` (spec §4.B rehydration rule).
    pub fn load(&self, session_id: &str, current_log_bytes: u64) -> Result<Option<TaskSnapshot>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let snapshot: TaskSnapshot = serde_json::from_str(&raw).map_err(Error::Json)?;
        if current_log_bytes < snapshot.log_offset_bytes {
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
