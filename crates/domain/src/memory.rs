//! Memory working-set slice folded by the Turn-Replay Engine (spec §4.D).
//!
//! The vector memory engine and the external recall provider are opaque
//! ports (spec §1); this slice only remembers the *shape* of the most
//! recent recall observed on the tape (query, hits, which port answered)
//! so replay can expose it without re-querying either port.

use crate::ports::MemoryHit;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallSource {
    Internal,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemoryState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_source: Option<RecallSource>,
    #[serde(default)]
    pub hits: Vec<MemoryHit>,
    #[serde(default)]
    pub updated_at: i64,
}
