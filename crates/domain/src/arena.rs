//! Context arena entry model shared between `sa-contextpack` and callers
//! that register candidates (spec §3.4–§3.6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Ordering index used for sort keys: higher priority sorts first.
    pub fn order(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }
}

/// Fixed tag set (spec §3.6). Order here is the fixed zone cluster order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Identity,
    Truth,
    TaskState,
    ToolFailures,
    MemoryWorking,
    MemoryRecall,
}

pub const ZONE_ORDER: [Zone; 6] = [
    Zone::Identity,
    Zone::Truth,
    Zone::TaskState,
    Zone::ToolFailures,
    Zone::MemoryWorking,
    Zone::MemoryRecall,
];

impl Zone {
    pub fn order(self) -> u8 {
        ZONE_ORDER.iter().position(|z| *z == self).unwrap_or(ZONE_ORDER.len()) as u8
    }

    /// Maps an arena entry's `source` string onto a zone. Sources that
    /// don't match a known prefix fall back to `MemoryWorking` (a
    /// catch-all working-set zone), never panicking on an unrecognized
    /// caller-chosen source name.
    pub fn from_source(source: &str) -> Zone {
        match source {
            s if s.starts_with("identity") => Zone::Identity,
            s if s.starts_with("truth") => Zone::Truth,
            s if s.starts_with("task") => Zone::TaskState,
            s if s.starts_with("tool-failure") || s.starts_with("tool_failure") => Zone::ToolFailures,
            s if s.starts_with("memory-recall") || s.starts_with("external-rag") => Zone::MemoryRecall,
            _ => Zone::MemoryWorking,
        }
    }

    /// Sources considered "recall-degradable" for SLO eviction (spec §3.5).
    pub fn is_recall_degradable(source: &str) -> bool {
        source.starts_with("memory-recall") || source.starts_with("external-rag")
    }
}

/// Token-band configuration per zone (spec §4.F).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZoneBand {
    pub min: u32,
    pub max: u32,
}
