//! Full-state checkpoint payload (spec §4.D, the `tape.checkpoint.v1` event
//! the Turn-Replay Engine seeds from).
//!
//! A checkpoint replaces every folded slice wholesale; it is the tape's
//! analogue of the task ledger's `checkpoint_set` event, widened to cover
//! truth/cost/evidence/memory too so a single anchor fully reseeds replay.

use serde::{Deserialize, Serialize};

use crate::cost::CostSummary;
use crate::evidence::EvidenceState;
use crate::memory::MemoryState;
use crate::task::TaskState;
use crate::truth::TruthState;

fn schema_v1() -> String {
    "tape.checkpoint.v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointPayload {
    #[serde(default = "schema_v1")]
    pub schema: String,
    pub turn: u64,
    #[serde(default)]
    pub task_state: TaskState,
    #[serde(default)]
    pub truth_state: TruthState,
    #[serde(default)]
    pub cost_state: CostSummary,
    #[serde(default)]
    pub evidence_state: EvidenceState,
    #[serde(default)]
    pub memory_state: MemoryState,
}
