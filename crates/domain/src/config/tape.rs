use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tape checkpoint compaction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapeConfig {
    #[serde(default = "d_checkpoint_interval_entries")]
    pub checkpoint_interval_entries: u32,
}

impl Default for TapeConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval_entries: d_checkpoint_interval_entries(),
        }
    }
}

fn d_checkpoint_interval_entries() -> u32 {
    500
}
