use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// External recall (ports out to a memory engine the core never
// implements directly; see sa_domain::ports::ExternalRecallPort)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallMode {
    /// External recall is queried first; internal arena entries fill gaps.
    Primary,
    /// Internal arena entries are used first; external recall only fills
    /// gaps below `minInternalScore`.
    Fallback,
}

impl Default for RecallMode {
    fn default() -> Self {
        RecallMode::Fallback
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalRecallConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_min_internal_score")]
    pub min_internal_score: f32,
    #[serde(default = "d_query_top_k")]
    pub query_top_k: u32,
    #[serde(default = "d_injected_confidence")]
    pub injected_confidence: f32,
}

impl Default for ExternalRecallConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_internal_score: d_min_internal_score(),
            query_top_k: d_query_top_k(),
            injected_confidence: d_injected_confidence(),
        }
    }
}

fn d_min_internal_score() -> f32 {
    0.35
}
fn d_query_top_k() -> u32 {
    5
}
fn d_injected_confidence() -> f32 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default)]
    pub recall_mode: RecallMode,
    #[serde(default = "d_retrieval_top_k")]
    pub retrieval_top_k: u32,
    #[serde(default)]
    pub external_recall: ExternalRecallConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: d_true(),
            recall_mode: RecallMode::default(),
            retrieval_top_k: d_retrieval_top_k(),
            external_recall: ExternalRecallConfig::default(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_retrieval_top_k() -> u32 {
    8
}
