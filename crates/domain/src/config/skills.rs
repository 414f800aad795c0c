use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Skill discovery and selector tuning
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Candidate pool size passed to chain planning.
    #[serde(default = "d_k")]
    pub k: u32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self { k: d_k() }
    }
}

fn d_k() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SkillsConfig {
    /// Base tier search roots, later entries win on name collision.
    #[serde(default = "d_roots")]
    pub roots: Vec<PathBuf>,
    /// Pack tier roots, applied after `roots` and before project overrides.
    #[serde(default)]
    pub packs: Vec<PathBuf>,
    /// Project-tier contract overrides keyed by skill name.
    #[serde(default)]
    pub overrides: HashMap<String, PathBuf>,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn d_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("./skills")]
}
