use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Verification level gating task completion claims
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    Quick,
    Standard,
    Strict,
}

impl Default for VerificationLevel {
    fn default() -> Self {
        VerificationLevel::Standard
    }
}

/// Named check lists per level, e.g. `quick: ["lint"]`,
/// `standard: ["lint", "build", "test"]`, `strict: [..., "e2e"]`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerificationChecksConfig {
    #[serde(default)]
    pub quick: Vec<String>,
    #[serde(default)]
    pub standard: Vec<String>,
    #[serde(default)]
    pub strict: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerificationConfig {
    #[serde(default)]
    pub default_level: VerificationLevel,
    #[serde(default)]
    pub checks: VerificationChecksConfig,
    /// Check name -> shell command, e.g. `"test" -> "cargo test"`.
    #[serde(default)]
    pub commands: HashMap<String, String>,
}
