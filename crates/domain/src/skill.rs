//! Skill document/contract data model (spec §3.7).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Base,
    Pack,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    Gate,
    Auto,
    Suggest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    Stable,
    Experimental,
    Deprecated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostHint {
    Low,
    Medium,
    High,
}

impl CostHint {
    /// `cost_adjustment` scoring bias (spec §4.I): +1 low, 0 medium, -1 high.
    pub fn score_adjustment(self) -> i32 {
        match self {
            CostHint::Low => 1,
            CostHint::Medium => 0,
            CostHint::High => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeScope {
    Intent,
    Topic,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Negative {
    pub scope: NegativeScope,
    pub terms: Vec<String>,
}

impl Default for NegativeScope {
    fn default() -> Self {
        NegativeScope::Intent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Triggers {
    #[serde(default)]
    pub intents: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub phrases: Vec<String>,
    #[serde(default)]
    pub negatives: Vec<Negative>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatch {
    pub gate_threshold: f32,
    pub auto_threshold: f32,
    pub default_mode: DispatchMode,
}

impl Default for Dispatch {
    fn default() -> Self {
        Self {
            gate_threshold: 12.0,
            auto_threshold: 20.0,
            default_mode: DispatchMode::Suggest,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsPolicy {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default)]
    pub denied: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Budget {
    pub max_tool_calls: u32,
    pub max_tokens: u32,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_tool_calls: 20,
            max_tokens: 50_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillContract {
    pub name: String,
    pub tier: Tier,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub anti_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Triggers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<Dispatch>,
    #[serde(default)]
    pub tools: ToolsPolicy,
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub composable_with: Vec<String>,
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<u32>,
    #[serde(default = "default_stability")]
    pub stability: Stability,
    #[serde(default = "default_cost_hint")]
    pub cost_hint: CostHint,
    /// Deployment readiness requirements (bins/env/os/arch). Supplemented
    /// plumbing per SPEC_FULL.md §4.I': base/pack/project tiering implies a
    /// skill can be partially unavailable per-deployment, so the contract
    /// carries what it needs to be ready without the selector's scoring
    /// weights changing.
    #[serde(default)]
    pub requires: SkillRequirements,
    #[serde(default)]
    pub install: Vec<InstallEntry>,
}

/// What a skill needs to function on the current system (spec SPEC_FULL.md
/// §4.I', grounded on the teacher's `SkillRequirements`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SkillRequirements {
    #[serde(default)]
    pub bins: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub os: Vec<String>,
    #[serde(default)]
    pub arch: Vec<String>,
}

/// One way to install a missing dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallEntry {
    #[serde(alias = "method")]
    pub kind: String,
    pub command: String,
    #[serde(default)]
    pub provides: Option<String>,
}

fn default_stability() -> Stability {
    Stability::Stable
}
fn default_cost_hint() -> CostHint {
    CostHint::Medium
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDocument {
    pub name: String,
    pub description: String,
    pub tier: Tier,
    pub file_path: String,
    pub base_dir: String,
    pub markdown: String,
    pub contract: SkillContract,
}
