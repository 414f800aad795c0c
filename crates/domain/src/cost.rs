//! Cost summary data model (spec §3.8).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ModelTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SkillTotals {
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub usage_count: u64,
    pub turns: u64,
    /// Internal bookkeeping for the `(skill, turn)` de-dup invariant;
    /// never serialized to the event tape.
    #[serde(skip)]
    pub seen_turns: HashSet<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ToolTotals {
    pub call_count: u64,
    pub allocated_tokens: u64,
    pub allocated_cost_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetAction {
    Warn,
    BlockTools,
}

impl Default for BudgetAction {
    fn default() -> Self {
        BudgetAction::Warn
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BudgetState {
    pub action: BudgetAction,
    pub session_exceeded: bool,
    pub skill_exceeded: bool,
    pub blocked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostAlertKind {
    SessionThreshold,
    SessionCap,
    SkillCap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostAlert {
    pub kind: CostAlertKind,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CostSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub models: HashMap<String, ModelTotals>,
    pub skills: HashMap<String, SkillTotals>,
    pub tools: HashMap<String, ToolTotals>,
    pub alerts: Vec<CostAlert>,
    pub budget: BudgetState,
}
