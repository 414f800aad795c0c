use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context budget + compaction circuit breaker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionCircuitBreakerConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "d_cooldown_turns")]
    pub cooldown_turns: u32,
}

impl Default for CompactionCircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: d_true(),
            max_consecutive_failures: d_max_consecutive_failures(),
            cooldown_turns: d_cooldown_turns(),
        }
    }
}

fn d_max_consecutive_failures() -> u32 {
    3
}
fn d_cooldown_turns() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    #[serde(default = "d_max_entries_per_session")]
    pub max_entries_per_session: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_entries_per_session: d_max_entries_per_session(),
        }
    }
}

fn d_max_entries_per_session() -> u32 {
    2_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBudgetConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_max_injection_tokens")]
    pub max_injection_tokens: u32,
    #[serde(default = "d_hard_limit_percent")]
    pub hard_limit_percent: f32,
    #[serde(default = "d_compaction_threshold_percent")]
    pub compaction_threshold_percent: f32,
    #[serde(default)]
    pub compaction_circuit_breaker: CompactionCircuitBreakerConfig,
    #[serde(default)]
    pub arena: ArenaConfig,
}

impl Default for ContextBudgetConfig {
    fn default() -> Self {
        Self {
            enabled: d_true(),
            max_injection_tokens: d_max_injection_tokens(),
            hard_limit_percent: d_hard_limit_percent(),
            compaction_threshold_percent: d_compaction_threshold_percent(),
            compaction_circuit_breaker: CompactionCircuitBreakerConfig::default(),
            arena: ArenaConfig::default(),
        }
    }
}

fn d_max_injection_tokens() -> u32 {
    24_000
}
fn d_hard_limit_percent() -> f32 {
    0.95
}
fn d_compaction_threshold_percent() -> f32 {
    0.80
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event tape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_events_dir")]
    pub dir: PathBuf,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: d_true(),
            dir: d_events_dir(),
        }
    }
}

fn d_events_dir() -> PathBuf {
    PathBuf::from("events")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshots (task ledger + truth ledger projections). Not named in the
// spec's config bullet list but required plumbing for the snapshot
// store described in module B; kept alongside events since both are
// paths under the workspace root.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotsConfig {
    #[serde(default = "d_snapshots_dir")]
    pub dir: PathBuf,
}

impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            dir: d_snapshots_dir(),
        }
    }
}

fn d_snapshots_dir() -> PathBuf {
    PathBuf::from("snapshots")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cost tracking
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostExceedAction {
    Warn,
    BlockTools,
}

impl Default for CostExceedAction {
    fn default() -> Self {
        CostExceedAction::Warn
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostTrackingConfig {
    #[serde(default)]
    pub action_on_exceed: CostExceedAction,
    #[serde(default)]
    pub max_cost_usd_per_session: Option<f64>,
    /// Soft warn threshold in USD; crossing it emits a `session_threshold`
    /// alert without blocking tools. Defaults to 80% of the hard cap when a
    /// cap is configured, otherwise unset (no soft warning).
    #[serde(default)]
    pub warn_threshold_usd: Option<f64>,
}

impl Default for CostTrackingConfig {
    fn default() -> Self {
        Self {
            action_on_exceed: CostExceedAction::default(),
            max_cost_usd_per_session: None,
            warn_threshold_usd: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool failure injection (bounds how much of a failing tool's own
// output gets folded back into context, not a chaos-testing knob)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFailureInjectionConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_max_entries")]
    pub max_entries: u32,
    #[serde(default = "d_max_output_chars")]
    pub max_output_chars: u32,
}

impl Default for ToolFailureInjectionConfig {
    fn default() -> Self {
        Self {
            enabled: d_true(),
            max_entries: d_max_entries(),
            max_output_chars: d_max_output_chars(),
        }
    }
}

fn d_max_entries() -> u32 {
    20
}
fn d_max_output_chars() -> u32 {
    2_000
}

fn d_true() -> bool {
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InfrastructureConfig {
    #[serde(default)]
    pub context_budget: ContextBudgetConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub snapshots: SnapshotsConfig,
    #[serde(default)]
    pub cost_tracking: CostTrackingConfig,
    #[serde(default)]
    pub tool_failure_injection: ToolFailureInjectionConfig,
}
