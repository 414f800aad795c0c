//! Cost Tracker (spec §4.L, component L).
//!
//! Grounded on the teacher's `QuotaTracker`
//! (`crates/gateway/src/runtime/quota.rs`): a lock-protected, in-memory
//! per-key running total checked against configured limits. Here the key is
//! the session's `CostSummary` itself rather than a `HashMap<agent, _>`,
//! since cost is tracked per-session, but the shape — accumulate, then
//! check against a resolved limit — is the same.

use sa_domain::config::{CostExceedAction, CostTrackingConfig};
use sa_domain::cost::{
    BudgetAction, BudgetState, CostAlert, CostAlertKind, CostSummary, ModelTotals, SkillTotals,
    ToolTotals,
};

/// One assistant-turn usage delta to fold into the session's cost summary.
#[derive(Debug, Clone, Default)]
pub struct UsageDelta {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub cost_usd: f64,
}

impl UsageDelta {
    fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_write_tokens
    }
}

/// Per-skill token budget consulted for the `skill_cap` alert, resolved by
/// the caller from the active `SkillContract.budget.max_tokens` (spec §3.7).
pub struct SkillBudget {
    pub skill: String,
    pub max_tokens: Option<u64>,
}

/// Fold one assistant usage observation into `summary`, updating model and
/// (optionally) skill totals, the `(skill, turn)` de-dup invariant on
/// `turns`, and any budget alerts. Returns the new/updated `BudgetState`.
pub fn record_assistant_usage(
    summary: &mut CostSummary,
    config: &CostTrackingConfig,
    model: &str,
    skill: Option<&SkillBudget>,
    turn: u64,
    timestamp: i64,
    delta: &UsageDelta,
) {
    summary.input_tokens += delta.input_tokens;
    summary.output_tokens += delta.output_tokens;
    summary.cache_read_tokens += delta.cache_read_tokens;
    summary.cache_write_tokens += delta.cache_write_tokens;
    summary.total_tokens += delta.total_tokens();
    summary.total_cost_usd += delta.cost_usd;

    let model_totals = summary.models.entry(model.to_string()).or_insert_with(ModelTotals::default);
    model_totals.input_tokens += delta.input_tokens;
    model_totals.output_tokens += delta.output_tokens;
    model_totals.cache_read_tokens += delta.cache_read_tokens;
    model_totals.cache_write_tokens += delta.cache_write_tokens;
    model_totals.total_tokens += delta.total_tokens();
    model_totals.cost_usd += delta.cost_usd;

    if let Some(skill_budget) = skill {
        let entry = summary
            .skills
            .entry(skill_budget.skill.clone())
            .or_insert_with(SkillTotals::default);
        entry.total_tokens += delta.total_tokens();
        entry.cost_usd += delta.cost_usd;
        entry.usage_count += 1;
        // `(skill, turn)` de-dup invariant (spec §3.8): same-turn updates
        // do not double count `turns`.
        if entry.seen_turns.insert(turn) {
            entry.turns += 1;
        }
    }

    evaluate_budget(summary, config, skill, timestamp);
}

/// Fold one tool-call cost allocation into `summary.tools`.
pub fn record_tool_usage(summary: &mut CostSummary, tool: &str, allocated_tokens: u64, allocated_cost_usd: f64) {
    let entry = summary.tools.entry(tool.to_string()).or_insert_with(ToolTotals::default);
    entry.call_count += 1;
    entry.allocated_tokens += allocated_tokens;
    entry.allocated_cost_usd += allocated_cost_usd;
}

fn evaluate_budget(
    summary: &mut CostSummary,
    config: &CostTrackingConfig,
    skill: Option<&SkillBudget>,
    timestamp: i64,
) {
    summary.budget.action = match config.action_on_exceed {
        CostExceedAction::Warn => BudgetAction::Warn,
        CostExceedAction::BlockTools => BudgetAction::BlockTools,
    };

    if let Some(warn_at) = config.warn_threshold_usd {
        if summary.total_cost_usd >= warn_at && !summary.budget.session_exceeded {
            push_alert_once(
                summary,
                CostAlertKind::SessionThreshold,
                format!("session cost ${:.4} crossed warn threshold ${:.4}", summary.total_cost_usd, warn_at),
                timestamp,
            );
        }
    }

    if let Some(cap) = config.max_cost_usd_per_session {
        if summary.total_cost_usd >= cap {
            summary.budget.session_exceeded = true;
            push_alert_once(
                summary,
                CostAlertKind::SessionCap,
                format!("session cost ${:.4} reached cap ${:.4}", summary.total_cost_usd, cap),
                timestamp,
            );
        }
    }

    if let Some(skill_budget) = skill {
        if let Some(max_tokens) = skill_budget.max_tokens {
            if let Some(totals) = summary.skills.get(&skill_budget.skill) {
                if totals.total_tokens >= max_tokens {
                    summary.budget.skill_exceeded = true;
                    push_alert_once(
                        summary,
                        CostAlertKind::SkillCap,
                        format!(
                            "skill '{}' tokens {} reached cap {}",
                            skill_budget.skill, totals.total_tokens, max_tokens
                        ),
                        timestamp,
                    );
                }
            }
        }
    }

    summary.budget.blocked = matches!(summary.budget.action, BudgetAction::BlockTools)
        && (summary.budget.session_exceeded || summary.budget.skill_exceeded);
}

/// De-duplicate identical alert kinds+message within the same summary.
fn push_alert_once(summary: &mut CostSummary, kind: CostAlertKind, message: String, timestamp: i64) {
    if summary.alerts.iter().any(|a| a.kind == kind && a.message == message) {
        return;
    }
    summary.alerts.push(CostAlert { kind, message, timestamp });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(cost: f64) -> UsageDelta {
        UsageDelta {
            input_tokens: 100,
            output_tokens: 50,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
            cost_usd: cost,
        }
    }

    #[test]
    fn accumulates_model_and_session_totals() {
        let mut summary = CostSummary::default();
        let config = CostTrackingConfig::default();
        record_assistant_usage(&mut summary, &config, "claude-x", None, 1, 0, &delta(0.01));
        record_assistant_usage(&mut summary, &config, "claude-x", None, 2, 0, &delta(0.02));
        assert_eq!(summary.total_tokens, 300);
        assert!((summary.total_cost_usd - 0.03).abs() < 1e-9);
        assert_eq!(summary.models["claude-x"].total_tokens, 300);
    }

    #[test]
    fn same_turn_skill_updates_do_not_double_count_turns() {
        let mut summary = CostSummary::default();
        let config = CostTrackingConfig::default();
        let skill = SkillBudget { skill: "patching".into(), max_tokens: None };
        record_assistant_usage(&mut summary, &config, "m", Some(&skill), 5, 0, &delta(0.0));
        record_assistant_usage(&mut summary, &config, "m", Some(&skill), 5, 0, &delta(0.0));
        record_assistant_usage(&mut summary, &config, "m", Some(&skill), 6, 0, &delta(0.0));
        let totals = &summary.skills["patching"];
        assert_eq!(totals.turns, 2);
        assert_eq!(totals.usage_count, 3);
    }

    #[test]
    fn session_cap_sets_exceeded_and_blocks_when_configured() {
        let mut summary = CostSummary::default();
        let mut config = CostTrackingConfig::default();
        config.max_cost_usd_per_session = Some(1.0);
        config.action_on_exceed = CostExceedAction::BlockTools;
        record_assistant_usage(&mut summary, &config, "m", None, 1, 0, &delta(1.5));
        assert!(summary.budget.session_exceeded);
        assert!(summary.budget.blocked);
        assert!(summary.alerts.iter().any(|a| a.kind == CostAlertKind::SessionCap));
    }

    #[test]
    fn warn_threshold_emits_alert_without_blocking() {
        let mut summary = CostSummary::default();
        let mut config = CostTrackingConfig::default();
        config.warn_threshold_usd = Some(0.5);
        record_assistant_usage(&mut summary, &config, "m", None, 1, 0, &delta(0.6));
        assert!(summary.alerts.iter().any(|a| a.kind == CostAlertKind::SessionThreshold));
        assert!(!summary.budget.blocked);
    }

    #[test]
    fn skill_cap_exceeded_sets_skill_exceeded() {
        let mut summary = CostSummary::default();
        let mut config = CostTrackingConfig::default();
        config.action_on_exceed = CostExceedAction::BlockTools;
        let skill = SkillBudget { skill: "review".into(), max_tokens: Some(100) };
        record_assistant_usage(&mut summary, &config, "m", Some(&skill), 1, 0, &delta(0.0));
        assert!(summary.budget.skill_exceeded);
        assert!(summary.budget.blocked);
    }

    #[test]
    fn tool_usage_accumulates_call_count() {
        let mut summary = CostSummary::default();
        record_tool_usage(&mut summary, "exec", 100, 0.001);
        record_tool_usage(&mut summary, "exec", 50, 0.0005);
        assert_eq!(summary.tools["exec"].call_count, 2);
        assert_eq!(summary.tools["exec"].allocated_tokens, 150);
    }
}
