//! Tool Gate (spec §4.K, component K).
//!
//! Grounded on `crates/gateway/src/runtime/tools.rs`'s `build_tool_definitions`
//! filtering via `ToolPolicy::allows`, generalized from a static
//! allow/deny filter into the five-step per-call evaluation spec §4.K
//! requires: compaction gate, dispatch gate, active-skill denylist,
//! per-skill budgets, then the session-wide cost budget. A removed tool
//! (`bash`/`shell`) is always denied with a migration hint, mirroring the
//! teacher's alias-table handling of those same names.

use sa_cost::UsageDelta;
use sa_domain::config::SecurityMode;
use sa_domain::cost::BudgetState;
use sa_domain::skill::SkillContract;
use sa_pressure::{GateReason, GateStatus};
use sa_skills::aliases::ToolAliasMap;
use sa_skills::dispatch::{gate_policy, DispatchGatePolicy, DispatchGateState};

/// Machine-readable deny/warn event names (spec §7).
pub mod events {
    pub const COMPACTION_GATE_BLOCKED_TOOL: &str = "context_compaction_gate_blocked_tool";
    pub const DISPATCH_GATE_BLOCKED_TOOL: &str = "skill_dispatch_gate_blocked_tool";
    pub const DISPATCH_GATE_WARNING: &str = "skill_dispatch_gate_warning";
    pub const COST_BUDGET_BLOCKED_TOOL: &str = "cost_budget_blocked_tool";
    pub const REMOVED_TOOL_DENIED: &str = "removed_tool_denied";
    pub const SKILL_DENYLIST_BLOCKED_TOOL: &str = "skill_denylist_blocked_tool";
    pub const SKILL_BUDGET_BLOCKED_TOOL: &str = "skill_budget_blocked_tool";
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolGateDecision {
    pub allowed: bool,
    /// Human-readable reason naming the rule that decided (spec §7).
    pub reason: Option<String>,
    /// Machine-readable event name, present on both deny and warn paths.
    pub event: Option<&'static str>,
}

impl ToolGateDecision {
    fn allow() -> Self {
        Self { allowed: true, reason: None, event: None }
    }

    fn deny(reason: impl Into<String>, event: &'static str) -> Self {
        Self { allowed: false, reason: Some(reason.into()), event: Some(event) }
    }

    fn allow_with_warning(reason: impl Into<String>, event: &'static str) -> Self {
        Self { allowed: true, reason: Some(reason.into()), event: Some(event) }
    }
}

/// Resolved per-skill consumption counted against `SkillContract.budget`
/// so far this turn/session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkillUsage {
    pub tool_calls: u32,
    pub tokens: u64,
}

/// Everything the gate needs to evaluate one tool-start call (spec §4.K).
pub struct ToolGateRequest<'a> {
    pub tool_name: &'a str,
    pub compaction_gate: &'a GateStatus,
    pub dispatch_gate: &'a DispatchGateState,
    pub security_mode: SecurityMode,
    pub active_contract: Option<&'a SkillContract>,
    pub skill_usage: SkillUsage,
    pub cost_budget: &'a BudgetState,
    pub alias_map: &'a ToolAliasMap,
}

const REMOVED_TOOLS: &[&str] = &["bash", "shell"];

/// Evaluate one tool-start call against all five gate layers, in the order
/// spec §4.K specifies. Returns as soon as a layer decides; only a
/// standard-mode dispatch-gate warning can be `allowed=true` with a
/// non-`None` event.
pub fn evaluate(req: &ToolGateRequest) -> ToolGateDecision {
    let canonical = req.alias_map.resolve(req.tool_name);

    if REMOVED_TOOLS.contains(&req.tool_name) {
        return ToolGateDecision::deny(
            format!("tool '{}' was removed; use '{}' instead", req.tool_name, canonical),
            events::REMOVED_TOOL_DENIED,
        );
    }

    // (1) Compaction gate.
    if req.compaction_gate.required && !is_lifecycle_tool(req.tool_name) {
        let reason = match req.compaction_gate.reason {
            Some(GateReason::CircuitOpen) => "compaction circuit breaker open (reason=circuit_open)".to_string(),
            Some(GateReason::HardLimit) => "context usage at hard limit; session_compact required".to_string(),
            Some(GateReason::UsagePressure) => "context usage pressure high; session_compact required".to_string(),
            Some(GateReason::PendingRequest) => "a queued compaction has not completed yet".to_string(),
            None => "compaction gate armed".to_string(),
        };
        return ToolGateDecision::deny(reason, events::COMPACTION_GATE_BLOCKED_TOOL);
    }

    // (2) Dispatch gate.
    if req.dispatch_gate.tool_is_blocked(req.tool_name) {
        let recommended = req.dispatch_gate.recommended_skill.as_deref().unwrap_or("?");
        let reason = format!("skill_load required before non-lifecycle tools (recommended skill: {recommended})");
        return match gate_policy(req.security_mode) {
            DispatchGatePolicy::Deny => ToolGateDecision::deny(reason, events::DISPATCH_GATE_BLOCKED_TOOL),
            DispatchGatePolicy::AllowWithWarning => {
                ToolGateDecision::allow_with_warning(reason, events::DISPATCH_GATE_WARNING)
            }
            DispatchGatePolicy::AllowSilently => ToolGateDecision::allow(),
        };
    }

    // (3) Active-skill denylist.
    if let Some(contract) = req.active_contract {
        if contract.tools.denied.iter().any(|t| req.alias_map.matches(req.tool_name, t) || t == canonical) {
            return ToolGateDecision::deny(
                format!("skill '{}' denies tool '{}'", contract.name, req.tool_name),
                events::SKILL_DENYLIST_BLOCKED_TOOL,
            );
        }

        // (4) Per-skill budgets.
        if req.skill_usage.tool_calls >= contract.budget.max_tool_calls {
            return ToolGateDecision::deny(
                format!(
                    "skill '{}' tool-call budget exhausted ({}/{})",
                    contract.name, req.skill_usage.tool_calls, contract.budget.max_tool_calls
                ),
                events::SKILL_BUDGET_BLOCKED_TOOL,
            );
        }
        if req.skill_usage.tokens >= contract.budget.max_tokens as u64 {
            return ToolGateDecision::deny(
                format!(
                    "skill '{}' token budget exhausted ({}/{})",
                    contract.name, req.skill_usage.tokens, contract.budget.max_tokens
                ),
                events::SKILL_BUDGET_BLOCKED_TOOL,
            );
        }
    }

    // (5) Session-wide cost budget.
    if req.cost_budget.blocked {
        return ToolGateDecision::deny(
            "session cost budget exceeded and action_on_exceed=block_tools".to_string(),
            events::COST_BUDGET_BLOCKED_TOOL,
        );
    }

    ToolGateDecision::allow()
}

fn is_lifecycle_tool(tool_name: &str) -> bool {
    sa_skills::dispatch::LIFECYCLE_TOOLS.contains(&tool_name) || tool_name == "session_compact"
}

/// Allocate a tool-call's share of the session cost tracker's `tools` map
/// (spec §3.8 `tools{tool→{callCount, allocatedTokens, allocatedCostUsd}}`).
/// Kept here, next to the gate, since the gate is the caller that knows a
/// tool call actually ran.
pub fn allocation_delta(tokens: u64, cost_usd: f64) -> UsageDelta {
    UsageDelta { input_tokens: tokens, output_tokens: 0, cache_read_tokens: 0, cache_write_tokens: 0, cost_usd }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::skill::{Budget, Dispatch, Stability, Tier, ToolsPolicy};
    use sa_pressure::PressureLevel;

    fn open_compaction_gate() -> GateStatus {
        GateStatus { required: false, reason: None, pressure: PressureLevel::None, usage_percent: 0.1, hard_limit_percent: 0.8 }
    }

    fn contract(name: &str, denied: &[&str]) -> SkillContract {
        SkillContract {
            name: name.to_string(),
            tier: Tier::Base,
            tags: vec![],
            anti_tags: vec![],
            triggers: None,
            dispatch: Some(Dispatch::default()),
            tools: ToolsPolicy { required: vec![], optional: vec![], denied: denied.iter().map(|s| s.to_string()).collect() },
            budget: Budget { max_tool_calls: 2, max_tokens: 1000 },
            outputs: vec![],
            composable_with: vec![],
            consumes: vec![],
            escalation_path: None,
            max_parallel: None,
            stability: Stability::Stable,
            cost_hint: sa_domain::skill::CostHint::Medium,
            requires: Default::default(),
            install: vec![],
        }
    }

    fn request<'a>(
        tool_name: &'a str,
        compaction: &'a GateStatus,
        dispatch: &'a DispatchGateState,
        contract: Option<&'a SkillContract>,
        usage: SkillUsage,
        cost: &'a BudgetState,
        alias_map: &'a ToolAliasMap,
    ) -> ToolGateRequest<'a> {
        ToolGateRequest {
            tool_name,
            compaction_gate: compaction,
            dispatch_gate: dispatch,
            security_mode: SecurityMode::Strict,
            active_contract: contract,
            skill_usage: usage,
            cost_budget: cost,
            alias_map,
        }
    }

    #[test]
    fn removed_tool_always_denied_with_migration_hint() {
        let compaction = open_compaction_gate();
        let dispatch = DispatchGateState::default();
        let cost = BudgetState::default();
        let aliases = ToolAliasMap::default_openclaw();
        let decision = evaluate(&request("bash", &compaction, &dispatch, None, SkillUsage::default(), &cost, &aliases));
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("exec"));
    }

    #[test]
    fn dispatch_gate_blocks_write_when_skill_denies_it() {
        let compaction = open_compaction_gate();
        let dispatch = DispatchGateState::default();
        let cost = BudgetState::default();
        let aliases = ToolAliasMap::default_openclaw();
        let patching = contract("patching", &["write"]);
        let decision = evaluate(&request("write", &compaction, &dispatch, Some(&patching), SkillUsage::default(), &cost, &aliases));
        assert!(!decision.allowed);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("patching") && reason.contains("write"));
    }

    #[test]
    fn strict_mode_denies_non_lifecycle_while_gate_armed() {
        let compaction = open_compaction_gate();
        let mut dispatch = DispatchGateState::default();
        dispatch.arm("review");
        let cost = BudgetState::default();
        let aliases = ToolAliasMap::default_openclaw();

        let exec_decision = evaluate(&request("exec", &compaction, &dispatch, None, SkillUsage::default(), &cost, &aliases));
        assert!(!exec_decision.allowed);

        let load_decision = evaluate(&request("skill_load", &compaction, &dispatch, None, SkillUsage::default(), &cost, &aliases));
        assert!(load_decision.allowed);
    }

    #[test]
    fn standard_mode_allows_with_warning_while_gate_armed() {
        let compaction = open_compaction_gate();
        let mut dispatch = DispatchGateState::default();
        dispatch.arm("review");
        let cost = BudgetState::default();
        let aliases = ToolAliasMap::default_openclaw();
        let mut req = request("read", &compaction, &dispatch, None, SkillUsage::default(), &cost, &aliases);
        req.security_mode = SecurityMode::Standard;
        let decision = evaluate(&req);
        assert!(decision.allowed);
        assert_eq!(decision.event, Some(events::DISPATCH_GATE_WARNING));
    }

    #[test]
    fn compaction_gate_takes_precedence_over_dispatch_gate() {
        let compaction = GateStatus {
            required: true,
            reason: Some(GateReason::CircuitOpen),
            pressure: PressureLevel::Critical,
            usage_percent: 1.0,
            hard_limit_percent: 0.8,
        };
        let dispatch = DispatchGateState::default();
        let cost = BudgetState::default();
        let aliases = ToolAliasMap::default_openclaw();
        let decision = evaluate(&request("read", &compaction, &dispatch, None, SkillUsage::default(), &cost, &aliases));
        assert!(!decision.allowed);
        assert_eq!(decision.event, Some(events::COMPACTION_GATE_BLOCKED_TOOL));
    }

    #[test]
    fn skill_budget_exhausted_blocks_further_calls() {
        let compaction = open_compaction_gate();
        let dispatch = DispatchGateState::default();
        let cost = BudgetState::default();
        let aliases = ToolAliasMap::default_openclaw();
        let skill = contract("patching", &[]);
        let usage = SkillUsage { tool_calls: 2, tokens: 0 };
        let decision = evaluate(&request("write", &compaction, &dispatch, Some(&skill), usage, &cost, &aliases));
        assert!(!decision.allowed);
        assert_eq!(decision.event, Some(events::SKILL_BUDGET_BLOCKED_TOOL));
    }

    #[test]
    fn cost_budget_blocked_denies_remaining_tools() {
        let compaction = open_compaction_gate();
        let dispatch = DispatchGateState::default();
        let mut cost = BudgetState::default();
        cost.blocked = true;
        let aliases = ToolAliasMap::default_openclaw();
        let decision = evaluate(&request("read", &compaction, &dispatch, None, SkillUsage::default(), &cost, &aliases));
        assert!(!decision.allowed);
        assert_eq!(decision.event, Some(events::COST_BUDGET_BLOCKED_TOOL));
    }
}
