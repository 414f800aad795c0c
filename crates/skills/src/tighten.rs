//! Contract Tightening (spec §4.J): merges a base-tier contract with an
//! optional pack-tier override and an optional project-tier override,
//! producing one effective `SkillContract`. Each tier may only *restrict*
//! what the one below it allows — this module enforces that invariant
//! rather than trusting the override author.

use sa_domain::skill::{Budget, Dispatch, SkillContract, ToolsPolicy, Triggers};
use std::collections::HashSet;

/// A tier's partial override of the tier below. Every field is optional;
/// an absent field inherits the lower tier's value unchanged.
#[derive(Debug, Clone, Default)]
pub struct ContractOverride {
    pub tags: Option<Vec<String>>,
    pub anti_tags: Option<Vec<String>>,
    pub triggers: Option<Triggers>,
    pub dispatch: Option<Dispatch>,
    pub tools: Option<ToolsPolicy>,
    pub budget: Option<Budget>,
    pub denied_tools: Option<Vec<String>>,
}

fn dedup(mut v: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    v.retain(|s| seen.insert(s.clone()));
    v
}

/// Tighten `base.tools` with an override's `tools`, enforcing:
/// `optional ⊆ base.optional \ base.denied`, `required ⊆ base.required ∪
/// base.optional`, and `denied` only grows (base's denials are never
/// un-denied by an override).
fn tighten_tools(base: &ToolsPolicy, over: Option<&ToolsPolicy>) -> ToolsPolicy {
    let Some(over) = over else { return base.clone() };

    let base_denied: HashSet<&str> = base.denied.iter().map(String::as_str).collect();
    let base_optional: HashSet<&str> = base.optional.iter().map(String::as_str).collect();
    let base_required: HashSet<&str> = base.required.iter().map(String::as_str).collect();
    let allowed_base: HashSet<&str> = base_required.union(&base_optional).copied().collect();

    let required: Vec<String> = over
        .required
        .iter()
        .filter(|t| allowed_base.contains(t.as_str()))
        .cloned()
        .collect();

    let optional: Vec<String> = over
        .optional
        .iter()
        .filter(|t| base_optional.contains(t.as_str()) && !base_denied.contains(t.as_str()))
        .cloned()
        .collect();

    let mut denied = base.denied.clone();
    denied.extend(over.denied.iter().cloned());

    ToolsPolicy {
        required: dedup(required),
        optional: dedup(optional),
        denied: dedup(denied),
    }
}

/// Tighten dispatch thresholds: an override may only raise them, never
/// lower them, then the invariant `auto_threshold >= gate_threshold` is
/// re-normalized after the raise.
fn tighten_dispatch(base: &Dispatch, over: Option<&Dispatch>) -> Dispatch {
    let Some(over) = over else { return base.clone() };
    let gate_threshold = base.gate_threshold.max(over.gate_threshold);
    let auto_threshold = base.auto_threshold.max(over.auto_threshold).max(gate_threshold);
    Dispatch {
        gate_threshold,
        auto_threshold,
        default_mode: over.default_mode,
    }
}

/// Tighten a budget: the effective budget is the pointwise minimum of
/// base and override (an override can only spend less, never more).
fn tighten_budget(base: Budget, over: Option<Budget>) -> Budget {
    match over {
        Some(over) => Budget {
            max_tool_calls: base.max_tool_calls.min(over.max_tool_calls),
            max_tokens: base.max_tokens.min(over.max_tokens),
        },
        None => base,
    }
}

/// Apply one override tier to `base`, returning the tightened contract.
/// `triggers` and `tags`/`anti_tags` are all-or-nothing: an override that
/// supplies the field replaces it wholly rather than merging element-wise
/// (per spec §4.J, these are not restriction-checked — only tools,
/// dispatch thresholds, and budgets are).
pub fn apply_override(base: &SkillContract, over: &ContractOverride) -> SkillContract {
    let mut out = base.clone();

    if let Some(tags) = &over.tags {
        out.tags = tags.clone();
    }
    if let Some(anti_tags) = &over.anti_tags {
        out.anti_tags = anti_tags.clone();
    }
    if let Some(triggers) = &over.triggers {
        out.triggers = Some(triggers.clone());
    }

    let mut tools = tighten_tools(&out.tools, over.tools.as_ref());
    if let Some(extra_denied) = &over.denied_tools {
        let mut denied = tools.denied.clone();
        denied.extend(extra_denied.iter().cloned());
        tools.denied = dedup(denied);
        tools.required.retain(|t| !tools.denied.contains(t));
        tools.optional.retain(|t| !tools.denied.contains(t));
    }
    out.tools = tools;

    if let Some(over_dispatch) = &over.dispatch {
        let base_dispatch = out.dispatch.clone().unwrap_or_default();
        out.dispatch = Some(tighten_dispatch(&base_dispatch, Some(over_dispatch)));
    }

    out.budget = tighten_budget(out.budget, over.budget);

    out
}

/// Fold base → pack → project overrides into one effective contract.
/// Either override may be absent (no pack/project tier applies).
pub fn tighten(base: &SkillContract, pack: Option<&ContractOverride>, project: Option<&ContractOverride>) -> SkillContract {
    let mut effective = base.clone();
    if let Some(pack) = pack {
        effective = apply_override(&effective, pack);
    }
    if let Some(project) = project {
        effective = apply_override(&effective, project);
    }
    effective
}
