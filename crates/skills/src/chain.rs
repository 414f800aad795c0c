//! Chain Planner (spec §4.I "Chain Planner").
//!
//! Resolves a primary skill's unmet `consumes` against other skills'
//! `outputs`, choosing one producer per unmet input by the priority order
//! the spec fixes: explicit composability, then cost, then stability,
//! then name.

use sa_domain::skill::{CostHint, SkillContract, Stability};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainPlan {
    /// Prerequisites in resolution order, followed by the primary's name.
    pub chain: Vec<String>,
    pub prerequisites: Vec<String>,
    pub unresolved_consumes: Vec<String>,
}

fn cost_rank(h: CostHint) -> u8 {
    match h {
        CostHint::Low => 0,
        CostHint::Medium => 1,
        CostHint::High => 2,
    }
}

fn stability_rank(s: Stability) -> u8 {
    match s {
        Stability::Stable => 0,
        Stability::Experimental => 1,
        Stability::Deprecated => 2,
    }
}

fn composable_rank(primary: &SkillContract, candidate: &SkillContract) -> u8 {
    if primary.composable_with.iter().any(|n| n == &candidate.name) {
        0
    } else if candidate.composable_with.iter().any(|n| n == &primary.name) {
        1
    } else {
        2
    }
}

fn select_producer<'a>(primary: &SkillContract, producers: &[&'a SkillContract]) -> &'a SkillContract {
    producers
        .iter()
        .copied()
        .min_by(|a, b| {
            composable_rank(primary, a)
                .cmp(&composable_rank(primary, b))
                .then_with(|| cost_rank(a.cost_hint).cmp(&cost_rank(b.cost_hint)))
                .then_with(|| stability_rank(a.stability).cmp(&stability_rank(b.stability)))
                .then_with(|| a.name.cmp(&b.name))
        })
        .expect("producers is non-empty")
}

/// Resolve `primary.consumes` against `index` (every known skill contract,
/// primary included). `available_outputs` are outputs already satisfied by
/// the turn's context (e.g. already-loaded skills or upstream state) and
/// need no producer.
pub fn plan_chain(primary: &SkillContract, index: &[SkillContract], available_outputs: &HashSet<String>) -> ChainPlan {
    let mut satisfied = available_outputs.clone();
    let mut prerequisites = Vec::new();
    let mut unresolved = Vec::new();

    for consume in &primary.consumes {
        if satisfied.contains(consume) {
            continue;
        }
        let producers: Vec<&SkillContract> = index
            .iter()
            .filter(|s| s.name != primary.name && s.outputs.iter().any(|o| o == consume))
            .collect();
        if producers.is_empty() {
            unresolved.push(consume.clone());
            continue;
        }
        let chosen = select_producer(primary, &producers);
        if !prerequisites.contains(&chosen.name) {
            prerequisites.push(chosen.name.clone());
        }
        satisfied.extend(chosen.outputs.iter().cloned());
    }

    let mut chain = prerequisites.clone();
    chain.push(primary.name.clone());
    ChainPlan {
        chain,
        prerequisites,
        unresolved_consumes: unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::skill::{Budget, DispatchMode, Dispatch, Tier, ToolsPolicy};

    fn contract(name: &str, outputs: &[&str], consumes: &[&str], composable_with: &[&str], cost: CostHint, stability: Stability) -> SkillContract {
        SkillContract {
            name: name.to_string(),
            tier: Tier::Base,
            tags: vec![],
            anti_tags: vec![],
            triggers: None,
            dispatch: Some(Dispatch { gate_threshold: 12.0, auto_threshold: 20.0, default_mode: DispatchMode::Suggest }),
            tools: ToolsPolicy::default(),
            budget: Budget::default(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            composable_with: composable_with.iter().map(|s| s.to_string()).collect(),
            consumes: consumes.iter().map(|s| s.to_string()).collect(),
            escalation_path: None,
            max_parallel: None,
            stability,
            cost_hint: cost,
            requires: Default::default(),
            install: vec![],
        }
    }

    #[test]
    fn resolves_single_producer() {
        let primary = contract("patching", &[], &["diagnosis"], &[], CostHint::Medium, Stability::Stable);
        let producer = contract("diagnose", &["diagnosis"], &[], &[], CostHint::Medium, Stability::Stable);
        let index = vec![primary.clone(), producer.clone()];
        let plan = plan_chain(&primary, &index, &HashSet::new());
        assert_eq!(plan.prerequisites, vec!["diagnose".to_string()]);
        assert_eq!(plan.chain, vec!["diagnose".to_string(), "patching".to_string()]);
        assert!(plan.unresolved_consumes.is_empty());
    }

    #[test]
    fn prefers_explicit_composable_with_producer() {
        let primary = contract("patching", &[], &["diagnosis"], &["preferred-diagnose"], CostHint::Medium, Stability::Stable);
        let other = contract("other-diagnose", &["diagnosis"], &[], &[], CostHint::Low, Stability::Stable);
        let preferred = contract("preferred-diagnose", &["diagnosis"], &[], &[], CostHint::High, Stability::Deprecated);
        let index = vec![primary.clone(), other, preferred];
        let plan = plan_chain(&primary, &index, &HashSet::new());
        assert_eq!(plan.prerequisites, vec!["preferred-diagnose".to_string()]);
    }

    #[test]
    fn falls_back_to_lower_cost_then_stability_then_name() {
        let primary = contract("primary", &[], &["x"], &[], CostHint::Medium, Stability::Stable);
        let cheap = contract("cheap", &["x"], &[], &[], CostHint::Low, Stability::Experimental);
        let stable = contract("stable-expensive", &["x"], &[], &[], CostHint::High, Stability::Stable);
        let index = vec![primary.clone(), cheap, stable];
        let plan = plan_chain(&primary, &index, &HashSet::new());
        assert_eq!(plan.prerequisites, vec!["cheap".to_string()]);
    }

    #[test]
    fn already_satisfied_output_needs_no_producer() {
        let primary = contract("primary", &[], &["x"], &[], CostHint::Medium, Stability::Stable);
        let mut satisfied = HashSet::new();
        satisfied.insert("x".to_string());
        let plan = plan_chain(&primary, &[primary.clone()], &satisfied);
        assert!(plan.prerequisites.is_empty());
        assert_eq!(plan.chain, vec!["primary".to_string()]);
    }

    #[test]
    fn unresolvable_consume_is_reported() {
        let primary = contract("primary", &[], &["missing"], &[], CostHint::Medium, Stability::Stable);
        let plan = plan_chain(&primary, &[primary.clone()], &HashSet::new());
        assert_eq!(plan.unresolved_consumes, vec!["missing".to_string()]);
    }
}
