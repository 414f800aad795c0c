//! Dispatch Resolver (spec §4.I "Dispatch Resolver") and the Dispatch Gate
//! reconciliation state machine it feeds (spec §4.I "Dispatch Gate
//! enforcement").

use crate::selector::Selection;
use sa_domain::config::SecurityMode;
use sa_domain::skill::{Dispatch, DispatchMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedMode {
    None,
    Gate,
    Auto,
    Suggest,
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchDecision {
    pub mode: ResolvedMode,
    pub confidence: f32,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
}

/// Rough ceiling on the lexical score used to scale confidence within the
/// `auto` band (name 10 + intent 8 + phrase 7 + tags 9 + cost 1). Topics are
/// surfaced in the selector's reason string but carry no weight-table entry,
/// so they don't factor into this ceiling.
const MAX_SCORE: f32 = 35.0;

fn clamp01(v: f32) -> f32 {
    v.max(0.0).min(1.0)
}

/// Compute the dispatch decision for the top selection against `dispatch`
/// policy (spec §4.I "Dispatch Resolver").
pub fn resolve_dispatch(selections: &[Selection], dispatch: &Dispatch) -> DispatchDecision {
    let Some(top) = selections.first() else {
        return DispatchDecision {
            mode: ResolvedMode::None,
            confidence: 0.0,
            reason: "no skill selections".to_string(),
            skill: None,
        };
    };

    let gate_threshold = dispatch.gate_threshold;
    let auto_threshold = dispatch.auto_threshold;
    let default_mode = dispatch.default_mode;
    let score = top.score;

    if score >= auto_threshold {
        let span = (MAX_SCORE - auto_threshold).max(1.0);
        let confidence = 0.85 + 0.15 * clamp01((score - auto_threshold) / span);
        return DispatchDecision {
            mode: ResolvedMode::Auto,
            confidence,
            reason: format!("score {score:.1} >= auto_threshold {auto_threshold:.1}"),
            skill: Some(top.name.clone()),
        };
    }

    if score >= gate_threshold {
        let span = (auto_threshold - gate_threshold).max(0.01);
        let confidence = 0.55 + 0.30 * clamp01((score - gate_threshold) / span);
        return DispatchDecision {
            mode: ResolvedMode::Gate,
            confidence,
            reason: format!("score {score:.1} >= gate_threshold {gate_threshold:.1}, below auto_threshold {auto_threshold:.1}"),
            skill: Some(top.name.clone()),
        };
    }

    let confidence = 0.1 + 0.4 * clamp01(score / gate_threshold.max(0.01));
    let mode = match default_mode {
        DispatchMode::Suggest => ResolvedMode::Suggest,
        DispatchMode::Gate => ResolvedMode::Gate,
        DispatchMode::Auto => ResolvedMode::Auto,
    };
    DispatchDecision {
        mode,
        confidence,
        reason: format!("score {score:.1} below gate_threshold {gate_threshold:.1}; using default_mode"),
        skill: Some(top.name.clone()),
    }
}

/// Per-session dispatch gate reconciliation state (spec §4.I "Dispatch
/// Gate enforcement"). Armed when the resolved mode is `gate` or `auto`
/// and no skill has yet been loaded this turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchGateState {
    pub armed: bool,
    pub recommended_skill: Option<String>,
    pub loaded_skill: Option<String>,
    pub overridden: bool,
}

/// Lifecycle tools always allowed even while the gate is armed.
pub const LIFECYCLE_TOOLS: &[&str] = &["skill_load", "skill_route_override", "task_read", "truth_read", "tape_read"];

impl DispatchGateState {
    pub fn arm(&mut self, recommended: &str) {
        self.armed = true;
        self.recommended_skill = Some(recommended.to_string());
        self.loaded_skill = None;
        self.overridden = false;
    }

    /// `skill_route_override` clears the pending gate unconditionally.
    pub fn override_route(&mut self, skill: &str) {
        self.armed = false;
        self.overridden = true;
        self.loaded_skill = Some(skill.to_string());
    }

    /// `skill_load` with the recommended skill's name follows the route.
    pub fn load_skill(&mut self, skill: &str) -> bool {
        self.loaded_skill = Some(skill.to_string());
        let followed = self.recommended_skill.as_deref() == Some(skill);
        if followed {
            self.armed = false;
        }
        followed
    }

    pub fn tool_is_blocked(&self, tool: &str) -> bool {
        self.armed && !LIFECYCLE_TOOLS.contains(&tool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchGatePolicy {
    Deny,
    AllowWithWarning,
    AllowSilently,
}

/// Security-mode policy applied to a blocked non-lifecycle tool while the
/// gate is armed (spec §4.I: strict denies, standard warns and allows,
/// permissive allows silently).
pub fn gate_policy(mode: SecurityMode) -> DispatchGatePolicy {
    match mode {
        SecurityMode::Strict => DispatchGatePolicy::Deny,
        SecurityMode::Standard => DispatchGatePolicy::AllowWithWarning,
        SecurityMode::Permissive => DispatchGatePolicy::AllowSilently,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::ScoreBreakdown;

    fn selection(score: f32) -> Selection {
        Selection { name: "review".into(), score, reason: String::new(), breakdown: ScoreBreakdown::default() }
    }

    fn dispatch() -> Dispatch {
        Dispatch { gate_threshold: 12.0, auto_threshold: 20.0, default_mode: DispatchMode::Suggest }
    }

    #[test]
    fn empty_selection_is_none_mode() {
        let decision = resolve_dispatch(&[], &dispatch());
        assert_eq!(decision.mode, ResolvedMode::None);
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn above_auto_threshold_is_auto_with_high_confidence() {
        let decision = resolve_dispatch(&[selection(25.0)], &dispatch());
        assert_eq!(decision.mode, ResolvedMode::Auto);
        assert!(decision.confidence >= 0.85);
    }

    #[test]
    fn between_thresholds_is_gate() {
        let decision = resolve_dispatch(&[selection(15.0)], &dispatch());
        assert_eq!(decision.mode, ResolvedMode::Gate);
        assert!(decision.confidence >= 0.55 && decision.confidence <= 0.85);
    }

    #[test]
    fn below_gate_threshold_uses_default_mode() {
        let decision = resolve_dispatch(&[selection(5.0)], &dispatch());
        assert_eq!(decision.mode, ResolvedMode::Suggest);
        assert!(decision.confidence < 0.55);
    }

    #[test]
    fn gate_blocks_non_lifecycle_until_loaded() {
        let mut gate = DispatchGateState::default();
        gate.arm("review");
        assert!(gate.tool_is_blocked("exec"));
        assert!(!gate.tool_is_blocked("skill_load"));
        assert!(gate.load_skill("review"));
        assert!(!gate.tool_is_blocked("exec"));
    }

    #[test]
    fn override_clears_gate_regardless_of_recommendation() {
        let mut gate = DispatchGateState::default();
        gate.arm("review");
        gate.override_route("patching");
        assert!(!gate.armed);
        assert!(!gate.tool_is_blocked("exec"));
    }

    #[test]
    fn loading_non_recommended_skill_does_not_clear_gate() {
        let mut gate = DispatchGateState::default();
        gate.arm("review");
        assert!(!gate.load_skill("patching"));
        assert!(gate.armed);
        assert!(gate.tool_is_blocked("exec"));
    }
}
