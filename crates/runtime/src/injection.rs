//! Injection Orchestrator (spec §4.H, component H).
//!
//! Composes the ledger (task/truth state via the Turn-Replay Engine), the
//! skill selector/dispatch resolver, the context arena, and the pressure
//! classifier into the single per-turn call an external collaborator
//! makes with `{sessionId, prompt, usage?, injectionScopeId?}`.

use sha2::{Digest, Sha256};

use sa_contextpack::{estimate_tokens, truncate_text_to_token_budget, AppendInput};
use sa_domain::arena::Priority;
use sa_domain::error::Result;
use sa_domain::event::{kinds, EventRecord};
use sa_domain::task::TaskState;
use sa_domain::trace::TraceEvent;
use sa_domain::truth::{TruthFact, TruthStatus};
use sa_ledger::status::VerificationOutcome;
use sa_ledger::align;
use sa_pressure::{classify, PressureLevel};
use sa_skills::dispatch::{resolve_dispatch, DispatchDecision, ResolvedMode};
use sa_skills::selector::select;
use sa_tape::ListFilter;

use sa_domain::skill::SkillDocument;

use crate::session::Core;

const IDENTITY_BLOCK: &str = "You are the coding agent orchestrated by this runtime core. \
Follow the task ledger, respect the truth ledger, and prefer the skill the dispatch \
resolver recommends before reaching for raw tools.";

/// One call into `build_context_injection` (spec §4.H).
pub struct InjectionRequest<'a> {
    pub session_id: &'a str,
    pub prompt: &'a str,
    pub usage_ratio: f32,
    pub injection_scope_id: &'a str,
    pub turn: u64,
    pub now: i64,
    pub verification: Option<VerificationOutcome>,
    pub skills_index: &'a [SkillDocument],
}

/// Result of one orchestrator call. `accepted = false` means `reason` is
/// one of `{hard_limit, budget_exhausted, duplicate_content, unknown}`
/// and arena state was never mutated past what step 1-5 already
/// registered (spec §4.H: "never mutates arena state past what was
/// already registered").
#[derive(Debug, Clone)]
pub struct InjectionOutcome {
    pub accepted: bool,
    pub text: String,
    pub estimated_tokens: u32,
    pub truncated: bool,
    pub reason: Option<String>,
    pub dispatch: Option<DispatchDecision>,
}

fn render_truth_facts(facts: &[&TruthFact]) -> String {
    let mut out = String::from("## Active Truth Facts\n");
    for fact in facts {
        out.push_str(&format!("- [{:?}/{:?}] {}: {}\n", fact.severity, fact.status, fact.kind, fact.summary));
    }
    out
}

fn render_task_state(task: &TaskState) -> String {
    let mut out = String::from("## Task State\n");
    if let Some(spec) = &task.spec {
        out.push_str(&format!("Goal: {}\n", spec.goal));
    }
    if let Some(status) = &task.status {
        out.push_str(&format!("Phase: {:?} Health: {:?}", status.phase, status.health));
        if let Some(reason) = &status.reason {
            out.push_str(&format!(" ({reason})"));
        }
        out.push('\n');
    }
    for item in &task.items {
        out.push_str(&format!("- [{:?}] {}: {}\n", item.status, item.id, item.text));
    }
    for blocker in &task.blockers {
        out.push_str(&format!("! blocked: {} ({})\n", blocker.message, blocker.id));
    }
    out
}

fn render_failures(failures: &[sa_domain::evidence::FailureRecord], max_chars: usize) -> String {
    let mut out = String::from("## Recent Tool Failures\n");
    for failure in failures.iter().rev().take(10) {
        let mut text = failure.output_text.clone();
        if text.chars().count() > max_chars {
            text = text.chars().take(max_chars).collect();
        }
        out.push_str(&format!("- {} (turn {}): {}\n", failure.tool_name, failure.turn, text));
    }
    out
}

/// Run the nine-step algorithm (spec §4.H) for one turn.
pub fn build_context_injection(core: &Core, req: &InjectionRequest) -> Result<InjectionOutcome> {
    let cost_config = &core.config.infrastructure.cost_tracking;
    let events = core.tape.list(req.session_id, &ListFilter::default())?;
    let view = core.replay.get_or_build(req.session_id, &events, |e| e.turn.unwrap_or(0), cost_config);

    // Step 1: identity + truth-ledger header once per session; dynamic
    // active-truth-facts block every turn when facts are active.
    let first_turn = core.with_session(req.session_id, |s| {
        let first = !s.identity_presented;
        s.identity_presented = true;
        first
    });
    if first_turn {
        core.arena.append(
            req.session_id,
            AppendInput {
                source: "identity".into(),
                id: "static".into(),
                content: IDENTITY_BLOCK.to_string(),
                priority: Priority::Critical,
                once_per_session: true,
                timestamp: req.now,
                per_source_cap: None,
            },
        );
        core.arena.append(
            req.session_id,
            AppendInput {
                source: "truth".into(),
                id: "ledger".into(),
                content: "## Truth Ledger\nFacts recorded here are the session's standing record of what is known to be true.".into(),
                priority: Priority::High,
                once_per_session: true,
                timestamp: req.now,
                per_source_cap: None,
            },
        );
    }
    let active_facts: Vec<&TruthFact> = view.truth_state.facts.iter().filter(|f| f.status == TruthStatus::Active).collect();
    if !active_facts.is_empty() {
        core.arena.append(
            req.session_id,
            AppendInput {
                source: "truth".into(),
                id: format!("facts-turn-{}", req.turn),
                content: render_truth_facts(&active_facts),
                priority: Priority::High,
                once_per_session: false,
                timestamp: req.now,
                per_source_cap: None,
            },
        );
    }

    // Step 2: align task status (spec §4.P) and persist the change.
    let top_truth_ids = view.truth_state.top_active_ids(6);
    let pressure = classify(req.usage_ratio, core.config.infrastructure.context_budget.hard_limit_percent);
    let budget_pressure = pressure >= PressureLevel::High;
    let aligned = align(&view.task_state, req.verification.as_ref(), top_truth_ids, budget_pressure, req.now);
    if view.task_state.status.as_ref() != Some(&aligned) {
        let record = EventRecord::new(
            core.ids.next_id(req.session_id),
            req.session_id,
            kinds::TASK_STATUS_UPDATED,
            req.now,
            Some(req.turn),
            serde_json::to_value(&aligned).map_err(sa_domain::error::Error::Json)?,
        );
        core.tape.append(&record)?;
        core.replay.observe_event(req.session_id, &record, cost_config);
    }

    // Step 3: skill candidate + dispatch gate.
    let selections = select(req.skills_index, req.prompt, core.config.skills.selector.k as usize);
    let dispatch_policy = selections
        .first()
        .and_then(|top| req.skills_index.iter().find(|d| d.name == top.name))
        .and_then(|doc| doc.contract.dispatch.clone())
        .unwrap_or_default();
    let decision = resolve_dispatch(&selections, &dispatch_policy);
    core.with_session(req.session_id, |s| {
        if matches!(decision.mode, ResolvedMode::Gate | ResolvedMode::Auto) {
            if let Some(skill) = &decision.skill {
                if s.dispatch_gate.recommended_skill.as_deref() != Some(skill.as_str()) {
                    s.dispatch_gate.arm(skill);
                }
            }
        }
    });
    if let Some(skill) = &decision.skill {
        core.arena.append(
            req.session_id,
            AppendInput {
                source: "task".into(),
                id: "skill-candidate".into(),
                content: format!("## Recommended Skill\n{} (mode={:?}, confidence={:.2}): {}", skill, decision.mode, decision.confidence, decision.reason),
                priority: Priority::Normal,
                once_per_session: false,
                timestamp: req.now,
                per_source_cap: None,
            },
        );
    }

    // Step 4: recent tool failures.
    let failure_cfg = &core.config.infrastructure.tool_failure_injection;
    if failure_cfg.enabled && !view.evidence_state.recent_failures.is_empty() {
        core.arena.append(
            req.session_id,
            AppendInput {
                source: "tool-failure".into(),
                id: "recent".into(),
                content: render_failures(&view.evidence_state.recent_failures, failure_cfg.max_output_chars as usize),
                priority: Priority::Normal,
                once_per_session: false,
                timestamp: req.now,
                per_source_cap: None,
            },
        );
    }

    // Step 5: task-state block, when the task has content.
    if view.task_state.spec.is_some() || !view.task_state.items.is_empty() || !view.task_state.blockers.is_empty() {
        core.arena.append(
            req.session_id,
            AppendInput {
                source: "task".into(),
                id: "state".into(),
                content: render_task_state(&view.task_state),
                priority: Priority::High,
                once_per_session: false,
                timestamp: req.now,
                per_source_cap: None,
            },
        );
    }

    // Step 6: plan.
    let budget_cfg = &core.config.infrastructure.context_budget;
    let budget = if budget_cfg.enabled { budget_cfg.max_injection_tokens } else { u32::MAX };
    let plan = core.arena.plan(req.session_id, budget);

    if let Some(reason) = plan.reason {
        TraceEvent::ContextInjectionDropped { session_id: req.session_id.to_string(), reason: reason.clone() }.emit();
        return Ok(InjectionOutcome { accepted: false, text: String::new(), estimated_tokens: 0, truncated: false, reason: Some(reason), dispatch: Some(decision) });
    }

    // Step 7: global per-turn re-check (ContextBudgetManager).
    let mut text = plan.text;
    let mut estimated = plan.estimated_tokens;
    let mut truncated = plan.truncated;
    if budget_cfg.enabled && estimated > budget_cfg.max_injection_tokens {
        text = truncate_text_to_token_budget(&text, budget_cfg.max_injection_tokens);
        estimated = estimate_tokens(&text);
        truncated = true;
    }

    // Step 8: fingerprint dedup.
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let fingerprint = format!("{:x}", hasher.finalize());
    let duplicate = core.with_session(req.session_id, |s| {
        s.fingerprints.get(req.injection_scope_id).map(|prev| prev == &fingerprint).unwrap_or(false)
    });
    if duplicate {
        TraceEvent::ContextInjectionDropped { session_id: req.session_id.to_string(), reason: "duplicate_content".to_string() }.emit();
        return Ok(InjectionOutcome { accepted: false, text: String::new(), estimated_tokens: 0, truncated: false, reason: Some("duplicate_content".to_string()), dispatch: Some(decision) });
    }

    // Step 9: mark presented, persist fingerprint, emit telemetry.
    core.arena.mark_presented(req.session_id, &plan.consumed_keys);
    core.with_session(req.session_id, |s| {
        s.fingerprints.insert(req.injection_scope_id.to_string(), fingerprint);
    });
    TraceEvent::ContextInjected {
        session_id: req.session_id.to_string(),
        estimated_tokens: estimated,
        entries: plan.entries.len(),
        truncated,
    }
    .emit();

    Ok(InjectionOutcome { accepted: true, text, estimated_tokens: estimated, truncated, reason: None, dispatch: Some(decision) })
}
