//! Task Status Alignment (spec §4.P).
//!
//! A deterministic classifier from `(spec?, blockers, items, verification,
//! usage)` into a `TaskStatusBlock`. Pure and side-effect free; the caller
//! decides whether to append a `task.status_updated` event by comparing
//! the result against the previous block via `TaskStatusBlock`'s
//! idempotence-aware `PartialEq` (spec §4.P: "re-emit only when
//! `(phase, health, reason, sorted truthFactIds)` change").

use sa_domain::task::{ItemStatus, TaskHealth, TaskPhase, TaskState, TaskStatusBlock};

/// Outcome of the synthetic verification evaluation run once every item is
/// `done` (spec §4.P). The verification command runner itself is an
/// external collaborator (`ShellRunner`, spec §9); this classifier only
/// consumes its already-computed outcome.
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Pass,
    Fail { missing_evidence: String },
}

/// Classify the current task status (spec §4.P). `top_truth_fact_ids`
/// should be `TruthState::top_active_ids(6)` (spec §4.C). `budget_pressure`
/// is true when cost/context usage has crossed the configured high-usage
/// threshold for this turn.
pub fn align(
    task: &TaskState,
    verification: Option<&VerificationOutcome>,
    top_truth_fact_ids: Vec<String>,
    budget_pressure: bool,
    now: i64,
) -> TaskStatusBlock {
    if task.spec.is_none() {
        return block(TaskPhase::Align, TaskHealth::NeedsSpec, None, top_truth_fact_ids, now);
    }

    if let Some(blocker) = task.blockers.first() {
        let health = if blocker.id.starts_with("verifier:") {
            TaskHealth::VerificationFailed
        } else {
            TaskHealth::Blocked
        };
        let reason = Some(format!("blocked_by={}", blocker.id));
        return block(TaskPhase::Blocked, health, reason, top_truth_fact_ids, now);
    }

    if task.items.is_empty() {
        return block(TaskPhase::Investigate, TaskHealth::Ok, None, top_truth_fact_ids, now);
    }

    let open = task.items.iter().filter(|i| i.status != ItemStatus::Done).count();
    if open > 0 {
        let reason = Some(format!("open_items={open}"));
        return maybe_budget_override(
            block(TaskPhase::Execute, TaskHealth::Ok, reason, top_truth_fact_ids.clone(), now),
            budget_pressure,
            top_truth_fact_ids,
            now,
        );
    }

    // All items done: the synthetic verification evaluation decides phase.
    match verification {
        Some(VerificationOutcome::Pass) | None => maybe_budget_override(
            block(TaskPhase::Done, TaskHealth::Ok, None, top_truth_fact_ids.clone(), now),
            budget_pressure,
            top_truth_fact_ids,
            now,
        ),
        Some(VerificationOutcome::Fail { missing_evidence }) => block(
            TaskPhase::Verify,
            TaskHealth::VerificationFailed,
            Some(format!("missing_evidence={missing_evidence}")),
            top_truth_fact_ids,
            now,
        ),
    }
}

/// If the classifier otherwise landed on `health=ok` but usage is high,
/// override to `budget_pressure` with a precise reason (spec §4.P).
fn maybe_budget_override(
    status: TaskStatusBlock,
    budget_pressure: bool,
    top_truth_fact_ids: Vec<String>,
    now: i64,
) -> TaskStatusBlock {
    if budget_pressure && status.health == TaskHealth::Ok {
        block(
            status.phase,
            TaskHealth::BudgetPressure,
            Some("usage_high".to_string()),
            top_truth_fact_ids,
            now,
        )
    } else {
        status
    }
}

fn block(
    phase: TaskPhase,
    health: TaskHealth,
    reason: Option<String>,
    truth_fact_ids: Vec<String>,
    now: i64,
) -> TaskStatusBlock {
    TaskStatusBlock { phase, health, reason, updated_at: now, truth_fact_ids }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::task::{Blocker, TaskItem, TaskSpec};

    fn spec() -> TaskSpec {
        TaskSpec {
            schema: "task.v1".into(),
            goal: "do the thing".into(),
            targets: None,
            expected_behavior: None,
            constraints: None,
            verification: None,
        }
    }

    #[test]
    fn no_spec_is_align_needs_spec() {
        let task = TaskState::default();
        let status = align(&task, None, vec![], false, 0);
        assert_eq!(status.phase, TaskPhase::Align);
        assert_eq!(status.health, TaskHealth::NeedsSpec);
    }

    #[test]
    fn any_blocker_is_blocked() {
        let mut task = TaskState { spec: Some(spec()), ..Default::default() };
        task.blockers.push(Blocker { id: "b1".into(), message: "x".into(), created_at: 0, source: None, truth_fact_id: None });
        let status = align(&task, None, vec![], false, 0);
        assert_eq!(status.phase, TaskPhase::Blocked);
        assert_eq!(status.health, TaskHealth::Blocked);
    }

    #[test]
    fn verifier_prefixed_blocker_is_verification_failed() {
        let mut task = TaskState { spec: Some(spec()), ..Default::default() };
        task.blockers.push(Blocker { id: "verifier:v1".into(), message: "x".into(), created_at: 0, source: None, truth_fact_id: None });
        let status = align(&task, None, vec![], false, 0);
        assert_eq!(status.health, TaskHealth::VerificationFailed);
    }

    #[test]
    fn no_items_is_investigate_ok() {
        let task = TaskState { spec: Some(spec()), ..Default::default() };
        let status = align(&task, None, vec![], false, 0);
        assert_eq!(status.phase, TaskPhase::Investigate);
        assert_eq!(status.health, TaskHealth::Ok);
    }

    #[test]
    fn open_item_is_execute_ok_with_count_reason() {
        let mut task = TaskState { spec: Some(spec()), ..Default::default() };
        task.items.push(TaskItem { id: "i1".into(), text: "x".into(), status: ItemStatus::Todo, created_at: 0, updated_at: 0 });
        let status = align(&task, None, vec![], false, 0);
        assert_eq!(status.phase, TaskPhase::Execute);
        assert_eq!(status.reason.as_deref(), Some("open_items=1"));
    }

    #[test]
    fn all_done_with_passing_verification_is_done_ok() {
        let mut task = TaskState { spec: Some(spec()), ..Default::default() };
        task.items.push(TaskItem { id: "i1".into(), text: "x".into(), status: ItemStatus::Done, created_at: 0, updated_at: 0 });
        let status = align(&task, Some(&VerificationOutcome::Pass), vec![], false, 0);
        assert_eq!(status.phase, TaskPhase::Done);
        assert_eq!(status.health, TaskHealth::Ok);
    }

    #[test]
    fn all_done_with_failing_verification_is_verify_verification_failed() {
        let mut task = TaskState { spec: Some(spec()), ..Default::default() };
        task.items.push(TaskItem { id: "i1".into(), text: "x".into(), status: ItemStatus::Done, created_at: 0, updated_at: 0 });
        let outcome = VerificationOutcome::Fail { missing_evidence: "no test run recorded".into() };
        let status = align(&task, Some(&outcome), vec![], false, 0);
        assert_eq!(status.phase, TaskPhase::Verify);
        assert_eq!(status.health, TaskHealth::VerificationFailed);
    }

    #[test]
    fn ok_landing_overridden_by_budget_pressure() {
        let mut task = TaskState { spec: Some(spec()), ..Default::default() };
        task.items.push(TaskItem { id: "i1".into(), text: "x".into(), status: ItemStatus::Todo, created_at: 0, updated_at: 0 });
        let status = align(&task, None, vec![], true, 0);
        assert_eq!(status.health, TaskHealth::BudgetPressure);
        assert_eq!(status.reason.as_deref(), Some("usage_high"));
    }

    #[test]
    fn status_idempotent_ignoring_updated_at() {
        let task = TaskState { spec: Some(spec()), ..Default::default() };
        let a = align(&task, None, vec!["t1".into()], false, 10);
        let b = align(&task, None, vec!["t1".into()], false, 99);
        assert_eq!(a, b);
    }
}
