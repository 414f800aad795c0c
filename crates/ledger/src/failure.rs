//! Failure and Infrastructure Taxonomy (spec §4.Q).
//!
//! Classifies `tool.result` tape events: a non-zero exit that isn't one of
//! the well-known "no-match" search-tool idioms becomes a stable
//! `command_failure` truth fact plus a matching task blocker; a later
//! successful run of the *same command* resolves both. Folded as part of
//! the same `tool.result` event the evidence ledger (spec §3.9) also
//! observes, so a single tape event drives all three slices deterministically.

use sha2::{Digest, Sha256};

use sa_domain::evidence::{EvidenceState, FailureRecord, Verdict};
use sa_domain::task::{Blocker, TaskState};
use sa_domain::truth::{Severity, TruthState, TruthStatus};
use serde::Deserialize;
use serde_json::Value;

/// Decoded shape of a `tool.result` event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolResultPayload {
    pub tool_name: String,
    #[serde(default)]
    pub command: Option<String>,
    pub exit_code: i32,
    #[serde(default)]
    pub output_text: String,
    pub turn: u64,
}

/// Tools whose non-zero exit is a normal "no matches" signal, not a
/// failure (spec §4.Q: `rg`, `grep -c`, `git -C … grep`).
pub fn is_infrastructure_no_match(tool_name: &str, command: Option<&str>) -> bool {
    let command = command.unwrap_or_default();
    match tool_name {
        "rg" | "ripgrep" => true,
        "grep" => command.contains("-c"),
        "git" => command.contains("grep"),
        _ => false,
    }
}

/// Stable id for the command-failure fact/blocker pair: a short SHA-256
/// digest of the command text (falling back to the tool name when no
/// command string is available), so repeated invocations of the same
/// command resolve the same fact instead of minting a new one each time.
pub fn stable_command_id(tool_name: &str, command: Option<&str>) -> String {
    let basis = command.unwrap_or(tool_name);
    let mut hasher = Sha256::new();
    hasher.update(basis.as_bytes());
    let digest = hasher.finalize();
    let hex = format!("{digest:x}");
    format!("command_failure:{}", &hex[..16])
}

pub fn verdict_for(payload: &ToolResultPayload) -> Verdict {
    if payload.exit_code == 0 {
        Verdict::Pass
    } else if is_infrastructure_no_match(&payload.tool_name, payload.command.as_deref()) {
        Verdict::Inconclusive
    } else {
        Verdict::Fail
    }
}

/// Fold one `tool.result` event into the evidence ledger and, for real
/// command failures, into the truth and task ledgers too. Pure: the same
/// `(task, truth, evidence, payload, timestamp)` always produces the same
/// resulting state.
pub fn reduce_tool_result(
    task: &mut TaskState,
    truth: &mut TruthState,
    evidence: &mut EvidenceState,
    timestamp: i64,
    payload: &Value,
) {
    let Ok(result) = serde_json::from_value::<ToolResultPayload>(payload.clone()) else {
        return;
    };
    evidence.total_records += 1;

    let verdict = verdict_for(&result);
    let id = stable_command_id(&result.tool_name, result.command.as_deref());

    match verdict {
        Verdict::Fail => {
            evidence.record_failure(FailureRecord {
                tool_name: result.tool_name.clone(),
                args: Value::Null,
                output_text: result.output_text.clone(),
                turn: result.turn,
                anchor_epoch: evidence.anchor_epoch,
                timestamp,
            });
            upsert_failure(truth, &id, &result, timestamp);
            record_blocker(task, &id, &result, timestamp);
        }
        Verdict::Pass => {
            resolve_failure(truth, &id, timestamp);
            task.blockers.retain(|b| b.id != id);
        }
        Verdict::Inconclusive => {}
    }
}

fn upsert_failure(truth: &mut TruthState, id: &str, result: &ToolResultPayload, timestamp: i64) {
    let summary = format!(
        "{} exited {} on `{}`",
        result.tool_name,
        result.exit_code,
        result.command.as_deref().unwrap_or(&result.tool_name)
    );
    match truth.index(id) {
        Some(idx) => {
            let fact = &mut truth.facts[idx];
            fact.summary = summary;
            fact.details = Some(result.output_text.clone());
            fact.last_seen_at = timestamp;
            fact.status = TruthStatus::Active;
            fact.resolved_at = None;
        }
        None => {
            truth.facts.push(sa_domain::truth::TruthFact {
                id: id.to_string(),
                kind: "command_failure".to_string(),
                status: TruthStatus::Active,
                severity: Severity::Error,
                summary,
                details: Some(result.output_text.clone()),
                evidence_ids: Vec::new(),
                first_seen_at: timestamp,
                last_seen_at: timestamp,
                resolved_at: None,
            });
        }
    }
}

fn resolve_failure(truth: &mut TruthState, id: &str, timestamp: i64) {
    if let Some(idx) = truth.index(id) {
        let fact = &mut truth.facts[idx];
        if fact.status != TruthStatus::Resolved {
            fact.status = TruthStatus::Resolved;
            fact.last_seen_at = fact.last_seen_at.max(timestamp);
            fact.resolved_at = Some(timestamp.max(fact.last_seen_at));
        }
    }
}

fn record_blocker(task: &mut TaskState, id: &str, result: &ToolResultPayload, timestamp: i64) {
    let message = format!("`{}` is failing", result.command.as_deref().unwrap_or(&result.tool_name));
    match task.blocker_index(id) {
        Some(idx) => {
            task.blockers[idx].message = message;
        }
        None => task.blockers.push(Blocker {
            id: id.to_string(),
            message,
            created_at: timestamp,
            source: Some(result.tool_name.clone()),
            truth_fact_id: Some(id.to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(tool: &str, command: &str, exit: i32) -> Value {
        json!({"tool_name": tool, "command": command, "exit_code": exit, "output_text": "boom", "turn": 1})
    }

    #[test]
    fn non_zero_exit_creates_fact_and_blocker() {
        let mut task = TaskState::default();
        let mut truth = TruthState::default();
        let mut evidence = EvidenceState::default();
        reduce_tool_result(&mut task, &mut truth, &mut evidence, 1, &payload("cargo", "cargo test", 1));
        assert_eq!(truth.facts.len(), 1);
        assert_eq!(truth.facts[0].status, TruthStatus::Active);
        assert_eq!(task.blockers.len(), 1);
        assert_eq!(evidence.failure_records, 1);
    }

    #[test]
    fn rg_no_match_is_not_a_failure() {
        let mut task = TaskState::default();
        let mut truth = TruthState::default();
        let mut evidence = EvidenceState::default();
        reduce_tool_result(&mut task, &mut truth, &mut evidence, 1, &payload("rg", "rg foo", 1));
        assert!(truth.facts.is_empty());
        assert!(task.blockers.is_empty());
        assert_eq!(evidence.failure_records, 0);
    }

    #[test]
    fn later_success_resolves_fact_and_clears_blocker() {
        let mut task = TaskState::default();
        let mut truth = TruthState::default();
        let mut evidence = EvidenceState::default();
        reduce_tool_result(&mut task, &mut truth, &mut evidence, 1, &payload("cargo", "cargo test", 1));
        reduce_tool_result(&mut task, &mut truth, &mut evidence, 2, &payload("cargo", "cargo test", 0));
        assert_eq!(truth.facts[0].status, TruthStatus::Resolved);
        assert!(task.blockers.is_empty());
    }

    #[test]
    fn same_command_reuses_stable_id_across_failures() {
        let mut task = TaskState::default();
        let mut truth = TruthState::default();
        let mut evidence = EvidenceState::default();
        reduce_tool_result(&mut task, &mut truth, &mut evidence, 1, &payload("cargo", "cargo test", 1));
        reduce_tool_result(&mut task, &mut truth, &mut evidence, 2, &payload("cargo", "cargo test", 1));
        assert_eq!(truth.facts.len(), 1);
        assert_eq!(task.blockers.len(), 1);
    }
}
