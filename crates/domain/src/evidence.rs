//! Evidence ledger data model (spec §3.9).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    Inconclusive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub tool_name: String,
    pub args: Value,
    pub output_text: String,
    pub turn: u64,
    pub anchor_epoch: u64,
    pub timestamp: i64,
}

pub const MAX_RECENT_FAILURES: usize = 48;
pub const ANCHOR_RETENTION: u64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvidenceState {
    pub total_records: u64,
    pub failure_records: u64,
    pub anchor_epoch: u64,
    pub recent_failures: Vec<FailureRecord>,
}

impl EvidenceState {
    /// Prune entries older than `anchorEpoch - 3` and cap at 48 (spec §3.9).
    pub fn prune(&mut self) {
        let floor = self.anchor_epoch.saturating_sub(ANCHOR_RETENTION);
        self.recent_failures.retain(|f| f.anchor_epoch >= floor);
        if self.recent_failures.len() > MAX_RECENT_FAILURES {
            let overflow = self.recent_failures.len() - MAX_RECENT_FAILURES;
            self.recent_failures.drain(0..overflow);
        }
    }

    pub fn record_failure(&mut self, failure: FailureRecord) {
        self.total_records += 1;
        self.failure_records += 1;
        self.recent_failures.push(failure);
        self.prune();
    }

    pub fn bump_anchor(&mut self) {
        self.anchor_epoch += 1;
        self.prune();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(epoch: u64) -> FailureRecord {
        FailureRecord {
            tool_name: "exec".into(),
            args: Value::Null,
            output_text: String::new(),
            turn: 1,
            anchor_epoch: epoch,
            timestamp: 0,
        }
    }

    #[test]
    fn prune_drops_entries_older_than_anchor_minus_three() {
        let mut state = EvidenceState::default();
        state.anchor_epoch = 5;
        state.recent_failures = vec![failure(1), failure(2), failure(3), failure(5)];
        state.prune();
        assert_eq!(state.recent_failures.len(), 2);
        assert!(state.recent_failures.iter().all(|f| f.anchor_epoch >= 2));
    }

    #[test]
    fn caps_at_48_most_recent() {
        let mut state = EvidenceState::default();
        for i in 0..60 {
            state.record_failure(failure(i));
        }
        assert_eq!(state.recent_failures.len(), MAX_RECENT_FAILURES);
    }
}
