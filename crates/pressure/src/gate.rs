//! Compaction gate (spec §4.O, §4.H' integration with the tool gate).
//!
//! Combines the latest observed usage ratio, a caller-queued compaction
//! request, and the circuit breaker into a single `GateStatus` that
//! `sa-tools`'s Tool Gate consults before admitting non-lifecycle tools.

use crate::breaker::BreakerState;
use crate::pressure::{classify, PressureLevel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    HardLimit,
    UsagePressure,
    PendingRequest,
    CircuitOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateStatus {
    pub required: bool,
    pub reason: Option<GateReason>,
    pub pressure: PressureLevel,
    pub usage_percent: f32,
    pub hard_limit_percent: f32,
}

/// Per-session usage + pending-request bookkeeping the gate evaluates
/// against. Durable fields (`pending_request`, `compacted_this_window`) are
/// cleared by `observe_compaction`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageState {
    pub usage_ratio: f32,
    pub pending_request: bool,
    pub compacted_this_window: bool,
}

impl UsageState {
    /// Caller queues a compaction request (e.g. after observing high
    /// pressure) but compaction hasn't actually run yet.
    pub fn queue_request(&mut self) {
        self.pending_request = true;
    }

    /// A `session_compact` call completed successfully this window.
    pub fn observe_compaction_success(&mut self) {
        self.pending_request = false;
        self.compacted_this_window = true;
    }

    /// New turn begins: the "this window" flag resets so the gate can
    /// re-arm if pressure remains high.
    pub fn start_new_turn(&mut self, usage_ratio: f32) {
        self.usage_ratio = usage_ratio;
        self.compacted_this_window = false;
    }
}

pub struct CompactionGate<'a> {
    pub hard_limit_percent: f32,
    pub compaction_threshold_percent: f32,
    pub breaker: &'a BreakerState,
    pub current_turn: u64,
}

impl<'a> CompactionGate<'a> {
    /// Evaluate gate status (spec §4.O). The breaker's `circuit_open`
    /// takes precedence — even a caller that compacted this window is
    /// denied non-lifecycle tools while the breaker is open (spec §8
    /// boundary: "the next tool call is denied with `reason=circuit_open`").
    pub fn evaluate(&self, usage: &UsageState) -> GateStatus {
        let pressure = classify(usage.usage_ratio, self.hard_limit_percent);

        if self.breaker.is_open(self.current_turn) {
            return GateStatus {
                required: true,
                reason: Some(GateReason::CircuitOpen),
                pressure,
                usage_percent: usage.usage_ratio,
                hard_limit_percent: self.hard_limit_percent,
            };
        }

        let (required, reason) = match pressure {
            PressureLevel::Critical => (true, Some(GateReason::HardLimit)),
            PressureLevel::High if !usage.compacted_this_window => {
                (true, Some(GateReason::UsagePressure))
            }
            _ if usage.pending_request
                && usage.usage_ratio >= self.compaction_threshold_percent
                && !usage.compacted_this_window =>
            {
                (true, Some(GateReason::PendingRequest))
            }
            _ => (false, None),
        };

        GateStatus {
            required,
            reason,
            pressure,
            usage_percent: usage.usage_ratio,
            hard_limit_percent: self.hard_limit_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate<'a>(breaker: &'a BreakerState, turn: u64) -> CompactionGate<'a> {
        CompactionGate {
            hard_limit_percent: 0.8,
            compaction_threshold_percent: 0.7,
            breaker,
            current_turn: turn,
        }
    }

    #[test]
    fn critical_pressure_is_hard_limit() {
        let breaker = BreakerState::default();
        let mut usage = UsageState::default();
        usage.start_new_turn(1.0);
        let status = gate(&breaker, 1).evaluate(&usage);
        assert!(status.required);
        assert_eq!(status.reason, Some(GateReason::HardLimit));
    }

    #[test]
    fn high_pressure_is_usage_pressure() {
        let breaker = BreakerState::default();
        let mut usage = UsageState::default();
        usage.start_new_turn(0.85);
        let status = gate(&breaker, 1).evaluate(&usage);
        assert_eq!(status.reason, Some(GateReason::UsagePressure));
    }

    #[test]
    fn compacted_this_window_clears_usage_pressure_gate() {
        let breaker = BreakerState::default();
        let mut usage = UsageState::default();
        usage.start_new_turn(0.85);
        usage.observe_compaction_success();
        let status = gate(&breaker, 1).evaluate(&usage);
        assert!(!status.required);
    }

    #[test]
    fn pending_request_above_threshold_gates() {
        let breaker = BreakerState::default();
        let mut usage = UsageState::default();
        usage.start_new_turn(0.72);
        usage.queue_request();
        let status = gate(&breaker, 1).evaluate(&usage);
        assert_eq!(status.reason, Some(GateReason::PendingRequest));
    }

    #[test]
    fn open_breaker_always_gates_with_circuit_open() {
        let mut breaker = BreakerState::default();
        breaker.record_failure("s1", 1, 1, 5);
        let mut usage = UsageState::default();
        usage.start_new_turn(0.1);
        let status = gate(&breaker, 1).evaluate(&usage);
        assert_eq!(status.reason, Some(GateReason::CircuitOpen));
    }
}
