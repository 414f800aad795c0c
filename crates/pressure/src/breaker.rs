//! Compaction circuit breaker (spec §4.O).
//!
//! Counts consecutive compaction failures (a queued compaction request that
//! never arrived, or a `session_compact` call that errored). After
//! `max_consecutive_failures`, the breaker opens for `cooldown_turns` turns;
//! it closes on cooldown elapse or on the next successful compaction.

use sa_domain::trace::TraceEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BreakerState {
    pub consecutive_failures: u32,
    /// Turn number at which the breaker re-closes; `None` when closed.
    pub open_until_turn: Option<u64>,
}

impl BreakerState {
    pub fn is_open(&self, current_turn: u64) -> bool {
        match self.open_until_turn {
            Some(until) => current_turn < until,
            None => false,
        }
    }

    /// Record a compaction failure. Opens the breaker once
    /// `max_consecutive_failures` is reached, emitting the open trace event
    /// exactly on the transition (not on every subsequent failure while
    /// already open).
    pub fn record_failure(
        &mut self,
        session_id: &str,
        current_turn: u64,
        max_consecutive_failures: u32,
        cooldown_turns: u32,
    ) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= max_consecutive_failures && self.open_until_turn.is_none() {
            self.open_until_turn = Some(current_turn + cooldown_turns as u64);
            TraceEvent::CompactionBreakerOpened {
                session_id: session_id.to_string(),
                cooldown_turns,
            }
            .emit();
        }
    }

    /// Record a successful compaction: resets the failure count and closes
    /// the breaker if it was open, emitting the close event.
    pub fn record_success(&mut self, session_id: &str) {
        self.consecutive_failures = 0;
        if self.open_until_turn.take().is_some() {
            TraceEvent::CompactionBreakerClosed {
                session_id: session_id.to_string(),
            }
            .emit();
        }
    }

    /// Advance past cooldown once `current_turn` reaches `open_until_turn`,
    /// closing the breaker and resetting failures. Callers invoke this each
    /// turn before consulting `is_open`.
    pub fn tick(&mut self, session_id: &str, current_turn: u64) {
        if let Some(until) = self.open_until_turn {
            if current_turn >= until {
                self.open_until_turn = None;
                self.consecutive_failures = 0;
                TraceEvent::CompactionBreakerClosed {
                    session_id: session_id.to_string(),
                }
                .emit();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_exactly_on_nth_failure() {
        let mut breaker = BreakerState::default();
        breaker.record_failure("s1", 1, 3, 5);
        assert!(!breaker.is_open(1));
        breaker.record_failure("s1", 2, 3, 5);
        assert!(!breaker.is_open(2));
        breaker.record_failure("s1", 3, 3, 5);
        assert!(breaker.is_open(3));
        assert_eq!(breaker.open_until_turn, Some(8));
    }

    #[test]
    fn closes_on_cooldown_elapsed() {
        let mut breaker = BreakerState::default();
        breaker.record_failure("s1", 1, 1, 2);
        assert!(breaker.is_open(1));
        breaker.tick("s1", 2);
        assert!(breaker.is_open(2));
        breaker.tick("s1", 3);
        assert!(!breaker.is_open(3));
        assert_eq!(breaker.consecutive_failures, 0);
    }

    #[test]
    fn closes_early_on_success() {
        let mut breaker = BreakerState::default();
        breaker.record_failure("s1", 1, 1, 10);
        assert!(breaker.is_open(1));
        breaker.record_success("s1");
        assert!(!breaker.is_open(1));
    }
}
