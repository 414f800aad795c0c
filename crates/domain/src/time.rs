//! Time and id-generation ports.
//!
//! The runtime never calls `chrono::Utc::now()` or a raw random generator
//! directly outside of these two seams — see spec §9's design note on
//! global singletons for time/random. Tests inject deterministic
//! implementations; production wires `SystemClock`/`UuidGenerator`.

use chrono::Utc;

/// Wall-clock port. `now_ms` is the only primitive the rest of the crate
/// graph depends on; everything else derives from it.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Real wall clock, backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Deterministic clock for tests — starts at a fixed instant and advances
/// only when told to.
#[derive(Debug, Clone)]
pub struct FixedClock {
    millis: std::sync::Arc<std::sync::atomic::AtomicI64>,
}

impl FixedClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            millis: std::sync::Arc::new(std::sync::atomic::AtomicI64::new(start_ms)),
        }
    }

    pub fn advance(&self, delta_ms: i64) {
        self.millis
            .fetch_add(delta_ms, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.millis.store(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.millis.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Deterministic id generation, scoped per session so event ids are stable
/// and replayable under a seeded sequence rather than `Uuid::new_v4()`.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, session_id: &str) -> String;
}

/// Production id generator: monotonically increasing per-session counter
/// rendered as `"{session_id}-{n}"`. Deterministic given a fixed start
/// (tests seed via `CountingIdGenerator::new`), unlike `Uuid::new_v4()`.
pub struct CountingIdGenerator {
    counters: parking_lot::Mutex<std::collections::HashMap<String, u64>>,
}

impl CountingIdGenerator {
    pub fn new() -> Self {
        Self {
            counters: parking_lot::Mutex::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for CountingIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for CountingIdGenerator {
    fn next_id(&self, session_id: &str) -> String {
        let mut counters = self.counters.lock();
        let counter = counters.entry(session_id.to_string()).or_insert(0);
        *counter += 1;
        format!("{session_id}-{counter}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_deterministically() {
        let clock = FixedClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[test]
    fn counting_id_generator_is_per_session_monotonic() {
        let gen = CountingIdGenerator::new();
        assert_eq!(gen.next_id("s1"), "s1-1");
        assert_eq!(gen.next_id("s1"), "s1-2");
        assert_eq!(gen.next_id("s2"), "s2-1");
    }
}
