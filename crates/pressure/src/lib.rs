//! Context pressure observation and the compaction circuit breaker (spec
//! §4.O, component H).

pub mod breaker;
pub mod gate;
pub mod pressure;

pub use breaker::BreakerState;
pub use gate::{CompactionGate, GateReason, GateStatus, UsageState};
pub use pressure::{classify, PressureLevel};
