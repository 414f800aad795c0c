//! Per-turn runtime facade (spec §4.H, §4.R, components H/R).
//!
//! `session::Core` is the single logical owner of all per-session mutable
//! state (spec §4.R); `injection::build_context_injection` implements the
//! Injection Orchestrator that composes the ledger, context arena, skill
//! subsystem, pressure gate, and cost tracker into one per-turn call.

pub mod injection;
pub mod session;

pub use injection::{build_context_injection, InjectionOutcome, InjectionRequest};
pub use session::{Core, SessionState};
