//! Skill document loading, lexical selection, chain planning, dispatch
//! resolution and contract tightening.
//!
//! `aliases` is the tool alias/migration-hint table consumed by the tool
//! gate.

pub mod aliases;
pub mod chain;
pub mod dispatch;
pub mod document;
pub mod readiness;
pub mod selector;
pub mod tighten;

pub use chain::{plan_chain, ChainPlan};
pub use dispatch::{gate_policy, resolve_dispatch, DispatchDecision, DispatchGatePolicy, DispatchGateState, ResolvedMode, LIFECYCLE_TOOLS};
pub use document::parse_skill_document;
pub use readiness::{check_readiness, ReadinessStatus, SkillReadiness};
pub use selector::{select, Selection};
pub use tighten::{apply_override, tighten, ContractOverride};
