//! Tool Gate (spec §4.K, component K).
//!
//! Actual tool execution (running `exec`, background process management,
//! file-edit tooling) is an external collaborator per spec §1/§9 — the
//! core only consumes a `ShellRunner` port (`sa_domain::ports`) and decides
//! allow/deny/warn here.

pub mod gate;

pub use gate::{evaluate as evaluate_tool_gate, SkillUsage, ToolGateDecision, ToolGateRequest};
