//! Cost Tracker (spec §4.L, component L).

pub mod tracker;

pub use tracker::{record_assistant_usage, record_tool_usage, SkillBudget, UsageDelta};
