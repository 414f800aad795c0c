//! Context Arena, Zone Budget Allocator, and Injection Planner (spec
//! §3.4–§3.6, §4.E–§4.G, components E/F/G).

pub mod arena;
pub mod refit;
pub mod token;
pub mod zone_allocator;

pub use arena::{
    ArenaConfig, ArenaSnapshot, AppendInput, AppendResult, ContextArena, PlanResult,
    PlanTelemetry, PlannedEntry, SloEnforced, StoredEntry,
};
pub use refit::{refit, TruncationStrategy};
pub use token::{estimate_tokens, truncate_text_to_token_budget};
pub use zone_allocator::{allocate, AllocationError};
