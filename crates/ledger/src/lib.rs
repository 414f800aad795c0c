//! Task/Truth ledger reducers, snapshot store, and checkpoint compaction
//! (spec §4.B, §4.C, components B/C).

pub mod compaction;
pub mod failure;
pub mod replay;
pub mod snapshot;
pub mod status;
pub mod task;
pub mod truth;

pub use compaction::{compact_if_due, CompactionOutcome, CompactionPolicy};
pub use replay::{ReplayCache, TurnReplayView};
pub use snapshot::{SnapshotStore, TaskSnapshot};
pub use status::{align, VerificationOutcome};
