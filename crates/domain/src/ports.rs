//! External collaborator ports.
//!
//! The core never performs network I/O and never calls a model (spec §1).
//! Everything it needs from the outside world is expressed as one of these
//! small traits; production wiring lives in `sa-runtime`, tests inject
//! stubs/mocks directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of running a verification or other shell command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

/// The verification runner is an external collaborator (spec §9); the core
/// only consumes this port.
#[async_trait]
pub trait ShellRunner: Send + Sync {
    async fn run(&self, command: &str, cwd: Option<&str>, timeout: Duration) -> ShellOutcome;
}

/// A single memory recall hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub id: String,
    pub content: String,
    pub score: f32,
}

/// The vector memory engine's internals are opaque to the core (spec §1).
#[async_trait]
pub trait MemoryPort: Send + Sync {
    async fn search(&self, session_id: &str, query: &str, top_k: u32, deadline: Duration) -> Vec<MemoryHit>;
}

/// The external recall provider is likewise opaque.
#[async_trait]
pub trait ExternalRecallPort: Send + Sync {
    async fn search(&self, query: &str, top_k: u32, deadline: Duration) -> Vec<MemoryHit>;
}
