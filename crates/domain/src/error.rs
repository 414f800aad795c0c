/// Shared error type used across all runtime-core crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("cron invalid ({field}): {message}")]
    CronInvalid { field: String, message: String },

    #[error("tape line corrupt at offset {offset}: {reason}")]
    TapeCorruptLine { offset: u64, reason: String },

    #[error("snapshot stale for session {session_id}")]
    SnapshotStale { session_id: String },

    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("tool denied: {0}")]
    ToolDenied(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
