//! Shared Resource Policy (spec §4.R, component R).
//!
//! `Core` is the single logical owner of every piece of per-session
//! mutable state. It is never re-entered during a tool execution (spec
//! §5's single-threaded, cooperative-yield model): callers serialize
//! through the runtime's event path, so a `parking_lot::RwLock` per
//! sub-state is sufficient — there is never contention from genuine
//! concurrent writers, only from readers taking defensive snapshots.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use sa_domain::config::Config;
use sa_domain::error::Result;
use sa_domain::time::{Clock, CountingIdGenerator, IdGenerator, SystemClock};
use sa_ledger::ReplayCache;
use sa_pressure::BreakerState;
use sa_pressure::UsageState;
use sa_scheduler::IntentStore;
use sa_skills::aliases::ToolAliasMap;
use sa_skills::dispatch::DispatchGateState;
use sa_tape::EventStore;

/// Per-session state mutated only through `Core::with_session` (spec
/// §4.R: "mutated only under a single logical owner").
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub usage: UsageState,
    pub breaker: BreakerState,
    pub dispatch_gate: DispatchGateState,
    pub identity_presented: bool,
    /// Last fingerprint registered per `injectionScopeId` (spec §4.H
    /// step 8).
    pub fingerprints: HashMap<String, String>,
    pub active_skill: Option<String>,
}

/// The per-turn facade composing every other crate (spec §4.H, §4.R).
///
/// Mirrors the teacher's `AppState` (`crates/gateway/src/state.rs`):
/// `Arc<T>`-wrapped ports plus `parking_lot`-guarded maps, constructed
/// once per process and shared behind an `Arc<Core>` across sessions.
pub struct Core {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub tape: EventStore,
    pub replay: ReplayCache,
    pub arena: sa_contextpack::ContextArena,
    pub alias_map: ToolAliasMap,
    sessions: RwLock<HashMap<String, SessionState>>,
    intents: RwLock<HashMap<String, Arc<IntentStore>>>,
    intents_dir: PathBuf,
}

impl Core {
    pub fn new(config: Config) -> Self {
        let events_dir = config.events_dir();
        let intents_dir = config.workspace.root.join("schedule");
        let arena = sa_contextpack::ContextArena::new(sa_contextpack::ArenaConfig {
            max_entries_per_session: config.infrastructure.context_budget.arena.max_entries_per_session as usize,
            ..Default::default()
        });
        Self {
            tape: EventStore::new(events_dir, config.infrastructure.events.enabled),
            replay: ReplayCache::new(),
            arena,
            alias_map: ToolAliasMap::default_openclaw(),
            clock: Arc::new(SystemClock),
            ids: Arc::new(CountingIdGenerator::new()),
            sessions: RwLock::new(HashMap::new()),
            intents: RwLock::new(HashMap::new()),
            intents_dir,
            config,
        }
    }

    /// Swap in deterministic ports for tests, matching the teacher's
    /// dependency-injection-by-constructor convention.
    pub fn with_ports(mut self, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        self.clock = clock;
        self.ids = ids;
        self
    }

    /// Run `f` against a session's mutable state, creating it on first
    /// use. The only write path into `SessionState` (spec §4.R).
    pub fn with_session<R>(&self, session_id: &str, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut sessions = self.sessions.write();
        let state = sessions.entry(session_id.to_string()).or_default();
        f(state)
    }

    /// Defensive copy for read-only callers (spec §4.R: "readers receive
    /// defensive copies").
    pub fn session_snapshot(&self, session_id: &str) -> SessionState {
        self.sessions.read().get(session_id).cloned().unwrap_or_default()
    }

    /// Lazily open (and memoize) the per-session intent projection.
    pub fn intent_store(&self, session_id: &str) -> Result<Arc<IntentStore>> {
        if let Some(existing) = self.intents.read().get(session_id) {
            return Ok(existing.clone());
        }
        let path = self.intents_dir.join(format!("{}.jsonl", sa_tape::sanitize_session_id(session_id)));
        let store = Arc::new(IntentStore::open(path)?);
        self.intents.write().insert(session_id.to_string(), store.clone());
        Ok(store)
    }

    /// Recover a session's intent projection up to the current tape, then
    /// return every active intent whose `next_run_at` has elapsed and
    /// whose failure cooldown (if any) has cleared (spec §4.M/§4.N,
    /// supplemented per the teacher's `due_schedules`'s
    /// `cooldown_until.map_or(true, |cu| cu <= now)` filter). Firing the
    /// intent (appending `intent_fired` and recomputing `next_run_at` via
    /// `sa_scheduler::next_run_at_tz`, applying `sa_scheduler::runs_to_fire`
    /// for its `missed_policy`) is the caller's responsibility — this is a
    /// pure read of due work.
    pub fn due_intents(&self, session_id: &str, now: i64) -> Result<Vec<sa_domain::scheduler::SchedulerIntent>> {
        let store = self.intent_store(session_id)?;
        store.recover(&self.tape, session_id, now)?;
        Ok(store
            .active_intents()
            .into_iter()
            .filter(|intent| intent.next_run_at.map(|at| at <= now).unwrap_or(false))
            .filter(|intent| intent.cooldown_until.map(|cu| cu <= now).unwrap_or(true))
            .collect())
    }
}
