//! Context Arena and Injection Planner (spec §3.4–§3.6, §4.E–§4.G,
//! components E/F/G).
//!
//! Generalizes the teacher's static `ContextPackBuilder` (a fixed list of
//! workspace files truncated per-file then by a total cap) into a dynamic,
//! per-session, keyed entry store with last-write-wins semantics, zone+
//! priority ordering, an SLO eviction ceiling, and fingerprint-ready planned
//! output. The teacher's `[TRUNCATED]` markers generalize into `refit`;
//! the total-cap walk generalizes into the zone-aware budget walk below.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use sa_domain::arena::{Priority, Zone, ZoneBand, ZONE_ORDER};
use serde::{Deserialize, Serialize};

use crate::refit::{self, TruncationStrategy};
use crate::token;
use crate::zone_allocator::{self, AllocationError};

fn entry_key(source: &str, id: &str) -> String {
    format!("{source}:{id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub source: String,
    pub id: String,
    pub content: String,
    pub priority: Priority,
    pub estimated_tokens: u32,
    pub timestamp: i64,
    pub once_per_session: bool,
    pub truncated: bool,
    pub index: usize,
    pub presented: bool,
}

#[derive(Debug, Clone, Default)]
struct SessionState {
    entries: Vec<StoredEntry>,
    latest_index_by_key: HashMap<String, usize>,
    once_keys: HashSet<String>,
}

impl SessionState {
    /// Rebuild `entries` to contain only the indices in `keep`, reassigning
    /// `index` and rebuilding `latest_index_by_key` (spec §3.5/§9: "do not
    /// leak indices across compactions").
    fn rebuild_keeping(&mut self, keep: &HashSet<usize>) {
        let old = std::mem::take(&mut self.entries);
        let mut new_entries = Vec::with_capacity(keep.len());
        let mut new_map = HashMap::with_capacity(keep.len());
        for (old_idx, mut entry) in old.into_iter().enumerate() {
            if keep.contains(&old_idx) {
                let new_idx = new_entries.len();
                entry.index = new_idx;
                new_map.insert(entry_key(&entry.source, &entry.id), new_idx);
                new_entries.push(entry);
            }
        }
        self.entries = new_entries;
        self.latest_index_by_key = new_map;
    }

    fn compact_to_latest(&mut self) {
        let keep: HashSet<usize> = self.latest_index_by_key.values().copied().collect();
        self.rebuild_keeping(&keep);
    }

    fn evict_key(&mut self, key: &str) -> bool {
        if let Some(&idx) = self.latest_index_by_key.get(key) {
            let keep: HashSet<usize> = self
                .latest_index_by_key
                .values()
                .copied()
                .filter(|v| *v != idx)
                .collect();
            self.rebuild_keeping(&keep);
            true
        } else {
            false
        }
    }

    /// Superseded-trim compaction policy (spec §3.5): `|entries| >= 2048`
    /// and superseded count `>= 512` and `>= 25%` of entries.
    fn maybe_superseded_trim(&mut self) {
        let total = self.entries.len();
        let superseded = total.saturating_sub(self.latest_index_by_key.len());
        if total >= 2048 && superseded >= 512 && superseded.saturating_mul(4) >= total {
            self.compact_to_latest();
        }
    }

    /// Oldest *active* (candidate) entry whose source is recall-degradable,
    /// by ascending index (spec §3.5 SLO eviction).
    fn oldest_recall_degradable_key(&self) -> Option<String> {
        self.latest_index_by_key
            .iter()
            .filter(|(k, _)| {
                let source = k.rsplit_once(':').map(|(s, _)| s).unwrap_or(k.as_str());
                Zone::is_recall_degradable(source)
            })
            .min_by_key(|(_, idx)| **idx)
            .map(|(k, _)| k.clone())
    }
}

#[derive(Debug, Clone)]
pub struct AppendInput {
    pub source: String,
    pub id: String,
    pub content: String,
    pub priority: Priority,
    pub once_per_session: bool,
    pub timestamp: i64,
    /// Per-source token cap, if configured for this source; `None` means
    /// unconstrained at append time (the planner's budget walk still
    /// applies later).
    pub per_source_cap: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SloEnforced {
    pub dropped: bool,
    pub evicted_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppendResult {
    pub accepted: bool,
    pub slo_enforced: Option<SloEnforced>,
}

#[derive(Debug, Clone)]
pub struct PlannedEntry {
    pub source: String,
    pub id: String,
    pub content: String,
    pub priority: Priority,
    pub estimated_tokens: u32,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PlanTelemetry {
    pub candidates_considered: usize,
    pub candidates_accepted: usize,
    pub candidates_rejected: usize,
}

#[derive(Debug, Clone)]
pub struct PlanResult {
    pub text: String,
    pub entries: Vec<PlannedEntry>,
    pub estimated_tokens: u32,
    pub truncated: bool,
    pub consumed_keys: Vec<String>,
    /// `Some("floor_unmet")` when zone allocation failed (spec §4.E step 3).
    pub reason: Option<String>,
    pub plan_telemetry: PlanTelemetry,
}

impl PlanResult {
    fn empty(reason: Option<String>) -> Self {
        Self {
            text: String::new(),
            entries: Vec::new(),
            estimated_tokens: 0,
            truncated: false,
            consumed_keys: Vec::new(),
            reason,
            plan_telemetry: PlanTelemetry::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArenaConfig {
    pub max_entries_per_session: usize,
    pub zone_layout_enabled: bool,
    pub zone_bands: HashMap<Zone, ZoneBand>,
    pub truncation_strategy: TruncationStrategy,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_entries_per_session: 4096,
            zone_layout_enabled: true,
            zone_bands: HashMap::new(),
            truncation_strategy: TruncationStrategy::Summarize,
        }
    }
}

const SEPARATOR: &str = "\n\n";

/// Per-session append-only store of context injection entries (spec §3.5,
/// component E).
pub struct ContextArena {
    sessions: RwLock<HashMap<String, SessionState>>,
    config: ArenaConfig,
}

impl ContextArena {
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Append algorithm (spec §4.E).
    pub fn append(&self, session_id: &str, input: AppendInput) -> AppendResult {
        let mut sessions = self.sessions.write();
        let state = sessions.entry(session_id.to_string()).or_default();

        let source = input.source.trim().to_string();
        let id = input.id.trim().to_string();
        if source.is_empty() || id.is_empty() {
            return AppendResult::default();
        }
        let key = entry_key(&source, &id);
        if input.once_per_session && state.once_keys.contains(&key) {
            return AppendResult::default();
        }

        let original_tokens = token::estimate_tokens(&input.content);
        let mut content = input.content;
        let mut estimated_tokens = original_tokens;
        let mut truncated = false;

        if let Some(cap) = input.per_source_cap {
            if estimated_tokens > cap {
                match refit::refit(&content, &source, &id, original_tokens, cap, self.config.truncation_strategy) {
                    Some(fitted) => {
                        estimated_tokens = token::estimate_tokens(&fitted);
                        content = fitted;
                        truncated = true;
                    }
                    None => return AppendResult::default(),
                }
            }
        }
        if estimated_tokens == 0 {
            return AppendResult::default();
        }

        let mut slo_enforced = None;
        if state.entries.len() >= self.config.max_entries_per_session {
            state.compact_to_latest();
            if state.entries.len() >= self.config.max_entries_per_session {
                match state.oldest_recall_degradable_key() {
                    Some(evict_key) => {
                        state.evict_key(&evict_key);
                        slo_enforced = Some(SloEnforced { dropped: false, evicted_key: Some(evict_key) });
                    }
                    None => {
                        if Zone::is_recall_degradable(&source) {
                            return AppendResult {
                                accepted: false,
                                slo_enforced: Some(SloEnforced { dropped: true, evicted_key: None }),
                            };
                        }
                        slo_enforced = Some(SloEnforced { dropped: false, evicted_key: None });
                    }
                }
            }
        }

        let index = state.entries.len();
        state.entries.push(StoredEntry {
            source,
            id,
            content,
            priority: input.priority,
            estimated_tokens,
            timestamp: input.timestamp,
            once_per_session: input.once_per_session,
            truncated,
            index,
            presented: false,
        });
        state.latest_index_by_key.insert(key, index);
        state.maybe_superseded_trim();

        AppendResult { accepted: true, slo_enforced }
    }

    /// Plan algorithm (spec §4.E/§4.G): sort, zone-allocate, and walk
    /// candidates into the global+zone budget, refitting or dropping on
    /// overflow.
    pub fn plan(&self, session_id: &str, total_token_budget: u32) -> PlanResult {
        let sessions = self.sessions.read();
        let state = match sessions.get(session_id) {
            Some(s) => s,
            None => return PlanResult::empty(None),
        };

        let mut candidates: Vec<&StoredEntry> = state
            .latest_index_by_key
            .values()
            .map(|&idx| &state.entries[idx])
            .filter(|e| !e.presented)
            .collect();

        if self.config.zone_layout_enabled {
            candidates.sort_by(|a, b| {
                Zone::from_source(&a.source)
                    .order()
                    .cmp(&Zone::from_source(&b.source).order())
                    .then(a.priority.order().cmp(&b.priority.order()))
                    .then(a.timestamp.cmp(&b.timestamp))
            });
        } else {
            candidates.sort_by(|a, b| {
                a.priority.order().cmp(&b.priority.order()).then(a.timestamp.cmp(&b.timestamp))
            });
        }

        let mut zone_remaining: Option<HashMap<Zone, u32>> = None;
        if self.config.zone_layout_enabled && !self.config.zone_bands.is_empty() {
            let mut demand: HashMap<Zone, u32> = HashMap::new();
            for z in ZONE_ORDER.iter() {
                demand.insert(*z, 0);
            }
            for entry in &candidates {
                *demand.entry(Zone::from_source(&entry.source)).or_insert(0) += entry.estimated_tokens;
            }
            match zone_allocator::allocate(total_token_budget, &demand, &self.config.zone_bands) {
                Ok(caps) => zone_remaining = Some(caps),
                Err(AllocationError::FloorUnmet) => {
                    let considered = candidates.len();
                    let mut result = PlanResult::empty(Some("floor_unmet".to_string()));
                    result.plan_telemetry = PlanTelemetry {
                        candidates_considered: considered,
                        candidates_accepted: 0,
                        candidates_rejected: considered,
                    };
                    return result;
                }
            }
        }

        let separator_tokens = token::estimate_tokens(SEPARATOR);
        let mut global_remaining = total_token_budget;
        let mut accepted: Vec<PlannedEntry> = Vec::new();
        let mut consumed_keys = Vec::new();
        let mut truncated_any = false;
        let mut considered = 0usize;

        for entry in candidates.iter() {
            considered += 1;
            let zone = Zone::from_source(&entry.source);
            let sep_cost = if accepted.is_empty() { 0 } else { separator_tokens };

            if global_remaining < sep_cost {
                if matches!(self.config.truncation_strategy, TruncationStrategy::Tail) {
                    break;
                }
                continue;
            }
            let budget_after_sep = global_remaining - sep_cost;
            let zone_budget = match &zone_remaining {
                Some(map) => *map.get(&zone).unwrap_or(&0),
                None => budget_after_sep,
            };
            let entry_budget = budget_after_sep.min(zone_budget);

            if entry_budget == 0 {
                if matches!(self.config.truncation_strategy, TruncationStrategy::Tail) {
                    break;
                }
                continue;
            }

            let (content, est, trunc) = if entry.estimated_tokens <= entry_budget {
                (entry.content.clone(), entry.estimated_tokens, entry.truncated)
            } else {
                match refit::refit(&entry.content, &entry.source, &entry.id, entry.estimated_tokens, entry_budget, self.config.truncation_strategy) {
                    Some(fitted) => {
                        let est = token::estimate_tokens(&fitted);
                        (fitted, est, true)
                    }
                    None => {
                        if matches!(self.config.truncation_strategy, TruncationStrategy::Tail) {
                            break;
                        }
                        continue;
                    }
                }
            };

            global_remaining -= sep_cost + est;
            if let Some(map) = &mut zone_remaining {
                if let Some(v) = map.get_mut(&zone) {
                    *v = v.saturating_sub(est);
                }
            }
            truncated_any = truncated_any || trunc;
            consumed_keys.push(entry_key(&entry.source, &entry.id));
            accepted.push(PlannedEntry {
                source: entry.source.clone(),
                id: entry.id.clone(),
                content,
                priority: entry.priority,
                estimated_tokens: est,
                truncated: trunc,
            });
        }

        let text = accepted.iter().map(|e| e.content.as_str()).collect::<Vec<_>>().join(SEPARATOR);
        let estimated_tokens = token::estimate_tokens(&text);
        let accepted_count = accepted.len();

        PlanResult {
            text,
            entries: accepted,
            estimated_tokens,
            truncated: truncated_any,
            consumed_keys,
            reason: None,
            plan_telemetry: PlanTelemetry {
                candidates_considered: considered,
                candidates_accepted: accepted_count,
                candidates_rejected: considered - accepted_count,
            },
        }
    }

    /// Mark `consumed_keys` presented; for `oncePerSession` entries, also
    /// add them to `once_keys` so they never re-enter (spec §4.E).
    pub fn mark_presented(&self, session_id: &str, consumed_keys: &[String]) {
        let mut sessions = self.sessions.write();
        let Some(state) = sessions.get_mut(session_id) else { return };
        for key in consumed_keys {
            if let Some(&idx) = state.latest_index_by_key.get(key) {
                let once = state.entries[idx].once_per_session;
                state.entries[idx].presented = true;
                if once {
                    state.once_keys.insert(key.clone());
                }
            }
        }
    }

    /// Rewind non-once `presented` flags so a new turn may re-include them.
    pub fn clear_pending(&self, session_id: &str) {
        let mut sessions = self.sessions.write();
        let Some(state) = sessions.get_mut(session_id) else { return };
        for entry in state.entries.iter_mut() {
            if !entry.once_per_session {
                entry.presented = false;
            }
        }
    }

    /// Wipe the session's arena state entirely (spec §4.E: triggered by
    /// compaction).
    pub fn reset_epoch(&self, session_id: &str) {
        self.sessions.write().remove(session_id);
    }

    pub fn snapshot(&self, session_id: &str) -> ArenaSnapshot {
        let sessions = self.sessions.read();
        match sessions.get(session_id) {
            Some(state) => ArenaSnapshot {
                entry_count: state.entries.len(),
                active_count: state.latest_index_by_key.len(),
                once_key_count: state.once_keys.len(),
            },
            None => ArenaSnapshot::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    pub entry_count: usize,
    pub active_count: usize,
    pub once_key_count: usize,
}
