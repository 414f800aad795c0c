//! Task ledger reducer (spec §4.B). Pure: `reduce(state, payload, ts) -> state'`.

use sa_domain::event::kinds;
use sa_domain::task::{Blocker, TaskItem, TaskState};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct ItemAddedPayload {
    id: String,
    text: String,
    #[serde(default = "default_status")]
    status: sa_domain::task::ItemStatus,
}

fn default_status() -> sa_domain::task::ItemStatus {
    sa_domain::task::ItemStatus::Todo
}

#[derive(Debug, Deserialize)]
struct ItemUpdatedPayload {
    id: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    status: Option<sa_domain::task::ItemStatus>,
}

#[derive(Debug, Deserialize)]
struct BlockerRecordedPayload {
    id: String,
    message: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    truth_fact_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockerResolvedPayload {
    id: String,
}

/// Fold one event into `state`, in place. Malformed payloads for a known
/// event type are ignored (treated as a no-op) rather than panicking —
/// the reducer never throws on well-formed *shape*; shape mismatches are
/// the tape-corruption case handled upstream by `EventRecord::decode`.
pub fn reduce(state: &mut TaskState, event_type: &str, timestamp: i64, payload: &Value) {
    match event_type {
        kinds::TASK_SPEC_SET => {
            if let Ok(spec) = serde_json::from_value::<sa_domain::task::TaskSpec>(payload.clone()) {
                state.spec = Some(spec);
            }
        }
        kinds::TASK_CHECKPOINT_SET => {
            if let Ok(full) = serde_json::from_value::<TaskState>(payload.clone()) {
                *state = full;
            }
        }
        kinds::TASK_ITEM_ADDED => {
            if let Ok(p) = serde_json::from_value::<ItemAddedPayload>(payload.clone()) {
                if state.item_index(&p.id).is_none() {
                    state.items.push(TaskItem {
                        id: p.id,
                        text: p.text,
                        status: p.status,
                        created_at: timestamp,
                        updated_at: timestamp,
                    });
                }
            }
        }
        kinds::TASK_ITEM_UPDATED => {
            if let Ok(p) = serde_json::from_value::<ItemUpdatedPayload>(payload.clone()) {
                if let Some(idx) = state.item_index(&p.id) {
                    let item = &mut state.items[idx];
                    if let Some(text) = p.text {
                        item.text = text;
                    }
                    if let Some(status) = p.status {
                        item.status = status;
                    }
                    item.updated_at = timestamp.max(item.created_at);
                }
                // id missing -> no-op, per spec §4.B.
            }
        }
        kinds::TASK_BLOCKER_RECORDED => {
            if let Ok(p) = serde_json::from_value::<BlockerRecordedPayload>(payload.clone()) {
                match state.blocker_index(&p.id) {
                    Some(idx) => {
                        // Existing blocker: only message/source may change.
                        state.blockers[idx].message = p.message;
                        state.blockers[idx].source = p.source;
                    }
                    None => state.blockers.push(Blocker {
                        id: p.id,
                        message: p.message,
                        created_at: timestamp,
                        source: p.source,
                        truth_fact_id: p.truth_fact_id,
                    }),
                }
            }
        }
        kinds::TASK_BLOCKER_RESOLVED => {
            if let Ok(p) = serde_json::from_value::<BlockerResolvedPayload>(payload.clone()) {
                state.blockers.retain(|b| b.id != p.id);
            }
        }
        kinds::TASK_STATUS_UPDATED => {
            if let Ok(status) = serde_json::from_value::<sa_domain::task::TaskStatusBlock>(payload.clone()) {
                state.status = Some(status);
            }
        }
        _ => {}
    }
}
