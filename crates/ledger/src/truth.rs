//! Truth ledger reducer (spec §4.C).

use sa_domain::event::kinds;
use sa_domain::truth::{TruthFact, TruthState, TruthStatus};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct FactUpsertedPayload {
    id: String,
    kind: String,
    severity: sa_domain::truth::Severity,
    summary: String,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    evidence_ids: Vec<String>,
    #[serde(default)]
    status: Option<TruthStatus>,
}

#[derive(Debug, Deserialize)]
struct FactResolvedPayload {
    id: String,
}

pub fn reduce(state: &mut TruthState, event_type: &str, timestamp: i64, payload: &Value) {
    match event_type {
        kinds::TRUTH_FACT_UPSERTED => {
            if let Ok(p) = serde_json::from_value::<FactUpsertedPayload>(payload.clone()) {
                match state.index(&p.id) {
                    Some(idx) => {
                        let fact = &mut state.facts[idx];
                        fact.kind = p.kind;
                        fact.severity = p.severity;
                        fact.summary = p.summary;
                        fact.details = p.details;
                        for ev in p.evidence_ids {
                            if !fact.evidence_ids.contains(&ev) {
                                fact.evidence_ids.push(ev);
                            }
                        }
                        fact.last_seen_at = timestamp;
                        if let Some(status) = p.status {
                            if status == TruthStatus::Resolved && fact.status != TruthStatus::Resolved {
                                fact.resolved_at = Some(fact.resolved_at.unwrap_or(timestamp));
                            }
                            fact.status = status;
                        }
                    }
                    None => {
                        let status = p.status.unwrap_or(TruthStatus::Active);
                        let resolved_at = if status == TruthStatus::Resolved { Some(timestamp) } else { None };
                        state.facts.push(TruthFact {
                            id: p.id,
                            kind: p.kind,
                            status,
                            severity: p.severity,
                            summary: p.summary,
                            details: p.details,
                            evidence_ids: p.evidence_ids,
                            first_seen_at: timestamp,
                            last_seen_at: timestamp,
                            resolved_at,
                        });
                    }
                }
            }
        }
        kinds::TRUTH_FACT_RESOLVED => {
            if let Ok(p) = serde_json::from_value::<FactResolvedPayload>(payload.clone()) {
                if let Some(idx) = state.index(&p.id) {
                    let fact = &mut state.facts[idx];
                    fact.status = TruthStatus::Resolved;
                    fact.last_seen_at = fact.last_seen_at.max(timestamp);
                    fact.resolved_at = Some(timestamp.max(fact.last_seen_at));
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upsert_merges_evidence_union_preserving_first_seen() {
        let mut state = TruthState::default();
        reduce(
            &mut state,
            kinds::TRUTH_FACT_UPSERTED,
            1,
            &json!({"id":"f1","kind":"build_fail","severity":"error","summary":"s","evidence_ids":["e1"]}),
        );
        reduce(
            &mut state,
            kinds::TRUTH_FACT_UPSERTED,
            5,
            &json!({"id":"f1","kind":"build_fail","severity":"error","summary":"s2","evidence_ids":["e1","e2"]}),
        );
        assert_eq!(state.facts.len(), 1);
        let fact = &state.facts[0];
        assert_eq!(fact.first_seen_at, 1);
        assert_eq!(fact.last_seen_at, 5);
        assert_eq!(fact.evidence_ids, vec!["e1".to_string(), "e2".to_string()]);
    }

    #[test]
    fn resolved_sets_resolved_at_ge_last_seen() {
        let mut state = TruthState::default();
        reduce(&mut state, kinds::TRUTH_FACT_UPSERTED, 1, &json!({"id":"f1","kind":"k","severity":"warn","summary":"s"}));
        reduce(&mut state, kinds::TRUTH_FACT_RESOLVED, 10, &json!({"id":"f1"}));
        let fact = &state.facts[0];
        assert_eq!(fact.status, TruthStatus::Resolved);
        assert!(fact.resolved_at.unwrap() >= fact.last_seen_at);
    }

    #[test]
    fn top_active_ids_orders_by_severity_then_recency() {
        let mut state = TruthState::default();
        reduce(&mut state, kinds::TRUTH_FACT_UPSERTED, 1, &json!({"id":"low","kind":"k","severity":"info","summary":"s"}));
        reduce(&mut state, kinds::TRUTH_FACT_UPSERTED, 2, &json!({"id":"high-old","kind":"k","severity":"error","summary":"s"}));
        reduce(&mut state, kinds::TRUTH_FACT_UPSERTED, 3, &json!({"id":"high-new","kind":"k","severity":"error","summary":"s"}));
        let top = state.top_active_ids(6);
        assert_eq!(top, vec!["high-new".to_string(), "high-old".to_string(), "low".to_string()]);
    }
}
