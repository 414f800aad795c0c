//! Skill Selector (spec §4.I, component I).
//!
//! Lexical scoring against a prompt: tokenizer, intent/body region split,
//! alias/stem-aware term matching, and weighted signal aggregation.
//! Grounded on the teacher's general "score candidates, sort, tie-break on
//! name" shape used by its skill ranking, generalized to this contract's
//! exact weights.

use sa_domain::skill::{NegativeScope, SkillDocument};
use std::collections::HashSet;

/// A small set of English intent synonym groups consulted when matching a
/// trigger term against prompt tokens. Deliberately minimal — this is not
/// a general thesaurus, only the handful of verbs skill authors are likely
/// to phrase differently than their trigger list.
const ALIAS_GROUPS: &[&[&str]] = &[
    &["review", "audit", "assess"],
    &["fix", "repair", "resolve"],
    &["write", "draft", "compose", "author"],
    &["test", "verify", "validate"],
    &["search", "find", "locate"],
    &["delete", "remove", "erase"],
    &["build", "compile", "construct"],
    &["explain", "describe", "clarify"],
    &["summarize", "condense", "digest"],
];

/// Collapse common English suffixes so `"reviewing"` and `"reviewed"`
/// match a trigger term `"review"` without an exhaustive word list.
fn stem(token: &str) -> String {
    let len = token.chars().count();
    if token.ends_with("ies") && len > 4 {
        let mut s: String = token.chars().take(len - 3).collect();
        s.push('y');
        return s;
    }
    if token.ends_with("ing") && len > 5 {
        return token.chars().take(len - 3).collect();
    }
    if token.ends_with("ed") && len > 4 {
        return token.chars().take(len - 2).collect();
    }
    if token.ends_with('s') && !token.ends_with("ss") && len.saturating_sub(1) > 3 {
        return token.chars().take(len - 1).collect();
    }
    token.to_string()
}

fn alias_match(a: &str, b: &str) -> bool {
    let (sa, sb) = (stem(a), stem(b));
    if sa == sb {
        return true;
    }
    ALIAS_GROUPS.iter().any(|g| g.contains(&sa.as_str()) && g.contains(&sb.as_str()))
}

/// Tokenizer: runs of Unicode word characters (letters/digits/`_`/`-`),
/// lowercased; ASCII tokens shorter than 2 chars are dropped (non-ASCII
/// tokens, e.g. a single CJK character, are kept regardless of length).
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '-';
    for c in text.chars() {
        if is_word(c) {
            current.push(c);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
        .into_iter()
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() >= 2 || !t.is_ascii())
        .collect()
}

const IMPERATIVE_PREFIXES: &[&str] = &[
    "please", "can you", "could you", "would you", "help me", "i need you to", "i want you to",
];

fn strip_imperative_prefix(lower: &str) -> &str {
    let trimmed = lower.trim_start();
    for p in IMPERATIVE_PREFIXES {
        if let Some(rest) = trimmed.strip_prefix(p) {
            return rest.trim_start();
        }
    }
    trimmed
}

/// Split the lowercased prompt into `(intent_region_tokens, body_tokens)`
/// per spec §4.I: intent region is the first sentence after stripping an
/// imperative prefix, capped at 24 tokens; body is the remainder.
fn split_regions(prompt_lower: &str) -> (Vec<String>, Vec<String>) {
    let after_prefix = strip_imperative_prefix(prompt_lower);
    let boundary = after_prefix.find(['.', '!', '?', '\n']).unwrap_or(after_prefix.len());
    let intent_text = &after_prefix[..boundary];
    let body_text = if boundary < after_prefix.len() {
        &after_prefix[boundary + 1..]
    } else {
        ""
    };
    let mut intent_tokens = tokenize(intent_text);
    intent_tokens.truncate(24);
    (intent_tokens, tokenize(body_text))
}

fn token_hit(tokens: &[String], term: &str) -> bool {
    for t in tokens {
        if t == term || alias_match(t, term) {
            return true;
        }
    }
    if term.is_ascii() && term.chars().count() >= 3 {
        return tokens.iter().any(|t| t.contains(term));
    }
    false
}

fn phrase_hit(tokens: &[String], phrase_tokens: &[String]) -> bool {
    if phrase_tokens.is_empty() || tokens.len() < phrase_tokens.len() {
        return false;
    }
    tokens
        .windows(phrase_tokens.len())
        .any(|w| w.iter().zip(phrase_tokens).all(|(a, b)| a == b || alias_match(a, b)))
}

/// Match `term` (a trigger/tag string, possibly multi-word) against
/// `tokens`: single-token terms use `token_hit`; multi-token terms must
/// appear as an ordered sequence (`phrase_hit`).
fn term_hit(tokens: &[String], term: &str) -> bool {
    let term_tokens = tokenize(term);
    match term_tokens.len() {
        0 => false,
        1 => token_hit(tokens, &term_tokens[0]),
        _ => phrase_hit(tokens, &term_tokens),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoreBreakdown {
    pub name_match: bool,
    pub intent_match: bool,
    pub intent_body_match: bool,
    pub phrase_match: bool,
    pub matched_tags: Vec<String>,
    pub matched_topics: Vec<String>,
    pub matched_anti_tags: Vec<String>,
    pub cost_adjustment: i32,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub name: String,
    pub score: f32,
    pub reason: String,
    pub breakdown: ScoreBreakdown,
}

fn build_reason(b: &ScoreBreakdown) -> String {
    let mut parts = Vec::new();
    if b.name_match {
        parts.push("name matched prompt".to_string());
    }
    if b.intent_match {
        parts.push("intent region matched".to_string());
    } else if b.intent_body_match {
        parts.push("body matched (no intent hit)".to_string());
    }
    if b.phrase_match {
        parts.push("trigger phrase matched".to_string());
    }
    if !b.matched_tags.is_empty() {
        parts.push(format!("tags: {}", b.matched_tags.join(",")));
    }
    if !b.matched_topics.is_empty() {
        parts.push(format!("topics: {}", b.matched_topics.join(",")));
    }
    if !b.matched_anti_tags.is_empty() {
        parts.push(format!("anti-tags penalized: {}", b.matched_anti_tags.join(",")));
    }
    if b.cost_adjustment != 0 {
        parts.push(format!("cost_hint adjustment {:+}", b.cost_adjustment));
    }
    if parts.is_empty() {
        "no signals matched".to_string()
    } else {
        parts.join("; ")
    }
}

/// Score every enabled skill in `docs` against `prompt` and return the
/// top `k` selections, highest score first, ties broken alphabetically on
/// name (spec §4.I).
pub fn select(docs: &[SkillDocument], prompt: &str, k: usize) -> Vec<Selection> {
    if prompt.trim().is_empty() {
        return Vec::new();
    }
    let lower = prompt.to_lowercase();
    let full_tokens = tokenize(&lower);
    let (intent_tokens, body_tokens) = split_regions(&lower);

    let mut scored: Vec<Selection> = docs
        .iter()
        .filter_map(|doc| score_one(doc, &full_tokens, &intent_tokens, &body_tokens))
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.name.cmp(&b.name)));
    scored.truncate(k);
    scored
}

fn score_one(
    doc: &SkillDocument,
    full_tokens: &[String],
    intent_tokens: &[String],
    body_tokens: &[String],
) -> Option<Selection> {
    let contract = &doc.contract;
    let triggers = contract.triggers.as_ref();

    // Negative rules eliminate the candidate outright; applied first.
    if let Some(t) = triggers {
        for neg in &t.negatives {
            let region = match neg.scope {
                NegativeScope::Intent => intent_tokens,
                NegativeScope::Topic => full_tokens,
            };
            if neg.terms.iter().any(|term| term_hit(region, term)) {
                return None;
            }
        }
    }

    let mut breakdown = ScoreBreakdown::default();
    let mut score: f32 = 0.0;

    if term_hit(full_tokens, &contract.name) {
        breakdown.name_match = true;
        score += 10.0;
    }

    let fallback_intents: Vec<String> = vec![contract.name.clone()];
    let intents: &[String] = match triggers {
        Some(t) if !t.intents.is_empty() => &t.intents,
        _ => &fallback_intents,
    };

    if intents.iter().any(|i| term_hit(intent_tokens, i)) {
        breakdown.intent_match = true;
        score += 8.0;
    } else if intents.iter().any(|i| term_hit(body_tokens, i)) {
        breakdown.intent_body_match = true;
        score += 4.0;
    }

    if let Some(t) = triggers {
        if t.phrases.iter().any(|p| term_hit(full_tokens, p)) {
            breakdown.phrase_match = true;
            score += 7.0;
        }
        // Topics are surfaced in the reason string for operator visibility
        // only; no weight table entry covers them, so they never contribute
        // to the score itself.
        let topic_hits: Vec<String> = t.topics.iter().filter(|topic| term_hit(full_tokens, topic)).cloned().collect();
        breakdown.matched_topics = topic_hits.into_iter().take(3).collect();
    }

    let tag_hits: Vec<String> = contract.tags.iter().filter(|tag| term_hit(full_tokens, tag)).cloned().collect();
    breakdown.matched_tags = tag_hits.into_iter().take(3).collect();
    score += breakdown.matched_tags.len() as f32 * 3.0;

    let anti_hits: Vec<String> = contract.anti_tags.iter().filter(|tag| term_hit(full_tokens, tag)).cloned().collect();
    breakdown.matched_anti_tags = anti_hits;
    score -= breakdown.matched_anti_tags.len() as f32 * 3.0;

    breakdown.cost_adjustment = contract.cost_hint.score_adjustment();
    score += breakdown.cost_adjustment as f32;

    let reason = build_reason(&breakdown);
    Some(Selection {
        name: contract.name.clone(),
        score,
        reason,
        breakdown,
    })
}

/// Skills named in `disabled` never enter selection, matching `skills.disabled` config.
pub fn filter_disabled<'a>(docs: &'a [SkillDocument], disabled: &HashSet<String>) -> Vec<&'a SkillDocument> {
    docs.iter().filter(|d| !disabled.contains(&d.name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::skill::{Budget, CostHint, Dispatch, DispatchMode, Negative, SkillContract, Stability, Tier, ToolsPolicy, Triggers};

    fn doc(name: &str, intents: &[&str], tags: &[&str], cost: CostHint) -> SkillDocument {
        SkillDocument {
            name: name.to_string(),
            description: format!("{name} description"),
            tier: Tier::Base,
            file_path: format!("{name}/SKILL.md"),
            base_dir: name.to_string(),
            markdown: String::new(),
            contract: SkillContract {
                name: name.to_string(),
                tier: Tier::Base,
                tags: tags.iter().map(|s| s.to_string()).collect(),
                anti_tags: vec![],
                triggers: Some(Triggers {
                    intents: intents.iter().map(|s| s.to_string()).collect(),
                    topics: vec![],
                    phrases: vec![],
                    negatives: vec![],
                }),
                dispatch: Some(Dispatch { gate_threshold: 12.0, auto_threshold: 20.0, default_mode: DispatchMode::Suggest }),
                tools: ToolsPolicy::default(),
                budget: Budget::default(),
                outputs: vec![],
                composable_with: vec![],
                consumes: vec![],
                escalation_path: None,
                max_parallel: None,
                stability: Stability::Stable,
                cost_hint: cost,
                requires: Default::default(),
                install: vec![],
            },
        }
    }

    #[test]
    fn empty_prompt_selects_nothing() {
        let docs = vec![doc("review", &["review"], &[], CostHint::Medium)];
        assert!(select(&docs, "", 5).is_empty());
        assert!(select(&docs, "   ", 5).is_empty());
    }

    #[test]
    fn matches_intent_region_with_alias_and_stemming() {
        let docs = vec![doc("review", &["review"], &[], CostHint::Medium)];
        let out = select(&docs, "Please assess architecture risks in depth", 5);
        assert_eq!(out.len(), 1);
        assert!(out[0].breakdown.intent_match);
    }

    #[test]
    fn anti_tag_penalizes_score() {
        let mut d = doc("patching", &["patch"], &[], CostHint::Medium);
        d.contract.anti_tags = vec!["read-only".into()];
        let out = select(&[d], "patch this read-only config", 5);
        assert!(out[0].score < 10.0 + 8.0);
        assert!(!out[0].breakdown.matched_anti_tags.is_empty());
    }

    #[test]
    fn negative_rule_eliminates_candidate() {
        let mut d = doc("review", &["review"], &[], CostHint::Medium);
        d.contract.triggers.as_mut().unwrap().negatives = vec![Negative { scope: NegativeScope::Intent, terms: vec!["skip".into()] }];
        let out = select(&[d], "skip the review entirely", 5);
        assert!(out.is_empty());
    }

    #[test]
    fn ties_break_alphabetically_on_name() {
        let docs = vec![doc("zeta", &["zeta"], &[], CostHint::Medium), doc("alpha", &["alpha"], &[], CostHint::Medium)];
        // Neither term appears; both score from cost_hint only (0), tie.
        let out = select(&docs, "unrelated words entirely here", 5);
        assert_eq!(out[0].name, "alpha");
    }

    #[test]
    fn cost_hint_adjusts_score() {
        let low = doc("low-cost", &["low-cost"], &[], CostHint::Low);
        let high = doc("high-cost", &["high-cost"], &[], CostHint::High);
        let out = select(&[low.clone(), high.clone()], "run low-cost now", 5);
        assert_eq!(out[0].breakdown.cost_adjustment, 1);
    }

    #[test]
    fn name_without_triggers_falls_back_to_name_as_intent() {
        let mut d = doc("auditor", &[], &[], CostHint::Medium);
        d.contract.triggers = None;
        let out = select(&[d], "please audit this codebase", 5);
        assert_eq!(out.len(), 1);
        assert!(out[0].breakdown.intent_match);
    }
}
