//! Truncation/refit strategies (spec §4.G).
//!
//! Generalizes the teacher's `truncate_per_file`/`apply_total_cap`
//! (`[TRUNCATED]`/`[TRUNCATED_TOTAL_CAP]` markers) into the three
//! configurable strategies the arena planner consults when a candidate
//! entry doesn't fit its allotted budget whole.

use crate::token::{estimate_tokens, truncate_text_to_token_budget};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TruncationStrategy {
    DropEntry,
    Summarize,
    Tail,
}

impl Default for TruncationStrategy {
    fn default() -> Self {
        TruncationStrategy::Summarize
    }
}

/// Attempt to fit `content` into `budget` tokens under `strategy`. Returns
/// `None` when even the smallest representation cannot fit (spec §4.G).
pub fn refit(
    content: &str,
    source: &str,
    id: &str,
    original_tokens: u32,
    budget: u32,
    strategy: TruncationStrategy,
) -> Option<String> {
    if budget == 0 {
        return None;
    }
    match strategy {
        TruncationStrategy::Tail | TruncationStrategy::DropEntry => {
            let truncated = truncate_text_to_token_budget(content, budget);
            if truncated.is_empty() {
                None
            } else {
                Some(truncated)
            }
        }
        TruncationStrategy::Summarize => {
            let header = format!(
                "[budget_limit] source={source} id={id} original_tokens={original_tokens}"
            );
            let fitted = truncate_text_to_token_budget(&header, budget);
            if fitted.is_empty() || estimate_tokens(&fitted) > budget {
                None
            } else {
                Some(fitted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_truncates_to_prefix() {
        let content = "abcdefghijklmnop";
        let out = refit(content, "s", "i", 4, 2, TruncationStrategy::Tail).unwrap();
        assert!(content.starts_with(&out));
        assert!(estimate_tokens(&out) <= 2);
    }

    #[test]
    fn summarize_produces_header_with_metadata() {
        let out = refit("long content here", "memory-recall", "rec1", 50, 20, TruncationStrategy::Summarize).unwrap();
        assert!(out.contains("memory-recall"));
        assert!(out.contains("rec1"));
        assert!(out.contains("50"));
    }

    #[test]
    fn zero_budget_always_fails() {
        assert!(refit("x", "s", "i", 1, 0, TruncationStrategy::Tail).is_none());
        assert!(refit("x", "s", "i", 1, 0, TruncationStrategy::Summarize).is_none());
    }

    #[test]
    fn summarize_fails_when_header_cannot_fit_even_minimally() {
        let out = refit("content", "a-very-long-source-name-indeed", "a-very-long-id-indeed", 999, 1, TruncationStrategy::Summarize);
        assert!(out.is_none() || estimate_tokens(&out.unwrap()) <= 1);
    }
}
