//! Token-budgeted context assembly.
//!
//! Packs ranked retrieval hits into a single context string whose
//! estimated token size never exceeds the budget.
//!
//! # Packing rule
//!
//! Candidates are consumed in the order given, which is ascending
//! distance, so rank doubles as inclusion priority. A candidate is
//! accepted while `remaining - estimate > 0`. The first candidate that
//! does not fit ends packing: later candidates are never considered,
//! even when they are small enough, and nothing is reordered.
//!
//! A budget that is already `<= 0` yields an empty context. That is a
//! valid outcome, not an error.

use crate::models::{AssembledContext, QueryHit, QueryResult};

/// Approximate characters-per-token ratio used by the default estimator.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimates how many tokens a rendered text costs.
pub trait TokenEstimator {
    fn estimate(&self, text: &str) -> usize;
}

impl<F> TokenEstimator for F
where
    F: Fn(&str) -> usize,
{
    fn estimate(&self, text: &str) -> usize {
        self(text)
    }
}

/// `ceil(chars / chars_per_token)`: a cheap stand-in for tokenization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRatioEstimator {
    pub chars_per_token: usize,
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: CHARS_PER_TOKEN,
        }
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token.max(1))
    }
}

/// Render a hit with its source path as a header.
///
/// ```rust
/// use context_scanner_core::assemble::render_with_header;
/// use context_scanner_core::models::{ChunkMetadata, QueryHit};
///
/// let hit = QueryHit {
///     id: "src/a.rs#0".into(),
///     document: "fn main() {}\n".into(),
///     metadata: ChunkMetadata { source_id: "src/a.rs".into(), index: 0 },
///     distance: 0.1,
/// };
/// assert_eq!(render_with_header(&hit), "--- src/a.rs ---\nfn main() {}\n");
/// ```
pub fn render_with_header(hit: &QueryHit) -> String {
    format!("--- {} ---\n{}\n", hit.metadata.source_id, hit.document.trim())
}

/// Greedily pack `ranked` into at most `budget_tokens` estimated tokens.
pub fn assemble(
    ranked: &QueryResult,
    budget_tokens: i64,
    render: &dyn Fn(&QueryHit) -> String,
    estimator: &dyn TokenEstimator,
) -> AssembledContext {
    let mut context = AssembledContext {
        considered: ranked.len(),
        budget: budget_tokens,
        ..Default::default()
    };

    let mut remaining = budget_tokens;
    if remaining <= 0 {
        return context;
    }

    for hit in ranked.iter() {
        let rendered = render(hit);
        let cost = i64::try_from(estimator.estimate(&rendered)).unwrap_or(i64::MAX);
        if remaining - cost <= 0 {
            break;
        }
        remaining -= cost;
        context.tokens_used += cost;
        context.accepted += 1;
        context.body.push_str(&rendered);
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn hit(index: usize, text: &str) -> QueryHit {
        QueryHit {
            id: format!("doc.md#{}", index),
            document: text.to_string(),
            metadata: ChunkMetadata {
                source_id: "doc.md".to_string(),
                index,
            },
            distance: index as f32 * 0.1,
        }
    }

    fn plain(hit: &QueryHit) -> String {
        hit.document.clone()
    }

    #[test]
    fn test_budget_120_takes_two_of_ten() {
        let ranked = QueryResult {
            hits: (0..10).map(|i| hit(i, &"x".repeat(200))).collect(),
        };
        let ctx = assemble(&ranked, 120, &plain, &CharRatioEstimator::default());
        assert_eq!(ctx.accepted, 2);
        assert_eq!(ctx.considered, 10);
        assert_eq!(ctx.tokens_used, 100);
        assert_eq!(ctx.body.len(), 400);
    }

    #[test]
    fn test_stops_at_first_overflow() {
        let ranked = QueryResult {
            hits: vec![hit(0, "a"), hit(1, "b"), hit(2, "c"), hit(3, "d")],
        };
        let costs = |text: &str| -> usize {
            match text {
                "a" | "b" => 50,
                "c" => 80,
                _ => 10,
            }
        };
        let ctx = assemble(&ranked, 120, &plain, &costs);
        assert_eq!(ctx.accepted, 2);
        assert_eq!(ctx.body, "ab");
    }

    #[test]
    fn test_zero_and_negative_budget() {
        let ranked = QueryResult {
            hits: vec![hit(0, "tiny")],
        };
        for budget in [0, -5] {
            let ctx = assemble(&ranked, budget, &plain, &CharRatioEstimator::default());
            assert_eq!(ctx.accepted, 0);
            assert!(ctx.body.is_empty());
            assert_eq!(ctx.considered, 1);
        }
    }

    #[test]
    fn test_never_exceeds_budget() {
        let estimator = CharRatioEstimator::default();
        let ranked = QueryResult {
            hits: (0..20)
                .map(|i| hit(i, &"word ".repeat(1 + (i * 7) % 13)))
                .collect(),
        };
        for budget in 0..200 {
            let ctx = assemble(&ranked, budget, &render_with_header, &estimator);
            assert!(estimator.estimate(&ctx.body) as i64 <= budget.max(0));
            assert!(ctx.tokens_used <= budget.max(0));
        }
    }

    #[test]
    fn test_preserves_rank_order_with_headers() {
        let ranked = QueryResult {
            hits: vec![hit(0, "first"), hit(1, "second")],
        };
        let ctx = assemble(&ranked, 1000, &render_with_header, &CharRatioEstimator::default());
        assert_eq!(ctx.accepted, 2);
        assert_eq!(
            ctx.body,
            "--- doc.md ---\nfirst\n--- doc.md ---\nsecond\n"
        );
    }

    #[test]
    fn test_char_ratio_rounds_up() {
        let e = CharRatioEstimator::default();
        assert_eq!(e.estimate(""), 0);
        assert_eq!(e.estimate("abc"), 1);
        assert_eq!(e.estimate("abcd"), 1);
        assert_eq!(e.estimate("abcde"), 2);
    }
}
