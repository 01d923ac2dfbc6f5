//! `context` command: retrieve, then pack into a token budget.

use anyhow::Result;
use std::path::Path;
use tracing::info;

use context_scanner_core::assemble::{assemble, render_with_header, CharRatioEstimator, TokenEstimator};
use context_scanner_core::models::AssembledContext;

use crate::config::Config;
use crate::search::retrieve_for_query;

/// Retrieve `n` chunks for `query` and pack them into `budget` tokens.
pub async fn build_context(
    config: &Config,
    query: &str,
    n: usize,
    budget: i64,
    estimator: &dyn TokenEstimator,
) -> Result<AssembledContext> {
    let ranked = retrieve_for_query(config, query, n).await?;
    let context = assemble(&ranked, budget, &render_with_header, estimator);
    info!(
        accepted = context.accepted,
        considered = context.considered,
        tokens = context.tokens_used,
        budget,
        "assembled context"
    );
    Ok(context)
}

/// Pick the estimator: an exact tokenizer when one is given, else `ceil(chars / 4)`.
pub fn estimator_for(tokenizer: Option<&Path>) -> Result<Box<dyn TokenEstimator>> {
    match tokenizer {
        None => Ok(Box::new(CharRatioEstimator::default())),
        #[cfg(feature = "exact-tokens")]
        Some(path) => Ok(Box::new(crate::tokens::TokenizerEstimator::from_file(path)?)),
        #[cfg(not(feature = "exact-tokens"))]
        Some(_) => anyhow::bail!("--tokenizer requires building with the `exact-tokens` feature"),
    }
}

/// Run the `context` command.
///
/// The body goes to stdout; the "used N of M" summary goes to stderr so
/// the output can be piped straight into a prompt.
pub async fn run_context(
    config: &Config,
    query: &str,
    n: Option<usize>,
    budget: Option<i64>,
    tokenizer: Option<&Path>,
) -> Result<()> {
    let estimator = estimator_for(tokenizer)?;
    let n = n.unwrap_or(config.retrieval.n);
    let budget = budget.unwrap_or(config.retrieval.budget_tokens);

    let context = build_context(config, query, n, budget, estimator.as_ref()).await?;
    print!("{}", context.body);
    eprintln!(
        "used {} of {} candidates ({} / {} tokens)",
        context.accepted, context.considered, context.tokens_used, context.budget
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_estimator_is_char_ratio() {
        let estimator = estimator_for(None).unwrap();
        assert_eq!(estimator.estimate("abcdefgh"), 2);
        assert_eq!(estimator.estimate("abcdefghi"), 3);
    }

    #[cfg(not(feature = "exact-tokens"))]
    #[test]
    fn tokenizer_flag_requires_feature() {
        assert!(estimator_for(Some(Path::new("tokenizer.json"))).is_err());
    }
}
