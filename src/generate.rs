//! `ask` command: assembled context plus a single generation call.
//!
//! Sends `POST {generation.url}/api/generate` with `stream: false` and
//! prints the `response` field. There is no retry: a failed generation
//! is reported once and the command exits non-zero.

use anyhow::{anyhow, bail, Context, Result};
use std::time::Duration;
use tracing::{debug, info};

use context_scanner_core::assemble::CharRatioEstimator;

use crate::config::{Config, GenerationConfig};
use crate::context::build_context;

/// Build the prompt sent to the generation endpoint.
pub fn build_prompt(context: &str, question: &str) -> String {
    if context.trim().is_empty() {
        return format!("Question: {}\nAnswer:", question);
    }
    format!(
        "Use the following code context to answer the question.\n\n{}\nQuestion: {}\nAnswer:",
        context, question
    )
}

/// One non-streaming generation request.
pub async fn generate(config: &GenerationConfig, prompt: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": config.model,
        "prompt": prompt,
        "stream": false,
    });

    let response = client
        .post(format!("{}/api/generate", config.url))
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to reach generation endpoint at {}", config.url))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        bail!("Generation API error {}: {}", status, text);
    }

    let json: serde_json::Value = response.json().await?;
    parse_generate_response(&json)
}

fn parse_generate_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid generation response: missing response field"))
}

/// Run the `ask` command.
pub async fn run_ask(
    config: &Config,
    question: &str,
    n: Option<usize>,
    budget: Option<i64>,
) -> Result<()> {
    let n = n.unwrap_or(config.retrieval.n);
    let budget = budget.unwrap_or(config.retrieval.budget_tokens);

    let context = build_context(config, question, n, budget, &CharRatioEstimator::default()).await?;
    eprintln!(
        "used {} of {} candidates ({} / {} tokens)",
        context.accepted, context.considered, context.tokens_used, context.budget
    );

    let prompt = build_prompt(&context.body, question);
    debug!(chars = prompt.len(), "prompt built");
    info!(model = %config.generation.model, "generating");

    let answer = generate(&config.generation, &prompt).await?;
    println!("{}", answer.trim());
    Ok(())
}
