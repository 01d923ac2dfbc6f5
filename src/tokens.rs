//! Exact token counting with a HuggingFace `tokenizer.json`.
//!
//! Only compiled with the `exact-tokens` feature. Used to measure how
//! far the character-ratio estimate drifts from a real tokenizer.

use anyhow::{anyhow, Result};
use std::path::Path;
use tokenizers::Tokenizer;

use context_scanner_core::assemble::TokenEstimator;

pub struct TokenizerEstimator {
    tokenizer: Tokenizer,
}

impl TokenizerEstimator {
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer {}: {}", path.display(), e))?;
        Ok(Self { tokenizer })
    }
}

impl TokenEstimator for TokenizerEstimator {
    fn estimate(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(_) => text.chars().count().div_ceil(4),
        }
    }
}
