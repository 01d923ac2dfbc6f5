//! TOML configuration.
//!
//! Every section is optional; missing keys fall back to built-in defaults
//! (500-char chunks with 50 chars of overlap, batches of 100, three
//! results, the built-in ignore list).
//!
//! ```toml
//! [index]
//! path = "./.context_db/index.sqlite"
//! metric = "cosine"
//!
//! [chunking]
//! size = 500
//! overlap = 50
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [scan]
//! extra_ignore_patterns = ["*.min.js"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use context_scanner_core::chunk::{ChunkingParams, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use context_scanner_core::embedding::Distance;
use context_scanner_core::index::IndexOptions;
use context_scanner_core::store::DEFAULT_BATCH_SIZE;

/// File name looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "ctxscan.toml";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub scan: ScanConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    pub path: PathBuf,
    pub metric: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./.context_db/index.sqlite"),
            metric: "cosine".to_string(),
        }
    }
}

impl IndexConfig {
    pub fn distance(&self) -> Result<Distance> {
        Ok(self.metric.parse::<Distance>()?)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Characters per chunk.
    pub size: usize,
    /// Characters shared by consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `hash`, `ollama`, `openai`, or `disabled`.
    pub provider: String,
    pub model: Option<String>,
    pub dims: Option<usize>,
    pub batch_size: usize,
    /// Embedding batches in flight during indexing.
    pub concurrency: usize,
    pub url: Option<String>,
    /// Transport-level retries for 429/5xx responses. Each retry is logged.
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            model: None,
            dims: None,
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: 1,
            url: None,
            max_retries: 0,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest chunks to retrieve.
    pub n: usize,
    /// Token ceiling for `context` and `ask`.
    pub budget_tokens: i64,
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            n: 3,
            budget_tokens: 2000,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScanConfig {
    /// Base-name globs; replaces the built-in list when set.
    pub ignore_patterns: Vec<String>,
    /// Base-name globs added on top of `ignore_patterns`.
    pub extra_ignore_patterns: Vec<String>,
    pub read_concurrency: usize,
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: default_ignore_patterns(),
            extra_ignore_patterns: Vec::new(),
            read_concurrency: 8,
            follow_symlinks: false,
        }
    }
}

impl ScanConfig {
    pub fn all_ignore_patterns(&self) -> Vec<String> {
        self.ignore_patterns
            .iter()
            .chain(self.extra_ignore_patterns.iter())
            .cloned()
            .collect()
    }
}

pub fn default_ignore_patterns() -> Vec<String> {
    [
        ".git*",
        "__pycache__",
        "node_modules",
        ".DS_Store",
        "*.pyc",
        "package-lock.json",
        "yarn.lock",
        "*.lock",
        ".context_db",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Config {
    pub fn chunking_params(&self) -> Result<ChunkingParams> {
        Ok(ChunkingParams::new(
            self.chunking.size,
            self.chunking.overlap,
        )?)
    }

    pub fn index_options(&self) -> Result<IndexOptions> {
        let options = IndexOptions {
            chunking: self.chunking_params()?,
            batch_size: self.embedding.batch_size,
            concurrency: self.embedding.concurrency,
        };
        options.validate()?;
        Ok(options)
    }

    /// Check cross-field constraints. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        self.index_options()?;
        self.index.distance()?;

        if self.scan.read_concurrency == 0 {
            bail!("scan.read_concurrency must be > 0");
        }

        match self.embedding.provider.as_str() {
            "hash" | "disabled" => {}
            "ollama" | "openai" => {
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hash, ollama, openai, or disabled.",
                other
            ),
        }

        Ok(())
    }
}

/// Parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Resolve the CLI's `--config` flag.
///
/// An explicit path must exist. Without one, `ctxscan.toml` in the
/// working directory is used if present, else the built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                load_config(default_path)
            } else {
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }
}
