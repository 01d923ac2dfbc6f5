//! # Context Scanner CLI (`ctxscan`)
//!
//! Indexes a source tree into a local vector index and assembles
//! token-budgeted context for language-model prompts.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxscan init` | Create the index database |
//! | `ctxscan index [DIR]` | Chunk, embed, and store every readable file |
//! | `ctxscan search "<query>"` | Print the nearest chunks |
//! | `ctxscan context "<query>"` | Print budgeted context for a prompt |
//! | `ctxscan ask "<query>"` | Send budgeted context to a generation model |
//! | `ctxscan stats` | Summarize the index |
//! | `ctxscan clear` | Remove every indexed entry |
//!
//! ## Examples
//!
//! ```bash
//! ctxscan index ./src
//! ctxscan search "rate limiter" --n 5
//! ctxscan context "how are payments retried?" --budget 1500 | pbcopy
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use context_scanner::config;
use context_scanner::context;
use context_scanner::generate;
use context_scanner::ingest;
use context_scanner::progress::ProgressMode;
use context_scanner::search;
use context_scanner::sqlite_store::SqliteIndex;
use context_scanner::stats;
use context_scanner_core::store::VectorIndex;
use context_scanner_core::ScanError;

/// Context Scanner: index a code tree and assemble token-budgeted context
/// for language-model prompts.
#[derive(Parser)]
#[command(name = "ctxscan", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./ctxscan.toml` when present, otherwise built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index database and schema.
    ///
    /// Idempotent: running it on an existing index changes nothing.
    Init,

    /// Build or refresh the index from a directory tree.
    ///
    /// Re-indexing replaces chunks in place, so repeated runs are safe.
    Index {
        /// Root directory to scan.
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Progress output on stderr: `off`, `human`, or `json`.
        /// Defaults to `human` on a terminal, `off` otherwise.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Print the chunks nearest to a query.
    Search {
        query: String,

        /// Number of results (defaults to `retrieval.n`).
        #[arg(long)]
        n: Option<usize>,

        /// Emit results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print retrieved chunks packed into a token budget.
    Context {
        query: String,

        /// Number of candidates to retrieve (defaults to `retrieval.n`).
        #[arg(long)]
        n: Option<usize>,

        /// Token budget (defaults to `retrieval.budget_tokens`).
        #[arg(long, allow_hyphen_values = true)]
        budget: Option<i64>,

        /// Count tokens with this `tokenizer.json` (requires the `exact-tokens` feature).
        #[arg(long)]
        tokenizer: Option<PathBuf>,
    },

    /// Answer a question with a generation model over budgeted context.
    Ask {
        query: String,

        #[arg(long)]
        n: Option<usize>,

        #[arg(long, allow_hyphen_values = true)]
        budget: Option<i64>,
    },

    /// Show index statistics.
    Stats,

    /// Remove every entry from the index.
    Clear,

    /// Print shell completions.
    Completions {
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Exit status for conditions the user fixes by running another command
/// (for example `ctxscan index` before `ctxscan search`).
const EXIT_RECOVERABLE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<ScanError>() {
            Some(scan) if scan.is_recoverable() => {
                eprintln!("{}", scan);
                ExitCode::from(EXIT_RECOVERABLE)
            }
            _ => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "ctxscan", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            let index = SqliteIndex::create_if_absent(&cfg.index.path, cfg.index.distance()?).await?;
            index.close().await;
            println!("Index initialized at {}.", cfg.index.path.display());
        }
        Commands::Index { dir, progress } => {
            let mode = ProgressMode::from_flag(progress.as_deref())?;
            let observer = mode.observer();
            ingest::run_index(&cfg, &dir, observer.as_ref()).await?;
        }
        Commands::Search { query, n, json } => {
            search::run_search(&cfg, &query, n, json).await?;
        }
        Commands::Context {
            query,
            n,
            budget,
            tokenizer,
        } => {
            context::run_context(&cfg, &query, n, budget, tokenizer.as_deref()).await?;
        }
        Commands::Ask { query, n, budget } => {
            generate::run_ask(&cfg, &query, n, budget).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Clear => {
            let index = SqliteIndex::open_existing(&cfg.index.path, cfg.index.distance()?).await?;
            let removed = index.len().await?;
            index.clear().await?;
            index.close().await;
            println!("Removed {} entries from {}.", removed, cfg.index.path.display());
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
