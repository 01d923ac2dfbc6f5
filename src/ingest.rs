//! Indexing pipeline orchestration.
//!
//! Coordinates the full `ctxscan index` flow: filesystem scan → chunking →
//! batched embedding → SQLite upsert. Re-indexing the same tree replaces
//! chunk rows in place, so repeated runs are idempotent.

use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

use context_scanner_core::index::{index_documents, IndexObserver};
use context_scanner_core::models::IndexStats;
use context_scanner_core::ScanError;

use crate::config::Config;
use crate::connector_fs::{scan_documents, IgnoreSet};
use crate::embedding::create_provider;
use crate::sqlite_store::SqliteIndex;

/// Index every readable file under `dir`.
///
/// Returns `Ok(None)` when nothing indexable was found; that case is
/// reported to the user but is not a failure.
pub async fn index_directory(
    config: &Config,
    dir: &Path,
    observer: &dyn IndexObserver,
) -> Result<Option<IndexStats>> {
    let options = config.index_options()?;
    let provider = create_provider(&config.embedding)?;
    let ignore = IgnoreSet::new(&config.scan.all_ignore_patterns())?;

    let outcome = scan_documents(
        dir,
        &ignore,
        config.scan.follow_symlinks,
        config.scan.read_concurrency,
    )
    .await?;
    info!(
        root = %dir.display(),
        files = outcome.documents.len(),
        skipped = outcome.skipped,
        "scanned"
    );

    let index = SqliteIndex::create_if_absent(&config.index.path, config.index.distance()?).await?;

    let result = index_documents(
        &outcome.documents,
        provider.as_ref(),
        &index,
        &options,
        observer,
    )
    .await;

    let stats = match result {
        Ok(mut stats) => {
            stats.skipped_files = outcome.skipped;
            index
                .record_build(provider.model_name(), provider.dims())
                .await?;
            Some(stats)
        }
        Err(ScanError::NoContent(files)) => {
            warn!(files, skipped = outcome.skipped, "no indexable content");
            None
        }
        Err(e) => {
            index.close().await;
            return Err(e.into());
        }
    };

    index.close().await;
    Ok(stats)
}

/// Run the `index` command and print a summary.
pub async fn run_index(config: &Config, dir: &Path, observer: &dyn IndexObserver) -> Result<()> {
    match index_directory(config, dir, observer).await? {
        Some(stats) => {
            println!("index {}", dir.display());
            println!("  files indexed: {}", stats.file_count);
            println!("  files skipped: {}", stats.skipped_files);
            println!("  chunks written: {}", stats.chunk_count);
            println!("  batches: {}", stats.batch_count);
            println!("  index: {}", config.index.path.display());
            println!("ok");
        }
        None => println!("No valid files found to index."),
    }
    Ok(())
}
