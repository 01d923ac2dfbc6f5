//! Index statistics and health overview.
//!
//! Provides a quick summary of what's indexed: entry and source counts,
//! which embedder built the index, and when. Used by `ctxscan stats` to
//! give confidence that indexing ran as expected.

use anyhow::Result;

use context_scanner_core::store::VectorIndex;

use crate::config::Config;
use crate::sqlite_store::SqliteIndex;

/// Run the stats command: open the index and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let index = SqliteIndex::open_existing(&config.index.path, config.index.distance()?).await?;

    let entries = index.len().await?;
    let sources = index.source_count().await?;
    let model = index.get_meta("model").await?;
    let dims = index.get_meta("dims").await?;
    let indexed_at = index.get_meta("indexed_at").await?;

    let db_size = std::fs::metadata(&config.index.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("ctxscan index stats");
    println!("===================");
    println!();
    println!("  Index:       {}", config.index.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Entries:     {}", entries);
    println!("  Sources:     {}", sources);
    println!("  Model:       {}", model.as_deref().unwrap_or("unknown"));
    println!("  Dimensions:  {}", dims.as_deref().unwrap_or("unknown"));
    println!("  Metric:      {}", index.metric().as_str());
    println!(
        "  Indexed:     {}",
        indexed_at
            .as_deref()
            .map(format_indexed_at)
            .unwrap_or_else(|| "never".to_string())
    );
    println!();

    index.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Render an RFC 3339 timestamp relative to now (e.g. "3 hours ago").
fn format_indexed_at(raw: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => format_ts_relative(dt.timestamp()),
        Err(_) => raw.to_string(),
    }
}

fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn recent_timestamp_is_just_now() {
        let now = chrono::Utc::now().to_rfc3339();
        assert_eq!(format_indexed_at(&now), "just now");
        assert_eq!(format_indexed_at("not a date"), "not a date");
    }
}
