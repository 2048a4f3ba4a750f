//! `vectrekker status`: list files that would be processed by the next sync.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cache::ChangeCache;
use crate::config::Config;
use crate::sync::{find_changed, ChangedFile};

/// One line of `status --json` output.
#[derive(Debug, Serialize)]
pub struct StatusLine {
    pub path: String,
    pub modified_time: i64,
    pub last_seen: i64,
    pub modified_at: String,
    pub last_seen_at: Option<String>,
}

impl From<&ChangedFile> for StatusLine {
    fn from(file: &ChangedFile) -> Self {
        Self {
            path: file.path.display().to_string(),
            modified_time: file.modified_time,
            last_seen: file.last_seen,
            modified_at: format_ts_iso(file.modified_time),
            last_seen_at: (file.last_seen > 0).then(|| format_ts_iso(file.last_seen)),
        }
    }
}

pub async fn run_status(config: &Config, json: bool) -> Result<()> {
    let cache_path = config.cache_path()?;
    let cache = ChangeCache::open(&cache_path)
        .await
        .with_context(|| format!("Failed to open cache: {}", cache_path.display()))?;

    let scan = find_changed(&cache, &config.base).await;
    let tracked = cache.len().await;
    cache.close().await;
    let scan = scan?;
    let tracked = tracked?;

    let lines: Vec<StatusLine> = scan.changed.iter().map(StatusLine::from).collect();

    if json {
        for line in &lines {
            println!("{}", serde_json::to_string(line)?);
        }
        return Ok(());
    }

    println!("status");
    println!("  cache: {}", cache_path.display());
    println!("  tracked files: {}", tracked);
    println!("  changed: {}", lines.len());
    for line in &lines {
        let last = line.last_seen_at.as_deref().unwrap_or("never");
        println!(
            "  {}  modified {}  last seen {}",
            line.path, line.modified_at, last
        );
    }

    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
