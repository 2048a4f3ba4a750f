//! Sync pipeline orchestration.
//!
//! Walks the content folder, asks the change cache which matching files are
//! new or changed, hands each one to the [`Indexer`], and records only the
//! files that were indexed successfully. Files that fail stay stale and are
//! picked up again on the next run.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::cache::{is_changed, ChangeCache};
use crate::config::{BaseConfig, Config};
use crate::indexer::{create_indexer, Indexer};
use crate::scan::{self, ContentFilter, ScanError};

/// A file whose current mtime is newer than the one recorded in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub path: PathBuf,
    pub modified_time: i64,
    pub last_seen: i64,
}

/// Result of comparing the content folder against the cache.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub changed: Vec<ChangedFile>,
    /// Matching files that vanished while being inspected.
    pub skipped: u64,
}

/// Counts from processing a set of changed files.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub indexed: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Collect every file under `base.content_folder` that matches
/// `base.content_regex` and has changed since it was last recorded.
///
/// Each canonical path is reported at most once, even when several links
/// lead to it.
pub async fn find_changed(cache: &ChangeCache, base: &BaseConfig) -> Result<ScanResult> {
    let filter = ContentFilter::new(&base.content_regex)
        .with_context(|| format!("Invalid content_regex: '{}'", base.content_regex))?;

    let walker = scan::walk(&base.content_folder, base.follow_symlinks).with_context(|| {
        format!(
            "Content folder is not readable: {}",
            base.content_folder.display()
        )
    })?;

    let mut result = ScanResult::default();
    let mut visited = HashSet::new();

    for entry in walker {
        let path = match entry {
            Ok(path) => path,
            Err(ScanError::NotFound(path)) => {
                tracing::debug!(path = %path.display(), "entry vanished during walk");
                if filter.matches(&path) {
                    result.skipped += 1;
                }
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if !filter.matches(&path) || !visited.insert(path.clone()) {
            continue;
        }

        let modified_time = match scan::modified_time(&path) {
            Ok(t) => t,
            Err(ScanError::NotFound(_)) => {
                tracing::debug!(path = %path.display(), "file vanished before stat");
                result.skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let last_seen = cache.get_last_seen(&path).await?;

        if is_changed(modified_time, last_seen) {
            result.changed.push(ChangedFile {
                path,
                modified_time,
                last_seen,
            });
        }
    }

    Ok(result)
}

/// Index each changed file and record the successes.
///
/// The mtime recorded is the one read during the scan, so an edit made while
/// the file is being indexed is detected on the next run. Storage errors abort
/// the run; indexing errors are counted and left for the next run.
pub async fn process_changed(
    cache: &ChangeCache,
    indexer: &dyn Indexer,
    files: &[ChangedFile],
) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    for file in files {
        let contents = match std::fs::read_to_string(&file.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %file.path.display(), "file vanished before read");
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "could not read file");
                report.failed += 1;
                continue;
            }
        };

        match indexer.index(&file.path, &contents).await {
            Ok(()) => {
                cache.record_seen(&file.path, file.modified_time).await?;
                report.indexed += 1;
            }
            Err(e) => {
                tracing::warn!(
                    path = %file.path.display(),
                    indexer = indexer.name(),
                    error = %e,
                    "indexing failed; file stays stale"
                );
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

pub async fn run_sync(config: &Config, dry_run: bool, limit: Option<usize>) -> Result<()> {
    let cache_path = config.cache_path()?;
    let cache = ChangeCache::open(&cache_path)
        .await
        .with_context(|| format!("Failed to open cache: {}", cache_path.display()))?;

    let result = sync_with_cache(config, &cache, dry_run, limit).await;
    cache.close().await;
    result
}

async fn sync_with_cache(
    config: &Config,
    cache: &ChangeCache,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<()> {
    let mut scan = find_changed(cache, &config.base).await?;
    let changed = scan.changed.len();

    println!("{} file(s) have changed", changed);

    if dry_run {
        println!("sync (dry-run)");
        for file in &scan.changed {
            println!("  {}", file.path.display());
        }
        println!("Dry run complete, exiting");
        return Ok(());
    }

    if let Some(lim) = limit {
        scan.changed.truncate(lim);
    }

    let indexer = create_indexer(&config.indexer)?;
    tracing::info!(
        indexer = indexer.name(),
        files = scan.changed.len(),
        "processing changed files"
    );

    let report = process_changed(cache, indexer.as_ref(), &scan.changed).await?;

    println!("sync");
    println!("  changed: {}", changed);
    println!("  processed: {}", scan.changed.len());
    println!("  indexed: {}", report.indexed);
    println!("  failed: {}", report.failed);
    println!("  skipped: {}", scan.skipped + report.skipped);
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    use crate::config::default_content_regex;
    use crate::indexer::{DisabledIndexer, NoopIndexer};

    /// Fails any file whose name contains `fail`.
    struct SelectiveIndexer;

    #[async_trait]
    impl Indexer for SelectiveIndexer {
        fn name(&self) -> &str {
            "selective"
        }

        async fn index(&self, key: &Path, _contents: &str) -> Result<()> {
            let name = key.file_name().unwrap_or_default().to_string_lossy();
            if name.contains("fail") {
                anyhow::bail!("upsert rejected");
            }
            Ok(())
        }
    }

    fn set_mtime(path: &Path, secs: u64) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn setup() -> (TempDir, BaseConfig) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("content");
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("alpha.md"), "# Alpha").unwrap();
        fs::write(root.join("nested/beta.md"), "# Beta").unwrap();
        fs::write(root.join("gamma.txt"), "gamma").unwrap();
        set_mtime(&root.join("alpha.md"), 1000);
        set_mtime(&root.join("nested/beta.md"), 2000);
        set_mtime(&root.join("gamma.txt"), 3000);

        let base = BaseConfig {
            content_folder: root,
            content_regex: default_content_regex(),
            follow_symlinks: false,
        };
        (tmp, base)
    }

    fn names(files: &[ChangedFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_first_scan_reports_all_matching() {
        let (_tmp, base) = setup();
        let cache = ChangeCache::open_in_memory().await.unwrap();

        let scan = find_changed(&cache, &base).await.unwrap();
        assert_eq!(names(&scan.changed), vec!["alpha.md", "beta.md"]);
        assert!(scan.changed.iter().all(|f| f.last_seen == 0));
        assert_eq!(scan.changed[0].modified_time, 1000);
        assert_eq!(scan.skipped, 0);
    }

    #[tokio::test]
    async fn test_processed_files_are_not_rescanned() {
        let (_tmp, base) = setup();
        let cache = ChangeCache::open_in_memory().await.unwrap();

        let scan = find_changed(&cache, &base).await.unwrap();
        let report = process_changed(&cache, &NoopIndexer, &scan.changed)
            .await
            .unwrap();
        assert_eq!(report.indexed, 2);

        let rescan = find_changed(&cache, &base).await.unwrap();
        assert!(rescan.changed.is_empty());
    }

    #[tokio::test]
    async fn test_newer_mtime_detected_older_ignored() {
        let (_tmp, base) = setup();
        let cache = ChangeCache::open_in_memory().await.unwrap();
        let scan = find_changed(&cache, &base).await.unwrap();
        process_changed(&cache, &NoopIndexer, &scan.changed)
            .await
            .unwrap();

        let alpha = base.content_folder.join("alpha.md");
        let beta = base.content_folder.join("nested/beta.md");
        set_mtime(&alpha, 1005);
        set_mtime(&beta, 1999);

        let rescan = find_changed(&cache, &base).await.unwrap();
        assert_eq!(names(&rescan.changed), vec!["alpha.md"]);
        assert_eq!(rescan.changed[0].last_seen, 1000);
        assert_eq!(rescan.changed[0].modified_time, 1005);
    }

    #[tokio::test]
    async fn test_failed_files_stay_stale() {
        let (_tmp, base) = setup();
        fs::write(base.content_folder.join("fail.md"), "nope").unwrap();
        let cache = ChangeCache::open_in_memory().await.unwrap();

        let scan = find_changed(&cache, &base).await.unwrap();
        let report = process_changed(&cache, &SelectiveIndexer, &scan.changed)
            .await
            .unwrap();
        assert_eq!(report.indexed, 2);
        assert_eq!(report.failed, 1);

        let rescan = find_changed(&cache, &base).await.unwrap();
        assert_eq!(names(&rescan.changed), vec!["fail.md"]);
    }

    #[tokio::test]
    async fn test_disabled_indexer_records_nothing() {
        let (_tmp, base) = setup();
        let cache = ChangeCache::open_in_memory().await.unwrap();

        let scan = find_changed(&cache, &base).await.unwrap();
        let report = process_changed(&cache, &DisabledIndexer, &scan.changed)
            .await
            .unwrap();
        assert_eq!(report.failed, 2);
        assert!(cache.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_vanished_file_is_skipped() {
        let (_tmp, base) = setup();
        let cache = ChangeCache::open_in_memory().await.unwrap();

        let scan = find_changed(&cache, &base).await.unwrap();
        fs::remove_file(&scan.changed[0].path).unwrap();

        let report = process_changed(&cache, &NoopIndexer, &scan.changed)
            .await
            .unwrap();
        assert_eq!(
            report,
            SyncReport {
                indexed: 1,
                failed: 0,
                skipped: 1
            }
        );
        assert_eq!(cache.get_last_seen(&scan.changed[0].path).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_custom_regex() {
        let (_tmp, mut base) = setup();
        base.content_regex = r".*\.txt$".to_string();
        let cache = ChangeCache::open_in_memory().await.unwrap();

        let scan = find_changed(&cache, &base).await.unwrap();
        assert_eq!(names(&scan.changed), vec!["gamma.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_linked_file_reported_once_under_target_path() {
        let (_tmp, base) = setup();
        let alpha = base.content_folder.join("alpha.md");
        std::os::unix::fs::symlink(&alpha, base.content_folder.join("link.md")).unwrap();
        std::os::unix::fs::symlink(&alpha, base.content_folder.join("nested/other.md")).unwrap();
        let cache = ChangeCache::open_in_memory().await.unwrap();

        let scan = find_changed(&cache, &base).await.unwrap();
        assert_eq!(names(&scan.changed), vec!["alpha.md", "beta.md"]);

        let report = process_changed(&cache, &NoopIndexer, &scan.changed)
            .await
            .unwrap();
        assert_eq!(report.indexed, 2);
        assert_eq!(cache.len().await.unwrap(), 2);
        assert_eq!(
            cache
                .get_last_seen(&alpha.canonicalize().unwrap())
                .await
                .unwrap(),
            1000
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_match_counted_as_skipped() {
        let (_tmp, base) = setup();
        let root = &base.content_folder;
        std::os::unix::fs::symlink(root.join("gone.md"), root.join("dangling.md")).unwrap();
        std::os::unix::fs::symlink(root.join("gone.txt"), root.join("dangling.txt")).unwrap();
        let cache = ChangeCache::open_in_memory().await.unwrap();

        let scan = find_changed(&cache, &base).await.unwrap();
        assert_eq!(names(&scan.changed), vec!["alpha.md", "beta.md"]);
        assert_eq!(scan.skipped, 1);
    }

    #[tokio::test]
    async fn test_missing_content_folder_errors() {
        let tmp = TempDir::new().unwrap();
        let base = BaseConfig {
            content_folder: tmp.path().join("missing"),
            content_regex: default_content_regex(),
            follow_symlinks: false,
        };
        let cache = ChangeCache::open_in_memory().await.unwrap();

        let err = find_changed(&cache, &base).await.unwrap_err();
        assert!(err.to_string().contains("Content folder"));
    }
}
