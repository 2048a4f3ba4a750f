//! The embed-and-upsert step applied to each changed file.
//!
//! Defines the [`Indexer`] trait and the built-in implementations:
//! - **[`DisabledIndexer`]** — fails every file; nothing is marked as seen.
//! - **[`NoopIndexer`]** — accepts every file without sending it anywhere, so
//!   the cache is brought up to date with the content folder.
//!
//! A file is recorded in the change cache only when [`Indexer::index`]
//! returns `Ok`. A failed file stays stale and is tried again on the next run;
//! there is no retry within a run.
//!
//! # Provider Selection
//!
//! ```rust
//! # use vectrekker::config::IndexerConfig;
//! # use vectrekker::indexer::create_indexer;
//! let config = IndexerConfig::default(); // provider = "disabled"
//! let indexer = create_indexer(&config).unwrap();
//! assert_eq!(indexer.name(), "disabled");
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::Path;

use crate::config::IndexerConfig;

#[async_trait]
pub trait Indexer: Send + Sync {
    /// Provider identifier, as written in `[indexer] provider`.
    fn name(&self) -> &str;

    /// Index one file. `key` is the canonical path the vector is stored under.
    async fn index(&self, key: &Path, contents: &str) -> Result<()>;
}

pub struct DisabledIndexer;

#[async_trait]
impl Indexer for DisabledIndexer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn index(&self, _key: &Path, _contents: &str) -> Result<()> {
        bail!("Indexer is disabled. Set [indexer] provider in config.")
    }
}

pub struct NoopIndexer;

#[async_trait]
impl Indexer for NoopIndexer {
    fn name(&self) -> &str {
        "noop"
    }

    async fn index(&self, key: &Path, contents: &str) -> Result<()> {
        tracing::debug!(key = %key.display(), bytes = contents.len(), "noop index");
        Ok(())
    }
}

/// | Config Value | Indexer |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledIndexer`] |
/// | `"noop"` | [`NoopIndexer`] |
pub fn create_indexer(config: &IndexerConfig) -> Result<Box<dyn Indexer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledIndexer)),
        "noop" => Ok(Box::new(NoopIndexer)),
        other => bail!("Unknown indexer provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_always_fails() {
        let indexer = DisabledIndexer;
        let err = indexer.index(Path::new("/a.md"), "body").await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[tokio::test]
    async fn test_noop_accepts() {
        NoopIndexer.index(Path::new("/a.md"), "body").await.unwrap();
    }

    #[test]
    fn test_create_by_name() {
        let noop = IndexerConfig {
            provider: "noop".to_string(),
        };
        assert_eq!(create_indexer(&noop).unwrap().name(), "noop");

        let unknown = IndexerConfig {
            provider: "pinecone".to_string(),
        };
        assert!(create_indexer(&unknown).is_err());
    }
}
