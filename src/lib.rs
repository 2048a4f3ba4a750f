//! # VecTrekker
//!
//! Indexes text content on disk for use with LLMs, re-processing only the files
//! that changed since the last run.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Content dir │──▶│ Change cache │──▶│  Indexer  │
//! │ walk+regex  │   │ SQLite mtime │   │ embed+ups │
//! └─────────────┘   └──────┬───────┘   └─────┬─────┘
//!                          ▲                 │
//!                          └── record_seen ──┘
//!                              (on success)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vectrekker init               # create ~/.vectrekker/cache.db
//! vectrekker status             # list new or changed files
//! vectrekker sync --dry-run     # count changed files only
//! vectrekker sync               # index changed files
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`cache`] | Persistent path → mtime change cache |
//! | [`scan`] | Directory walk, path filter, mtime reader |
//! | [`indexer`] | Embed-and-upsert step abstraction |
//! | [`sync`] | Change detection and processing pipeline |
//! | [`status`] | Changed-file listing |

pub mod cache;
pub mod config;
pub mod indexer;
pub mod scan;
pub mod status;
pub mod sync;
