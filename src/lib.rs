//! veille — a reading-list aggregator.
//!
//! Pulls newsletter (article) feeds and YouTube-style (video) feeds into a
//! single deduplicated item store with per-item annotations (read, favorite,
//! to-study, watch-later, notes). The crate is organized around the
//! ingestion pipeline:
//!
//! - [`ingest`] — fetch feed documents, parse them into tagged raw entries,
//!   normalize entries into canonical items, and merge them idempotently
//!   into storage
//! - [`storage`] — SQLite persistence for sources and items
//! - [`config`] — optional TOML configuration
//! - [`export`] — markdown export of annotated items

pub mod config;
pub mod export;
pub mod ingest;
pub mod storage;
pub mod util;
