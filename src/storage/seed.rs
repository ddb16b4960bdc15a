//! Bulk source import from a TOML seed file.
//!
//! The seed format is a flat list of sources:
//!
//! ```toml
//! [[sources]]
//! name = "TLDR"
//! url = "https://tldr.tech/api/rss/tech"
//! kind = "article"
//!
//! [[sources]]
//! name = "Fireship"
//! url = "https://www.youtube.com/feeds/videos.xml?channel_id=UCsBjURrPoezykLs9EqgamOA"
//! kind = "video"
//! ```
//!
//! Seeding is idempotent: sources already present (by URL) are left
//! untouched, so re-running a seed never clobbers the enabled flag or name
//! edits made since the first import.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::schema::Database;
use super::types::{SourceKind, StoreError};
use crate::util::validate_url;

/// One source definition from a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSource {
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
}

/// Parsed seed file contents.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub sources: Vec<SeedSource>,
}

impl SeedFile {
    /// Load and parse a seed file, dropping entries with invalid URLs.
    ///
    /// Invalid entries are skipped with a warning rather than failing the
    /// whole import, mirroring how a partially-bad subscription list should
    /// still yield its good rows.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
        let mut file: SeedFile = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in seed file: {}", path.display()))?;

        file.sources.retain(|source| match validate_url(&source.url) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(name = %source.name, url = %source.url, error = %e, "Skipping seed source with invalid URL");
                false
            }
        });

        Ok(file)
    }
}

impl Database {
    /// Insert seed sources that are not already present, returns how many
    /// rows were created. Existing sources (matched by URL) are untouched.
    pub async fn seed_sources(&self, sources: &[SeedSource]) -> Result<usize, StoreError> {
        if sources.is_empty() {
            return Ok(0);
        }

        let mut created = 0usize;
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;

        for source in sources {
            let result = sqlx::query(
                "INSERT INTO sources (name, url, kind) VALUES (?, ?, ?)
                 ON CONFLICT(url) DO NOTHING",
            )
            .bind(&source.name)
            .bind(&source.url)
            .bind(source.kind)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;
            created += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(created)
    }
}
