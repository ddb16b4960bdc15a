use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another instance of the application has locked the database
    #[error("Another instance of veille appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// A row with the same unique key already exists
    #[error("A record with this URL already exists")]
    Conflict,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a sqlx error into the storage taxonomy.
    ///
    /// A unique-constraint violation maps to [`StoreError::Conflict`] so
    /// callers can treat a duplicate-key race as a benign skip without also
    /// swallowing real storage failures (disk full, connection loss).
    /// SQLite lock conditions map to [`StoreError::InstanceLocked`].
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
                return StoreError::Conflict;
            }
        }

        let error_string = err.to_string().to_lowercase();

        // Check for SQLite lock-related error messages
        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return StoreError::InstanceLocked;
        }

        StoreError::Other(err)
    }
}

// ============================================================================
// Sources
// ============================================================================

/// What shape of feed a source serves, and therefore which normalization
/// branch its entries take (word counts for articles, view/like statistics
/// and synthesized thumbnails for videos).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SourceKind {
    Article,
    Video,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Article => "article",
            SourceKind::Video => "video",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article" => Ok(SourceKind::Article),
            "video" => Ok(SourceKind::Video),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

/// A configured external feed. The URL is the natural unique key.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    pub enabled: bool,
}

/// Source plus its unread item count, for the `sources` listing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceWithUnread {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    pub enabled: bool,
    pub unread_count: i64,
}

// ============================================================================
// Items
// ============================================================================

/// Canonical output of normalization, ready for the upsert-by-link merge.
///
/// `link` is never empty: entries without a resolvable link are discarded
/// before one of these is built. Numeric fields distinguish "unknown"
/// (`None`) from zero — a malformed upstream statistic is absent, not `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    pub title: String,
    pub link: String,
    pub published: DateTime<Utc>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub word_count: Option<u64>,
}

/// Full item row, including user annotations.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub published: i64,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub word_count: Option<i64>,
    pub read: bool,
    pub favorite: bool,
    pub to_study: bool,
    pub watch_later: bool,
    pub notes: Option<String>,
    pub fetched_at: i64,
}

/// Compact row for item listings (joined with the source name).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemSummary {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub published: i64,
    pub read: bool,
    pub favorite: bool,
    pub to_study: bool,
    pub watch_later: bool,
    pub view_count: Option<i64>,
    pub word_count: Option<i64>,
    pub source_name: String,
}

/// Item carrying a non-empty note, for the knowledge-base export.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotedItem {
    pub title: String,
    pub url: String,
    pub published: i64,
    pub to_study: bool,
    pub notes: String,
    pub source_name: String,
}

/// User-toggleable item flags (read has its own explicit setter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFlag {
    Favorite,
    ToStudy,
    WatchLater,
}

/// Filters for the item listing query. `Default` selects everything up to
/// `limit` (callers set a 7-day window themselves when browsing).
#[derive(Debug, Clone)]
pub struct ItemFilter {
    pub kind: Option<SourceKind>,
    pub unread_only: bool,
    pub favorites_only: bool,
    pub to_study_only: bool,
    pub watch_later_only: bool,
    pub search: Option<String>,
    /// Only items published at or after this unix timestamp.
    pub since: Option<i64>,
    pub limit: i64,
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self {
            kind: None,
            unread_only: false,
            favorites_only: false,
            to_study_only: false,
            watch_later_only: false,
            search: None,
            since: None,
            limit: 50,
        }
    }
}

/// Aggregate counters over the item table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: i64,
    pub unread: i64,
    pub favorites: i64,
    pub to_study: i64,
    pub watch_later: i64,
}
