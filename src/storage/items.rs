use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{
    Item, ItemFilter, ItemFlag, ItemSummary, NormalizedItem, NotedItem, Stats, StoreError,
};

/// Maximum number of items to return from any single listing query (OOM protection)
const MAX_ITEMS: i64 = 2000;

impl Database {
    // ========================================================================
    // Ingestion Merge
    // ========================================================================

    /// Merge one normalized item into the store, keyed by its link.
    ///
    /// - If no row with that URL exists, the item is created with default
    ///   annotation flags (unread, not favorite, not to-study, not
    ///   watch-later, no notes).
    /// - If a row exists, only `view_count` and `like_count` are refreshed,
    ///   and only when the incoming value is present — `COALESCE(excluded.x,
    ///   items.x)` leaves the stored value untouched when the new fetch has
    ///   nothing. Titles, descriptions, thumbnails, and every annotation
    ///   column stay as they are.
    ///
    /// The whole merge is a single `INSERT ... ON CONFLICT DO UPDATE`
    /// statement, so it is atomic per key even under concurrent callers.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] for a unique-key race (callers treat this as
    /// a benign skip); any other [`StoreError`] is a real storage failure.
    pub async fn upsert_item(
        &self,
        source_id: i64,
        item: &NormalizedItem,
    ) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO items (source_id, title, url, description, thumbnail, published,
                               view_count, like_count, word_count, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                view_count = COALESCE(excluded.view_count, items.view_count),
                like_count = COALESCE(excluded.like_count, items.like_count)
        "#,
        )
        .bind(source_id)
        .bind(&item.title)
        .bind(&item.link)
        .bind(&item.description)
        .bind(&item.thumbnail)
        .bind(item.published.timestamp())
        .bind(item.view_count.map(|v| v as i64))
        .bind(item.like_count.map(|v| v as i64))
        .bind(item.word_count.map(|v| v as i64))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(())
    }

    // ========================================================================
    // Item Queries
    // ========================================================================

    /// Get a single item by its id.
    pub async fn get_item(&self, item_id: i64) -> Result<Option<Item>, StoreError> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, source_id, title, url, description, thumbnail, published,
                   view_count, like_count, word_count,
                   read, favorite, to_study, watch_later, notes, fetched_at
            FROM items
            WHERE id = ?
        "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(item)
    }

    /// List items matching the filter, most recent first.
    ///
    /// The filter's limit is hard-capped at 2000 to prevent unbounded
    /// memory allocation on large stores.
    pub async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<ItemSummary>, StoreError> {
        let limit = filter.limit.clamp(1, MAX_ITEMS);

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT i.id, i.title, i.url, i.published, i.read, i.favorite, \
             i.to_study, i.watch_later, i.view_count, i.word_count, \
             s.name AS source_name \
             FROM items i JOIN sources s ON s.id = i.source_id WHERE 1 = 1",
        );

        if let Some(kind) = filter.kind {
            builder.push(" AND s.kind = ");
            builder.push_bind(kind);
        }
        if filter.unread_only {
            builder.push(" AND i.read = 0");
        }
        if filter.favorites_only {
            builder.push(" AND i.favorite = 1");
        }
        if filter.to_study_only {
            builder.push(" AND i.to_study = 1");
        }
        if filter.watch_later_only {
            builder.push(" AND i.watch_later = 1");
        }
        if let Some(since) = filter.since {
            builder.push(" AND i.published >= ");
            builder.push_bind(since);
        }
        if let Some(search) = &filter.search {
            // Escape LIKE metacharacters so a search for "100%" matches literally
            let escaped = search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            builder.push(" AND i.title LIKE ");
            builder.push_bind(format!("%{escaped}%"));
            builder.push(" ESCAPE '\\'");
        }

        builder.push(" ORDER BY i.published DESC, i.fetched_at DESC LIMIT ");
        builder.push_bind(limit);

        let items = builder
            .build_query_as::<ItemSummary>()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(items)
    }

    /// Total number of stored items.
    pub async fn count_items(&self) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(row.0)
    }

    /// Aggregate counters over the item table, one pass.
    pub async fn stats(&self) -> Result<Stats, StoreError> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(CASE WHEN read = 0 THEN 1 END),
                COUNT(CASE WHEN favorite = 1 THEN 1 END),
                COUNT(CASE WHEN to_study = 1 THEN 1 END),
                COUNT(CASE WHEN watch_later = 1 THEN 1 END)
            FROM items
        "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(Stats {
            total: row.0,
            unread: row.1,
            favorites: row.2,
            to_study: row.3,
            watch_later: row.4,
        })
    }

    /// All items carrying a non-empty note, most recent first.
    pub async fn items_with_notes(&self) -> Result<Vec<NotedItem>, StoreError> {
        let items = sqlx::query_as::<_, NotedItem>(
            r#"
            SELECT i.title, i.url, i.published, i.to_study, i.notes, s.name AS source_name
            FROM items i JOIN sources s ON s.id = i.source_id
            WHERE i.notes IS NOT NULL AND TRIM(i.notes) != ''
            ORDER BY i.published DESC
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(items)
    }

    // ========================================================================
    // Annotation Mutations
    // ========================================================================

    /// Set the read flag (idempotent), returns whether the row was changed.
    ///
    /// The `AND read != ?` guard makes repeated calls no-ops rather than
    /// spurious writes.
    pub async fn set_item_read(&self, item_id: i64, read: bool) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE items SET read = ? WHERE id = ? AND read != ?")
            .bind(read)
            .bind(item_id)
            .bind(read)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically toggle an annotation flag, returning the new value.
    ///
    /// Uses SQLite's RETURNING clause so the toggle and the readback are a
    /// single atomic operation. `None` means no item with that id exists.
    pub async fn toggle_item_flag(
        &self,
        item_id: i64,
        flag: ItemFlag,
    ) -> Result<Option<bool>, StoreError> {
        let sql = match flag {
            ItemFlag::Favorite => {
                "UPDATE items SET favorite = NOT favorite WHERE id = ? RETURNING favorite"
            }
            ItemFlag::ToStudy => {
                "UPDATE items SET to_study = NOT to_study WHERE id = ? RETURNING to_study"
            }
            ItemFlag::WatchLater => {
                "UPDATE items SET watch_later = NOT watch_later WHERE id = ? RETURNING watch_later"
            }
        };

        let row: Option<(bool,)> = sqlx::query_as(sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(row.map(|r| r.0))
    }

    /// Set or clear the notes text, returns whether a row was changed.
    pub async fn set_item_notes(
        &self,
        item_id: i64,
        notes: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE items SET notes = ? WHERE id = ?")
            .bind(notes)
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SourceKind;
    use chrono::{TimeZone, Utc};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn test_item(link: &str, title: &str) -> NormalizedItem {
        NormalizedItem {
            title: title.to_string(),
            link: link.to_string(),
            published: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            description: Some("Test description".to_string()),
            thumbnail: None,
            view_count: None,
            like_count: None,
            word_count: Some(2),
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_with_default_annotations() {
        let db = test_db().await;
        let source_id = db
            .add_source("Feed", "https://example.com/feed", SourceKind::Article)
            .await
            .unwrap();

        db.upsert_item(source_id, &test_item("https://example.com/1", "First"))
            .await
            .unwrap();

        let items = db.list_items(&ItemFilter::default()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "First");
        assert!(!items[0].read);
        assert!(!items[0].favorite);
        assert!(!items[0].to_study);
        assert!(!items[0].watch_later);
    }

    #[tokio::test]
    async fn test_upsert_existing_updates_only_present_counts() {
        let db = test_db().await;
        let source_id = db
            .add_source("Channel", "https://example.com/videos", SourceKind::Video)
            .await
            .unwrap();

        let mut item = test_item("https://example.com/v/1", "Video");
        item.view_count = Some(100);
        item.like_count = Some(10);
        db.upsert_item(source_id, &item).await.unwrap();

        // Second sighting: new view count, no like count, changed title
        let mut resight = test_item("https://example.com/v/1", "Renamed Video");
        resight.view_count = Some(250);
        resight.like_count = None;
        db.upsert_item(source_id, &resight).await.unwrap();

        let stored = db.get_item(1).await.unwrap().unwrap();
        assert_eq!(stored.title, "Video", "title is not refreshed on re-sighting");
        assert_eq!(stored.view_count, Some(250));
        assert_eq!(stored.like_count, Some(10), "absent new value keeps stored value");
        assert_eq!(db.count_items().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_preserves_annotations() {
        let db = test_db().await;
        let source_id = db
            .add_source("Feed", "https://example.com/feed", SourceKind::Article)
            .await
            .unwrap();

        db.upsert_item(source_id, &test_item("https://example.com/1", "Post"))
            .await
            .unwrap();
        db.toggle_item_flag(1, ItemFlag::Favorite).await.unwrap();
        db.set_item_read(1, true).await.unwrap();
        db.set_item_notes(1, Some("keep this")).await.unwrap();

        db.upsert_item(source_id, &test_item("https://example.com/1", "Post"))
            .await
            .unwrap();

        let stored = db.get_item(1).await.unwrap().unwrap();
        assert!(stored.favorite);
        assert!(stored.read);
        assert_eq!(stored.notes.as_deref(), Some("keep this"));
    }

    #[tokio::test]
    async fn test_set_item_read_is_idempotent() {
        let db = test_db().await;
        let source_id = db
            .add_source("Feed", "https://example.com/feed", SourceKind::Article)
            .await
            .unwrap();
        db.upsert_item(source_id, &test_item("https://example.com/1", "Post"))
            .await
            .unwrap();

        assert!(db.set_item_read(1, true).await.unwrap());
        assert!(!db.set_item_read(1, true).await.unwrap(), "second call is a no-op");
        assert!(db.set_item_read(1, false).await.unwrap());
    }

    #[tokio::test]
    async fn test_toggle_flag_returns_new_value() {
        let db = test_db().await;
        let source_id = db
            .add_source("Feed", "https://example.com/feed", SourceKind::Article)
            .await
            .unwrap();
        db.upsert_item(source_id, &test_item("https://example.com/1", "Post"))
            .await
            .unwrap();

        assert_eq!(db.toggle_item_flag(1, ItemFlag::ToStudy).await.unwrap(), Some(true));
        assert_eq!(db.toggle_item_flag(1, ItemFlag::ToStudy).await.unwrap(), Some(false));
        assert_eq!(db.toggle_item_flag(99, ItemFlag::ToStudy).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stats_counts_each_flag() {
        let db = test_db().await;
        let source_id = db
            .add_source("Feed", "https://example.com/feed", SourceKind::Article)
            .await
            .unwrap();

        for i in 0..3 {
            db.upsert_item(source_id, &test_item(&format!("https://example.com/{i}"), "Post"))
                .await
                .unwrap();
        }
        db.set_item_read(1, true).await.unwrap();
        db.toggle_item_flag(2, ItemFlag::Favorite).await.unwrap();
        db.toggle_item_flag(3, ItemFlag::WatchLater).await.unwrap();

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.unread, 2);
        assert_eq!(stats.favorites, 1);
        assert_eq!(stats.to_study, 0);
        assert_eq!(stats.watch_later, 1);
    }

    #[tokio::test]
    async fn test_list_items_filters_by_kind_and_search() {
        let db = test_db().await;
        let articles = db
            .add_source("Blog", "https://example.com/feed", SourceKind::Article)
            .await
            .unwrap();
        let videos = db
            .add_source("Channel", "https://example.com/videos", SourceKind::Video)
            .await
            .unwrap();

        db.upsert_item(articles, &test_item("https://example.com/1", "Rust tips"))
            .await
            .unwrap();
        db.upsert_item(videos, &test_item("https://example.com/v/1", "Rust talk"))
            .await
            .unwrap();
        db.upsert_item(videos, &test_item("https://example.com/v/2", "Other talk"))
            .await
            .unwrap();

        let filter = ItemFilter {
            kind: Some(SourceKind::Video),
            ..Default::default()
        };
        assert_eq!(db.list_items(&filter).await.unwrap().len(), 2);

        let filter = ItemFilter {
            search: Some("rust".to_string()),
            ..Default::default()
        };
        // SQLite LIKE is case-insensitive for ASCII
        assert_eq!(db.list_items(&filter).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_items_with_notes_skips_blank_notes() {
        let db = test_db().await;
        let source_id = db
            .add_source("Feed", "https://example.com/feed", SourceKind::Article)
            .await
            .unwrap();
        db.upsert_item(source_id, &test_item("https://example.com/1", "Noted"))
            .await
            .unwrap();
        db.upsert_item(source_id, &test_item("https://example.com/2", "Blank"))
            .await
            .unwrap();
        db.upsert_item(source_id, &test_item("https://example.com/3", "Bare"))
            .await
            .unwrap();

        db.set_item_notes(1, Some("useful")).await.unwrap();
        db.set_item_notes(2, Some("   ")).await.unwrap();

        let noted = db.items_with_notes().await.unwrap();
        assert_eq!(noted.len(), 1);
        assert_eq!(noted[0].title, "Noted");
        assert_eq!(noted[0].notes, "useful");
    }

    #[tokio::test]
    async fn test_delete_source_cascades_to_items() {
        let db = test_db().await;
        let source_id = db
            .add_source("Feed", "https://example.com/feed", SourceKind::Article)
            .await
            .unwrap();
        db.upsert_item(source_id, &test_item("https://example.com/1", "Post"))
            .await
            .unwrap();

        assert!(db.delete_source(source_id).await.unwrap());
        assert_eq!(db.count_items().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_source_duplicate_url_is_conflict() {
        let db = test_db().await;
        db.add_source("Feed", "https://example.com/feed", SourceKind::Article)
            .await
            .unwrap();

        let err = db
            .add_source("Again", "https://example.com/feed", SourceKind::Article)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }
}
