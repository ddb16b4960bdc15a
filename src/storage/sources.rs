use super::schema::Database;
use super::types::{Source, SourceKind, SourceWithUnread, StoreError};

impl Database {
    // ========================================================================
    // Source Operations
    // ========================================================================

    /// Insert a new source, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if a source with the same URL
    /// already exists.
    pub async fn add_source(
        &self,
        name: &str,
        url: &str,
        kind: SourceKind,
    ) -> Result<i64, StoreError> {
        let row: (i64,) =
            sqlx::query_as("INSERT INTO sources (name, url, kind) VALUES (?, ?, ?) RETURNING id")
                .bind(name)
                .bind(url)
                .bind(kind)
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
        Ok(row.0)
    }

    /// Get a single source by id.
    pub async fn get_source(&self, source_id: i64) -> Result<Option<Source>, StoreError> {
        let source = sqlx::query_as::<_, Source>(
            "SELECT id, name, url, kind, enabled FROM sources WHERE id = ?",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(source)
    }

    /// All sources with `enabled = true`, in name order.
    ///
    /// This is the work list for a full ingestion run. An empty result is
    /// not an error — a run over zero sources simply does nothing.
    pub async fn enabled_sources(&self) -> Result<Vec<Source>, StoreError> {
        let sources = sqlx::query_as::<_, Source>(
            "SELECT id, name, url, kind, enabled FROM sources WHERE enabled = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(sources)
    }

    /// All sources with their unread item counts, for the CLI listing.
    pub async fn sources_with_unread(&self) -> Result<Vec<SourceWithUnread>, StoreError> {
        let sources = sqlx::query_as::<_, SourceWithUnread>(
            r#"
                SELECT
                    s.id, s.name, s.url, s.kind, s.enabled,
                    COUNT(CASE WHEN i.read = 0 THEN 1 END) AS unread_count
                FROM sources s
                LEFT JOIN items i ON s.id = i.source_id
                GROUP BY s.id
                ORDER BY s.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(sources)
    }

    /// Enable or disable a source, returns whether a row was changed.
    pub async fn set_source_enabled(
        &self,
        source_id: i64,
        enabled: bool,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE sources SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a source and (via FK cascade) all of its items.
    pub async fn delete_source(&self, source_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }
}
