use chrono::{DateTime, Utc};
use scout_core::error::AppError;
use scout_core::models::{ItemPage, ItemQuery, NewScrapedItem, ScrapedItem};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

const ITEM_COLUMNS: &str = "id, url, title, content, source, fetched_at, content_hash, updated_at";

/// Scraped item persistence in PostgreSQL.
#[derive(Clone)]
pub struct ItemRepository {
    pool: Pool<Postgres>,
}

impl ItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert by URL, or overwrite title/content/source/fetched_at/hash in place.
    /// The row id is preserved across updates.
    pub async fn upsert(&self, item: &NewScrapedItem) -> Result<ScrapedItem, AppError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO scraped_items (url, title, content, source, fetched_at, content_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (url) DO UPDATE SET
                title = EXCLUDED.title,
                content = EXCLUDED.content,
                source = EXCLUDED.source,
                fetched_at = EXCLUDED.fetched_at,
                content_hash = EXCLUDED.content_hash,
                updated_at = NOW()
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(&item.url)
        .bind(&item.title)
        .bind(&item.content)
        .bind(&item.source)
        .bind(item.fetched_at)
        .bind(&item.content_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.into())
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Option<ScrapedItem>, AppError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM scraped_items WHERE url = $1"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    /// Filtered page of items, newest `fetched_at` first, plus the total
    /// number of matches.
    ///
    /// `source` is an exact match; `search` is a case-sensitive substring
    /// match on title or content. A `NULL` bind disables a filter.
    pub async fn query(&self, query: &ItemQuery) -> Result<ItemPage, AppError> {
        const FILTER: &str = r#"
            WHERE ($1::VARCHAR IS NULL OR source = $1)
              AND ($2::VARCHAR IS NULL
                   OR strpos(title, $2) > 0
                   OR strpos(COALESCE(content, ''), $2) > 0)
        "#;

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM scraped_items
            {FILTER}
            ORDER BY fetched_at DESC, id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(query.source.as_deref())
        .bind(query.search.as_deref())
        .bind(i64::from(query.limit))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM scraped_items {FILTER}"))
                .bind(query.source.as_deref())
                .bind(query.search.as_deref())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(ItemPage {
            items: rows.into_iter().map(Into::into).collect(),
            total: total.max(0) as u64,
        })
    }

    /// The `limit` most recently fetched items, newest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<ScrapedItem>, AppError> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM scraped_items
            ORDER BY fetched_at DESC, id
            LIMIT $1
            "#
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    url: String,
    title: String,
    content: Option<String>,
    source: String,
    fetched_at: DateTime<Utc>,
    content_hash: String,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for ScrapedItem {
    fn from(row: ItemRow) -> Self {
        ScrapedItem {
            id: row.id,
            url: row.url,
            title: row.title,
            content: row.content,
            source: row.source,
            fetched_at: row.fetched_at,
            content_hash: row.content_hash,
            updated_at: row.updated_at,
        }
    }
}

// -- Trait implementation --

impl scout_core::traits::ItemStore for ItemRepository {
    async fn upsert(&self, item: &NewScrapedItem) -> Result<ScrapedItem, AppError> {
        ItemRepository::upsert(self, item).await
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<ScrapedItem>, AppError> {
        ItemRepository::get_by_url(self, url).await
    }

    async fn query(&self, query: &ItemQuery) -> Result<ItemPage, AppError> {
        ItemRepository::query(self, query).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ScrapedItem>, AppError> {
        ItemRepository::recent(self, limit).await
    }
}
