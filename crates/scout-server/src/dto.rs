use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scout_core::models::{ItemPage, ItemQuery, ScrapedItem, WorkerStatus};

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A stored scraped item as returned by the API and the event stream.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub content: Option<String>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub content_hash: String,
    pub updated_at: DateTime<Utc>,
}

impl From<ScrapedItem> for ItemResponse {
    fn from(item: ScrapedItem) -> Self {
        Self {
            id: item.id,
            url: item.url,
            title: item.title,
            content: item.content,
            source: item.source,
            fetched_at: item.fetched_at,
            content_hash: item.content_hash,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct LatestQuery {
    /// Exact site name.
    pub source: Option<String>,
    /// Substring of title or content.
    pub q: Option<String>,
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Page size (default 20, max 100).
    pub limit: Option<u32>,
}

impl LatestQuery {
    /// Blank filters are ignored; page and limit are clamped.
    pub fn to_item_query(&self) -> ItemQuery {
        let mut query = ItemQuery::new().paginate(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(ItemQuery::DEFAULT_LIMIT),
        );
        if let Some(source) = non_blank(self.source.as_deref()) {
            query = query.with_source(source);
        }
        if let Some(q) = non_blank(self.q.as_deref()) {
            query = query.with_search(q);
        }
        query
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LatestResponse {
    pub items: Vec<ItemResponse>,
    pub pagination: Pagination,
}

impl LatestResponse {
    pub fn new(page: ItemPage, query: &ItemQuery) -> Self {
        let pages = page.pages(query.limit);
        Self {
            pagination: Pagination {
                page: query.page,
                limit: query.limit,
                total: page.total,
                pages,
            },
            items: page.items.into_iter().map(ItemResponse::from).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub name: String,
    pub last_run: DateTime<Utc>,
}

impl From<WorkerStatus> for StatusResponse {
    fn from(status: WorkerStatus) -> Self {
        Self {
            name: status.name,
            last_run: status.last_run,
        }
    }
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct EnqueueRequest {
    pub url: String,
    /// Name of a registered site whose rules apply.
    pub site: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EnqueueResponse {
    pub url: String,
    pub site: String,
    /// Entries waiting after this one was added.
    pub pending: usize,
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}
