use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::extract::ExtractedPage;
use crate::models::{ItemPage, ItemQuery, NewScrapedItem, ScrapedItem, WorkerStatus};
use crate::site::{SiteConfig, SiteRules};

/// Fetches raw HTML content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Evaluates a site's extraction rules against a fetched document.
///
/// Implementations degrade gracefully: a rule that matches nothing yields an
/// empty value. Only a title rule that cannot be evaluated at all is an error.
pub trait Extractor: Send + Sync + Clone {
    fn extract(&self, html: &str, rules: &SiteRules) -> Result<ExtractedPage, AppError>;
}

/// Upsert-by-URL persistence for scraped items.
pub trait ItemStore: Send + Sync + Clone {
    /// Insert the item, or update title/content/source/fetched_at in place if
    /// the URL already exists. Returns the stored record.
    fn upsert(
        &self,
        item: &NewScrapedItem,
    ) -> impl Future<Output = Result<ScrapedItem, AppError>> + Send;

    fn get_by_url(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<ScrapedItem>, AppError>> + Send;

    /// Filtered, paginated listing ordered by `fetched_at` descending.
    fn query(&self, query: &ItemQuery) -> impl Future<Output = Result<ItemPage, AppError>> + Send;

    /// The most recently fetched items, newest first.
    fn recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ScrapedItem>, AppError>> + Send;
}

/// Named heartbeat records for external monitoring.
pub trait StatusStore: Send + Sync + Clone {
    fn record_run(
        &self,
        name: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn get_status(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<WorkerStatus>, AppError>> + Send;
}

/// Receives items that were created or changed by a fetch.
pub trait Publisher: Send + Sync + Clone + 'static {
    fn publish(&self, item: &ScrapedItem);
}

/// Accepts discovered links for deferred fetching.
pub trait LinkQueue: Send + Sync {
    fn enqueue(&self, url: String, site: Arc<SiteConfig>) -> Result<(), AppError>;
}

/// A Publisher that drops everything, for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn publish(&self, _item: &ScrapedItem) {}
}
