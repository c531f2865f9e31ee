use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Title stored when a page has no resolvable title.
pub const NO_TITLE: &str = "No title";

/// A persisted scraped record. `url` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedItem {
    /// Stable across upserts of the same URL.
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub content: Option<String>,
    /// Name of the site configuration that produced the record.
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    /// SHA-256 of title + content (for change detection)
    pub content_hash: String,
    pub updated_at: DateTime<Utc>,
}

/// Upsert payload, keyed by `url`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScrapedItem {
    pub url: String,
    pub title: String,
    pub content: Option<String>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub content_hash: String,
}

impl NewScrapedItem {
    /// Build an upsert payload, computing the content hash from title and content.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: Option<String>,
        source: impl Into<String>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        let content_hash = item_hash(&title, content.as_deref());
        Self {
            url: url.into(),
            title,
            content,
            source: source.into(),
            fetched_at,
            content_hash,
        }
    }
}

/// Result of one fetch-and-extract run.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    /// The record as stored after the upsert.
    pub item: ScrapedItem,
    /// Absolute links discovered on the page (empty when the site has no links rule).
    pub links: Vec<String>,
    /// True when the URL was new or its content hash changed.
    ///
    /// The hash covers title and content only. A re-fetch that just moves
    /// `fetched_at` still updates the stored row but reports `false`, so it is
    /// not published.
    pub changed: bool,
}

/// Filters and pagination for listing stored items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    /// Exact match on `source`.
    pub source: Option<String>,
    /// Substring match on `title` or `content`.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl ItemQuery {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// First page, default limit, no filters.
    pub fn new() -> Self {
        Self {
            source: None,
            search: None,
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Set page and limit, clamping to `1..` and `1..=MAX_LIMIT`.
    pub fn paginate(mut self, page: u32, limit: u32) -> Self {
        self.page = page.max(1);
        self.limit = limit.clamp(1, Self::MAX_LIMIT);
        self
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }

    /// Returns true if `item` passes the source and search filters.
    pub fn matches(&self, item: &ScrapedItem) -> bool {
        let source_ok = self.source.as_deref().is_none_or(|s| item.source == s);
        let search_ok = self.search.as_deref().is_none_or(|q| {
            item.title.contains(q) || item.content.as_deref().is_some_and(|c| c.contains(q))
        });
        source_ok && search_ok
    }
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// One page of query results plus the total match count.
#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    pub items: Vec<ScrapedItem>,
    pub total: u64,
}

impl ItemPage {
    /// Number of pages for the given page size.
    pub fn pages(&self, limit: u32) -> u64 {
        if limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(limit))
    }
}

/// Heartbeat record written once per scheduler cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub name: String,
    pub last_run: DateTime<Utc>,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash of the user-visible fields of an item.
pub fn item_hash(title: &str, content: Option<&str>) -> String {
    // Separator keeps ("ab", "c") and ("a", "bc") apart.
    compute_hash(&format!("{title}\u{1f}{}", content.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(source: &str, title: &str, content: Option<&str>) -> ScrapedItem {
        ScrapedItem {
            id: Uuid::new_v4(),
            url: format!("https://example.com/{title}"),
            title: title.to_string(),
            content: content.map(str::to_string),
            source: source.to_string(),
            fetched_at: Utc::now(),
            content_hash: item_hash(title, content),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_item_hash_separates_fields() {
        assert_ne!(item_hash("ab", Some("c")), item_hash("a", Some("bc")));
        assert_eq!(item_hash("a", None), item_hash("a", Some("")));
    }

    #[test]
    fn test_query_pagination_is_clamped() {
        let q = ItemQuery::new().paginate(0, 500);
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, ItemQuery::MAX_LIMIT);
        assert_eq!(q.offset(), 0);

        let q = ItemQuery::new().paginate(3, 20);
        assert_eq!(q.offset(), 40);
    }

    #[test]
    fn test_query_matches_source_and_search() {
        let hn = item("HackerNews", "Rust 2024", Some("edition notes"));
        let dev = item("Dev.to", "Async traits", None);

        let q = ItemQuery::new().with_source("HackerNews");
        assert!(q.matches(&hn));
        assert!(!q.matches(&dev));

        let q = ItemQuery::new().with_search("edition");
        assert!(q.matches(&hn));
        assert!(!q.matches(&dev));

        let q = ItemQuery::new().with_search("Async");
        assert!(q.matches(&dev));
    }

    #[test]
    fn test_page_count() {
        let page = ItemPage {
            items: vec![],
            total: 41,
        };
        assert_eq!(page.pages(20), 3);
        assert_eq!(page.pages(0), 0);
    }

    #[test]
    fn test_item_serializes_camel_case() {
        let json = serde_json::to_value(item("Test", "Hello", None)).unwrap();
        assert!(json.get("fetchedAt").is_some());
        assert!(json.get("contentHash").is_some());
        assert_eq!(json["content"], serde_json::Value::Null);
    }
}
