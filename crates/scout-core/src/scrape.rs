use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::AppError;
use crate::models::{NO_TITLE, NewScrapedItem, ScrapeOutcome};
use crate::site::SiteConfig;
use crate::traits::{Extractor, Fetcher, ItemStore};

/// Runs one fetch → extract → upsert pass for a URL.
///
/// Generic over all external dependencies via traits, so tests run without
/// real HTTP or a database. Performs no retries and never follows links itself.
pub struct ScrapeService<F, E, S>
where
    F: Fetcher,
    E: Extractor,
    S: ItemStore,
{
    fetcher: F,
    extractor: E,
    store: S,
}

impl<F, E, S> ScrapeService<F, E, S>
where
    F: Fetcher,
    E: Extractor,
    S: ItemStore,
{
    pub fn new(fetcher: F, extractor: E, store: S) -> Self {
        Self {
            fetcher,
            extractor,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch `url`, extract fields with `site`'s rules, and upsert the record.
    ///
    /// 1. Fetch HTML (errors propagate unchanged)
    /// 2. Extract title/content/date/links
    /// 3. Resolve `fetched_at` from the date field or the capture time
    /// 4. Compare with the stored record's hash
    /// 5. Upsert by URL
    pub async fn fetch_and_extract(
        &self,
        url: &str,
        site: &SiteConfig,
    ) -> Result<ScrapeOutcome, AppError> {
        // 1. Fetch
        tracing::debug!(%url, site = %site.name, "Fetching");
        let html = self.fetcher.fetch(url).await?;
        let captured_at = Utc::now();
        tracing::debug!(%url, bytes = html.len(), "Fetched");

        // 2. Extract
        let page = self.extractor.extract(&html, &site.rules)?;

        let title = if page.title.trim().is_empty() {
            tracing::debug!(%url, "No title matched, using sentinel");
            NO_TITLE.to_string()
        } else {
            page.title
        };
        let content = page.content.filter(|c| !c.trim().is_empty());

        // 3. Timestamp
        let fetched_at = page
            .date
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(captured_at);

        let new_item = NewScrapedItem::new(url, title, content, site.name.as_str(), fetched_at);

        // 4. Compare
        let previous = self.store.get_by_url(url).await?;
        let changed = previous
            .as_ref()
            .is_none_or(|prev| prev.content_hash != new_item.content_hash);

        // 5. Persist
        let item = self.store.upsert(&new_item).await?;

        match (&previous, changed) {
            (None, _) => tracing::info!(%url, id = %item.id, "New item saved"),
            (Some(_), true) => tracing::info!(%url, id = %item.id, "Item changed, updated"),
            (Some(_), false) => tracing::debug!(%url, id = %item.id, "Item unchanged, refreshed"),
        }

        let links = if site.rules.links.is_some() {
            page.links
        } else {
            Vec::new()
        };

        Ok(ScrapeOutcome {
            item,
            links,
            changed,
        })
    }
}

/// Parse a timestamp as found in `datetime` attributes and similar markup.
///
/// Accepts RFC 3339, RFC 2822, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`
/// and `YYYY-MM-DD`. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
