//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::extract::ExtractedPage;
use crate::models::{ItemPage, ItemQuery, NewScrapedItem, ScrapedItem, WorkerStatus};
use crate::scheduler::{SchedulerEvent, SchedulerReporter};
use crate::site::{ExtractionRule, SiteConfig, SiteRules};
use crate::store::MemoryStore;
use crate::traits::{Extractor, Fetcher, ItemStore, LinkQueue, Publisher, StatusStore};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// One recorded call to [`MockFetcher::fetch`].
#[derive(Debug, Clone)]
pub struct FetchCall {
    pub url: String,
    pub started: Instant,
}

/// Mock fetcher that returns configurable responses and records every call.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    calls: Arc<Mutex<Vec<FetchCall>>>,
    latency: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
            latency: Duration::ZERO,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep this long inside every fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }

    /// Highest number of fetches observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let now_running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_running, Ordering::SeqCst);
        self.calls.lock().unwrap().push(FetchCall {
            url: url.to_string(),
            started: Instant::now(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let response = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok("<html><body>default</body></html>".to_string())
            } else {
                responses.remove(0)
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that returns configurable pages.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<ExtractedPage, AppError>>>>,
}

impl MockExtractor {
    pub fn new(page: ExtractedPage) -> Self {
        Self::with_responses(vec![Ok(page)])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<ExtractedPage, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }

    /// Every call yields a page with this title and these links.
    pub fn with_links(title: &str, links: Vec<String>) -> Self {
        Self::new(ExtractedPage {
            title: title.to_string(),
            links,
            ..Default::default()
        })
    }
}

impl Extractor for MockExtractor {
    fn extract(&self, _html: &str, _rules: &SiteRules) -> Result<ExtractedPage, AppError> {
        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => Ok(ExtractedPage {
                title: "default".to_string(),
                ..Default::default()
            }),
            // The last response repeats so long-running tests keep working.
            1 => match &responses[0] {
                Ok(page) => Ok(page.clone()),
                Err(_) => responses.remove(0),
            },
            _ => responses.remove(0),
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory store with injectable failures.
#[derive(Clone, Default)]
pub struct MockStore {
    pub inner: MemoryStore,
    upsert_error: Arc<Mutex<Option<AppError>>>,
    status_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store whose next upsert fails.
    pub fn with_upsert_error(error: AppError) -> Self {
        let store = Self::default();
        *store.upsert_error.lock().unwrap() = Some(error);
        store
    }

    /// Store whose next heartbeat write fails.
    pub fn with_status_error(error: AppError) -> Self {
        let store = Self::default();
        *store.status_error.lock().unwrap() = Some(error);
        store
    }
}

impl ItemStore for MockStore {
    async fn upsert(&self, item: &NewScrapedItem) -> Result<ScrapedItem, AppError> {
        let err = self.upsert_error.lock().unwrap().take();
        if let Some(e) = err {
            return Err(e);
        }
        self.inner.upsert(item).await
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<ScrapedItem>, AppError> {
        self.inner.get_by_url(url).await
    }

    async fn query(&self, query: &ItemQuery) -> Result<ItemPage, AppError> {
        self.inner.query(query).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ScrapedItem>, AppError> {
        self.inner.recent(limit).await
    }
}

impl StatusStore for MockStore {
    async fn record_run(&self, name: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let err = self.status_error.lock().unwrap().take();
        if let Some(e) = err {
            return Err(e);
        }
        self.inner.record_run(name, at).await
    }

    async fn get_status(&self, name: &str) -> Result<Option<WorkerStatus>, AppError> {
        self.inner.get_status(name).await
    }
}

// ---------------------------------------------------------------------------
// RecordingPublisher / RecordingLinkQueue
// ---------------------------------------------------------------------------

/// Publisher that records the URL of every published item.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    pub published: Arc<Mutex<Vec<String>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, item: &ScrapedItem) {
        self.published.lock().unwrap().push(item.url.clone());
    }
}

/// Link queue that records `(url, site name)` pairs without fetching anything.
#[derive(Clone, Default)]
pub struct RecordingLinkQueue {
    pub entries: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingLinkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().unwrap().clone()
    }
}

impl LinkQueue for RecordingLinkQueue {
    fn enqueue(&self, url: String, site: Arc<SiteConfig>) -> Result<(), AppError> {
        self.entries.lock().unwrap().push((url, site.name.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock scheduler reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl SchedulerReporter for MockReporter {
    fn report(&self, event: SchedulerEvent<'_>) {
        let label = match &event {
            SchedulerEvent::Started => "Started",
            SchedulerEvent::CycleStarted { .. } => "CycleStarted",
            SchedulerEvent::SiteStarted { .. } => "SiteStarted",
            SchedulerEvent::SiteCompleted { .. } => "SiteCompleted",
            SchedulerEvent::SiteFailed { .. } => "SiteFailed",
            SchedulerEvent::HeartbeatFailed { .. } => "HeartbeatFailed",
            SchedulerEvent::CycleCompleted { .. } => "CycleCompleted",
            SchedulerEvent::Stopped => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// A site with an `h1` title rule and an `a[href]` links rule.
pub fn make_test_site(name: &str, base_url: &str) -> Arc<SiteConfig> {
    let mut rules = SiteRules::new(ExtractionRule::new("h1"));
    rules.links = Some(ExtractionRule::new("a").with_attribute("href"));
    Arc::new(SiteConfig::new(name, base_url, rules))
}
