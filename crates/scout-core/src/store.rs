//! In-memory [`ItemStore`] and [`StatusStore`] for headless runs and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ItemPage, ItemQuery, NewScrapedItem, ScrapedItem, WorkerStatus};
use crate::traits::{ItemStore, StatusStore};

#[derive(Default)]
struct Tables {
    /// Keyed by URL, which makes upserts idempotent by construction.
    items: HashMap<String, ScrapedItem>,
    statuses: HashMap<String, WorkerStatus>,
}

/// Process-local store. Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.lock().map(|t| t.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::DatabaseError("memory store lock poisoned".into()))
    }

    /// Items matching `query`, newest `fetched_at` first.
    fn sorted_matches(tables: &Tables, query: &ItemQuery) -> Vec<ScrapedItem> {
        let mut items: Vec<_> = tables
            .items
            .values()
            .filter(|item| query.matches(item))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        items
    }
}

impl ItemStore for MemoryStore {
    async fn upsert(&self, item: &NewScrapedItem) -> Result<ScrapedItem, AppError> {
        let mut tables = self.lock()?;
        let now = Utc::now();
        let stored = tables
            .items
            .entry(item.url.clone())
            .and_modify(|existing| {
                existing.title = item.title.clone();
                existing.content = item.content.clone();
                existing.source = item.source.clone();
                existing.fetched_at = item.fetched_at;
                existing.content_hash = item.content_hash.clone();
                existing.updated_at = now;
            })
            .or_insert_with(|| ScrapedItem {
                id: Uuid::new_v4(),
                url: item.url.clone(),
                title: item.title.clone(),
                content: item.content.clone(),
                source: item.source.clone(),
                fetched_at: item.fetched_at,
                content_hash: item.content_hash.clone(),
                updated_at: now,
            });
        Ok(stored.clone())
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<ScrapedItem>, AppError> {
        Ok(self.lock()?.items.get(url).cloned())
    }

    async fn query(&self, query: &ItemQuery) -> Result<ItemPage, AppError> {
        let tables = self.lock()?;
        let matches = Self::sorted_matches(&tables, query);
        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect();
        Ok(ItemPage { items, total })
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ScrapedItem>, AppError> {
        let tables = self.lock()?;
        let mut items = Self::sorted_matches(&tables, &ItemQuery::new());
        items.truncate(limit);
        Ok(items)
    }
}

impl StatusStore for MemoryStore {
    async fn record_run(&self, name: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        self.lock()?.statuses.insert(
            name.to_string(),
            WorkerStatus {
                name: name.to_string(),
                last_run: at,
            },
        );
        Ok(())
    }

    async fn get_status(&self, name: &str) -> Result<Option<WorkerStatus>, AppError> {
        Ok(self.lock()?.statuses.get(name).cloned())
    }
}
