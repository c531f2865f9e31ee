use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::error::AppError;
use crate::scheduler::env_parse;
use crate::scrape::ScrapeService;
use crate::site::SiteConfig;
use crate::traits::{Extractor, Fetcher, ItemStore, LinkQueue, Publisher};

/// What happens when a link arrives at a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest pending entry to make room.
    #[default]
    DropOldest,
    /// Refuse the new entry with [`AppError::QueueOverflow`].
    Reject,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop_oldest" | "drop-oldest" => Ok(Self::DropOldest),
            "reject" => Ok(Self::Reject),
            other => Err(AppError::ConfigError(format!(
                "Unknown queue overflow policy '{other}' (expected drop_oldest or reject)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Pause after each processed entry, success or failure.
    pub delay: Duration,
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1000),
            capacity: 1000,
            overflow: OverflowPolicy::default(),
        }
    }
}

impl QueueConfig {
    /// Read overrides from the environment.
    ///
    /// - `SCOUT_QUEUE_DELAY_MS` (optional, defaults to 1000)
    /// - `SCOUT_QUEUE_CAPACITY` (optional, defaults to 1000)
    /// - `SCOUT_QUEUE_OVERFLOW` (optional, `drop_oldest` or `reject`)
    pub fn from_env() -> Result<Self, AppError> {
        let mut config = Self::default();
        if let Some(ms) = env_parse::<u64>("SCOUT_QUEUE_DELAY_MS")? {
            config.delay = Duration::from_millis(ms);
        }
        if let Some(capacity) = env_parse::<usize>("SCOUT_QUEUE_CAPACITY")? {
            if capacity == 0 {
                return Err(AppError::ConfigError(
                    "SCOUT_QUEUE_CAPACITY must be at least 1".into(),
                ));
            }
            config.capacity = capacity;
        }
        if let Ok(raw) = std::env::var("SCOUT_QUEUE_OVERFLOW") {
            config.overflow = raw.parse()?;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Draining,
}

struct QueueEntry {
    url: String,
    site: Arc<SiteConfig>,
}

/// Pending entries and the drain flag share one lock, so a consumer can never
/// observe an empty list and exit while an enqueue is deciding not to spawn.
struct Pending {
    entries: VecDeque<QueueEntry>,
    draining: bool,
}

struct Inner<F, E, S, P>
where
    F: Fetcher,
    E: Extractor,
    S: ItemStore,
    P: Publisher,
{
    service: Arc<ScrapeService<F, E, S>>,
    publisher: P,
    config: QueueConfig,
    pending: Mutex<Pending>,
    state: watch::Sender<QueueState>,
}

impl<F, E, S, P> Inner<F, E, S, P>
where
    F: Fetcher,
    E: Extractor,
    S: ItemStore,
    P: Publisher,
{
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Global FIFO of discovered links, processed one at a time with a fixed
/// pause after each entry. Cloning shares the same queue.
pub struct ScrapeQueue<F, E, S, P>
where
    F: Fetcher,
    E: Extractor,
    S: ItemStore,
    P: Publisher,
{
    inner: Arc<Inner<F, E, S, P>>,
}

impl<F, E, S, P> Clone for ScrapeQueue<F, E, S, P>
where
    F: Fetcher,
    E: Extractor,
    S: ItemStore,
    P: Publisher,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F, E, S, P> ScrapeQueue<F, E, S, P>
where
    F: Fetcher + 'static,
    E: Extractor + 'static,
    S: ItemStore + 'static,
    P: Publisher,
{
    pub fn new(service: Arc<ScrapeService<F, E, S>>, publisher: P, config: QueueConfig) -> Self {
        let (state, _) = watch::channel(QueueState::Idle);
        Self {
            inner: Arc::new(Inner {
                service,
                publisher,
                config,
                pending: Mutex::new(Pending {
                    entries: VecDeque::new(),
                    draining: false,
                }),
                state,
            }),
        }
    }

    /// Append a link and make sure exactly one consumer is draining.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue(&self, url: String, site: Arc<SiteConfig>) -> Result<(), AppError> {
        let mut pending = self.inner.lock();

        if pending.entries.len() >= self.inner.config.capacity {
            match self.inner.config.overflow {
                OverflowPolicy::Reject => {
                    tracing::warn!(%url, "Scrape queue full, rejecting link");
                    return Err(AppError::QueueOverflow {
                        capacity: self.inner.config.capacity,
                    });
                }
                OverflowPolicy::DropOldest => {
                    if let Some(dropped) = pending.entries.pop_front() {
                        tracing::warn!(dropped = %dropped.url, "Scrape queue full, dropped oldest link");
                    }
                }
            }
        }

        tracing::debug!(%url, site = %site.name, "Enqueued link");
        pending.entries.push_back(QueueEntry { url, site });

        if !pending.draining {
            pending.draining = true;
            self.inner.state.send_replace(QueueState::Draining);
            tokio::spawn(drain(Arc::clone(&self.inner)));
        }
        Ok(())
    }

    /// Number of entries waiting (excludes the one being fetched).
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> QueueState {
        *self.inner.state.borrow()
    }

    /// Resolves once the queue has nothing pending and no consumer running.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|state| *state == QueueState::Idle).await;
    }
}

impl<F, E, S, P> LinkQueue for ScrapeQueue<F, E, S, P>
where
    F: Fetcher + 'static,
    E: Extractor + 'static,
    S: ItemStore + 'static,
    P: Publisher,
{
    fn enqueue(&self, url: String, site: Arc<SiteConfig>) -> Result<(), AppError> {
        ScrapeQueue::enqueue(self, url, site)
    }
}

/// Clears the drain flag when the consumer is torn down before it finished,
/// e.g. a panicking fetcher. The next `enqueue` then starts a fresh consumer
/// for whatever is still pending.
struct DrainGuard<'a, F, E, S, P>
where
    F: Fetcher,
    E: Extractor,
    S: ItemStore,
    P: Publisher,
{
    inner: &'a Inner<F, E, S, P>,
    armed: bool,
}

impl<F, E, S, P> Drop for DrainGuard<'_, F, E, S, P>
where
    F: Fetcher,
    E: Extractor,
    S: ItemStore,
    P: Publisher,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut pending = self.inner.lock();
        pending.draining = false;
        self.inner.state.send_replace(QueueState::Idle);
        tracing::error!(
            pending = pending.entries.len(),
            "Scrape queue consumer aborted"
        );
    }
}

/// The single consumer. Exits, clearing the drain flag, only when it finds
/// the list empty under the lock.
async fn drain<F, E, S, P>(inner: Arc<Inner<F, E, S, P>>)
where
    F: Fetcher,
    E: Extractor,
    S: ItemStore,
    P: Publisher,
{
    let mut guard = DrainGuard {
        inner: &inner,
        armed: true,
    };

    loop {
        let entry = {
            let mut pending = inner.lock();
            match pending.entries.pop_front() {
                Some(entry) => entry,
                None => {
                    guard.armed = false;
                    pending.draining = false;
                    inner.state.send_replace(QueueState::Idle);
                    tracing::debug!("Scrape queue drained");
                    return;
                }
            }
        };

        match inner
            .service
            .fetch_and_extract(&entry.url, &entry.site)
            .await
        {
            Ok(outcome) => {
                if outcome.changed {
                    inner.publisher.publish(&outcome.item);
                }
            }
            Err(e) => {
                tracing::warn!(url = %entry.url, site = %entry.site.name, error = %e, "Queued fetch failed");
            }
        }

        tokio::time::sleep(inner.config.delay).await;
    }
}
