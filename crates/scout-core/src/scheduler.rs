use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::scrape::ScrapeService;
use crate::site::{SiteConfig, SiteRegistry};
use crate::traits::{Extractor, Fetcher, ItemStore, LinkQueue, Publisher, StatusStore};

/// Name of the heartbeat record written after every cycle.
pub const SCHEDULER_STATUS_NAME: &str = "scraper";

/// Scheduler timing and fan-out limits.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Period between cycle starts.
    pub interval: Duration,
    /// Discovered links enqueued per site per cycle.
    pub max_links_per_site: usize,
    pub status_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            max_links_per_site: 10,
            status_name: SCHEDULER_STATUS_NAME.to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Read overrides from the environment.
    ///
    /// - `SCOUT_SCRAPE_INTERVAL_SECS` (optional, defaults to 900)
    /// - `SCOUT_MAX_LINKS_PER_SITE` (optional, defaults to 10)
    pub fn from_env() -> Result<Self, AppError> {
        let mut config = Self::default();
        if let Some(secs) = env_parse::<u64>("SCOUT_SCRAPE_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(AppError::ConfigError(
                    "SCOUT_SCRAPE_INTERVAL_SECS must be at least 1".into(),
                ));
            }
            config.interval = Duration::from_secs(secs);
        }
        if let Some(max) = env_parse::<usize>("SCOUT_MAX_LINKS_PER_SITE")? {
            config.max_links_per_site = max;
        }
        Ok(config)
    }
}

/// Parse an optional environment variable, mapping bad values to `ConfigError`.
pub(crate) fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, AppError> {
    match std::env::var(name) {
        Err(_) => Ok(None),
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            AppError::ConfigError(format!("Invalid {name} '{raw}': must be a non-negative integer"))
        }),
    }
}

/// Totals for one pass over the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub sites_ok: usize,
    pub sites_failed: usize,
    pub links_enqueued: usize,
}

/// Events emitted by the scheduler for monitoring/logging.
#[derive(Debug, Clone)]
pub enum SchedulerEvent<'a> {
    Started,
    CycleStarted {
        sites: usize,
    },
    SiteStarted {
        site: &'a str,
        url: &'a str,
    },
    SiteCompleted {
        site: &'a str,
        links_found: usize,
        links_enqueued: usize,
    },
    SiteFailed {
        site: &'a str,
        error: &'a AppError,
    },
    HeartbeatFailed {
        error: &'a AppError,
    },
    CycleCompleted {
        summary: &'a CycleSummary,
        elapsed: Duration,
    },
    Stopped,
}

/// Trait for receiving scheduler events (decoupled logging).
pub trait SchedulerReporter: Send + Sync {
    fn report(&self, event: SchedulerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSchedulerReporter;

impl SchedulerReporter for TracingSchedulerReporter {
    fn report(&self, event: SchedulerEvent<'_>) {
        match event {
            SchedulerEvent::Started => {
                tracing::info!("Scheduler started");
            }
            SchedulerEvent::CycleStarted { sites } => {
                tracing::info!(%sites, "Starting scrape cycle");
            }
            SchedulerEvent::SiteStarted { site, url } => {
                tracing::info!(%site, %url, "Processing site");
            }
            SchedulerEvent::SiteCompleted {
                site,
                links_found,
                links_enqueued,
            } => {
                tracing::info!(%site, %links_found, %links_enqueued, "Site processed");
            }
            SchedulerEvent::SiteFailed { site, error } => {
                tracing::warn!(%site, %error, retryable = error.is_retryable(), "Site failed");
            }
            SchedulerEvent::HeartbeatFailed { error } => {
                tracing::error!(%error, "Failed to record scheduler heartbeat");
            }
            SchedulerEvent::CycleCompleted { summary, elapsed } => {
                tracing::info!(
                    sites_ok = summary.sites_ok,
                    sites_failed = summary.sites_failed,
                    links_enqueued = summary.links_enqueued,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Scrape cycle complete"
                );
            }
            SchedulerEvent::Stopped => {
                tracing::info!("Scheduler stopped");
            }
        }
    }
}

/// Periodic worker loop: seed-fetch every site, fan discovered links out to
/// the queue, record a heartbeat, sleep until the next cycle.
pub struct Scheduler<F, E, S, T, Q, P>
where
    F: Fetcher,
    E: Extractor,
    S: ItemStore,
    T: StatusStore,
    Q: LinkQueue,
    P: Publisher,
{
    registry: SiteRegistry,
    service: Arc<ScrapeService<F, E, S>>,
    status: T,
    queue: Q,
    publisher: P,
    config: SchedulerConfig,
}

impl<F, E, S, T, Q, P> Scheduler<F, E, S, T, Q, P>
where
    F: Fetcher,
    E: Extractor,
    S: ItemStore,
    T: StatusStore,
    Q: LinkQueue,
    P: Publisher,
{
    pub fn new(
        registry: SiteRegistry,
        service: Arc<ScrapeService<F, E, S>>,
        status: T,
        queue: Q,
        publisher: P,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            service,
            status,
            queue,
            publisher,
            config,
        }
    }

    /// Run cycles until cancellation. Each cycle starts `interval` after the
    /// previous one started; a slow cycle delays the next rather than overlapping.
    pub async fn run<R: SchedulerReporter>(&self, cancel_token: CancellationToken, reporter: &R) {
        reporter.report(SchedulerEvent::Started);

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            let cycle_start = Instant::now();
            self.run_cycle(reporter).await;

            tokio::select! {
                () = tokio::time::sleep_until(cycle_start + self.config.interval) => {}
                () = cancel_token.cancelled() => break,
            }
        }

        reporter.report(SchedulerEvent::Stopped);
    }

    /// One pass over the registry in order. Never fails: per-site errors and
    /// heartbeat errors are reported and skipped.
    pub async fn run_cycle<R: SchedulerReporter>(&self, reporter: &R) -> CycleSummary {
        let started = Instant::now();
        let mut summary = CycleSummary::default();
        reporter.report(SchedulerEvent::CycleStarted {
            sites: self.registry.len(),
        });

        for site in self.registry.iter() {
            match self.process_site(site, reporter).await {
                Ok(enqueued) => {
                    summary.sites_ok += 1;
                    summary.links_enqueued += enqueued;
                }
                Err(error) => {
                    summary.sites_failed += 1;
                    reporter.report(SchedulerEvent::SiteFailed {
                        site: &site.name,
                        error: &error,
                    });
                }
            }
        }

        if let Err(error) = self
            .status
            .record_run(&self.config.status_name, Utc::now())
            .await
        {
            reporter.report(SchedulerEvent::HeartbeatFailed { error: &error });
        }

        reporter.report(SchedulerEvent::CycleCompleted {
            summary: &summary,
            elapsed: started.elapsed(),
        });
        summary
    }

    /// Seed-fetch one site and enqueue its first links. Returns the number of
    /// links enqueued.
    async fn process_site<R: SchedulerReporter>(
        &self,
        site: &Arc<SiteConfig>,
        reporter: &R,
    ) -> Result<usize, AppError> {
        reporter.report(SchedulerEvent::SiteStarted {
            site: &site.name,
            url: &site.base_url,
        });

        let outcome = self
            .service
            .fetch_and_extract(&site.base_url, site)
            .await?;
        if outcome.changed {
            self.publisher.publish(&outcome.item);
        }

        let links_found = outcome.links.len();
        let mut enqueued = 0;
        for link in outcome
            .links
            .into_iter()
            .take(self.config.max_links_per_site)
        {
            match self.queue.enqueue(link, Arc::clone(site)) {
                Ok(()) => enqueued += 1,
                Err(e) => {
                    // Only a rejecting queue errors; the rest of the batch would fail too.
                    tracing::warn!(site = %site.name, error = %e, "Stopped enqueueing links");
                    break;
                }
            }
        }

        reporter.report(SchedulerEvent::SiteCompleted {
            site: &site.name,
            links_found,
            links_enqueued: enqueued,
        });
        Ok(enqueued)
    }
}
