use std::sync::Arc;

use scout_client::{ReqwestFetcher, SelectorExtractor};
use scout_core::broadcast::BroadcastHub;
use scout_core::queue::{QueueConfig, ScrapeQueue};
use scout_core::scheduler::{Scheduler, SchedulerConfig};
use scout_core::scrape::ScrapeService;
use scout_core::site::SiteRegistry;
use scout_db::{Database, ItemRepository, StatusRepository};

/// Items sent in the `initial` event of a new subscription.
pub const DEFAULT_SNAPSHOT_SIZE: usize = 10;

pub type LiveService = ScrapeService<ReqwestFetcher, SelectorExtractor, ItemRepository>;
pub type LiveQueue = ScrapeQueue<ReqwestFetcher, SelectorExtractor, ItemRepository, BroadcastHub>;
pub type LiveScheduler = Scheduler<
    ReqwestFetcher,
    SelectorExtractor,
    ItemRepository,
    StatusRepository,
    LiveQueue,
    BroadcastHub,
>;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub db: Database,
    pub registry: SiteRegistry,
    pub hub: BroadcastHub,
    pub queue: LiveQueue,
    pub service: Arc<LiveService>,
    /// Admin API key for protecting write endpoints (None = admin endpoints disabled).
    pub admin_token: Option<String>,
    pub snapshot_size: usize,
}

impl AppState {
    /// Wire the fetch pipeline, queue and hub around one database.
    pub fn new(
        db: Database,
        registry: SiteRegistry,
        fetcher: ReqwestFetcher,
        queue_config: QueueConfig,
        admin_token: Option<String>,
    ) -> Self {
        let service = Arc::new(ScrapeService::new(
            fetcher,
            SelectorExtractor::new(),
            db.item_repo(),
        ));
        let hub = BroadcastHub::default();
        let queue = ScrapeQueue::new(Arc::clone(&service), hub.clone(), queue_config);

        Self {
            db,
            registry,
            hub,
            queue,
            service,
            admin_token,
            snapshot_size: DEFAULT_SNAPSHOT_SIZE,
        }
    }

    /// A scheduler sharing this state's pipeline, queue and hub.
    pub fn scheduler(&self, config: SchedulerConfig) -> LiveScheduler {
        Scheduler::new(
            self.registry.clone(),
            Arc::clone(&self.service),
            self.db.status_repo(),
            self.queue.clone(),
            self.hub.clone(),
            config,
        )
    }
}
