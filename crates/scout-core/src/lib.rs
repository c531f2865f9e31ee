pub mod broadcast;
pub mod error;
pub mod extract;
pub mod models;
pub mod queue;
pub mod scheduler;
pub mod scrape;
pub mod site;
pub mod store;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use broadcast::{BroadcastHub, HubConfig, StreamEvent, Subscription};
pub use error::AppError;
pub use extract::{ExtractedPage, ExtractedValue};
pub use models::{
    ItemPage, ItemQuery, NO_TITLE, NewScrapedItem, ScrapeOutcome, ScrapedItem, WorkerStatus,
    compute_hash,
};
pub use queue::{OverflowPolicy, QueueConfig, QueueState, ScrapeQueue};
pub use scheduler::{
    CycleSummary, SCHEDULER_STATUS_NAME, Scheduler, SchedulerConfig, SchedulerEvent,
    SchedulerReporter, TracingSchedulerReporter,
};
pub use scrape::ScrapeService;
pub use site::{ExtractionRule, RuleKind, SiteConfig, SiteRegistry, SiteRules, Transform};
pub use store::MemoryStore;
pub use traits::{Extractor, Fetcher, ItemStore, LinkQueue, NullPublisher, Publisher, StatusStore};
