use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use scout_client::{ReqwestFetcher, SelectorExtractor, validate_selectors};
use scout_core::models::{ItemQuery, ScrapeOutcome};
use scout_core::queue::{QueueConfig, ScrapeQueue};
use scout_core::scheduler::{Scheduler, SchedulerConfig, TracingSchedulerReporter};
use scout_core::scrape::ScrapeService;
use scout_core::site::SiteRegistry;
use scout_core::store::MemoryStore;
use scout_core::traits::{ItemStore, NullPublisher, StatusStore};
use scout_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "scout", version, about = "Selector-driven content scraper")]
struct Cli {
    /// JSON file with site configurations (built-in sites when omitted)
    #[arg(long, global = true, env = "SCOUT_SITES_FILE")]
    sites_file: Option<PathBuf>,

    /// Allow fetching loopback and private-network addresses
    #[arg(long, global = true, default_value_t = false)]
    allow_private_urls: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one URL with a site's rules and print the result as JSON
    Scrape {
        /// Target URL
        #[arg(short, long)]
        url: String,

        /// Name of the registered site whose rules apply
        #[arg(short, long)]
        site: String,

        /// Upsert the item into the database (requires DATABASE_URL)
        #[arg(long, default_value_t = false)]
        save: bool,
    },

    /// Run the scheduler and queue without the HTTP API
    Run {
        /// Run a single cycle, wait for the queue to drain, then exit
        #[arg(long, default_value_t = false)]
        once: bool,

        /// Keep items in memory instead of the database
        #[arg(long, default_value_t = false)]
        memory: bool,
    },

    /// List the configured sites
    Sites,

    /// Show the most recently fetched items from the database
    Latest {
        /// Exact site name
        #[arg(long)]
        source: Option<String>,

        /// Substring of title or content
        #[arg(short, long)]
        q: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(short, long, default_value_t = ItemQuery::DEFAULT_LIMIT)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Logs go to stderr so JSON on stdout stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scout=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let registry = SiteRegistry::load(cli.sites_file.as_deref())
        .context("Failed to load site registry")?;
    validate_selectors(&registry)?;

    match cli.command {
        Commands::Scrape { url, site, save } => {
            let fetcher = build_fetcher(cli.allow_private_urls)?;
            let outcome = if save {
                let db = connect_db().await?;
                cmd_scrape(&registry, &url, &site, fetcher, db.item_repo()).await?
            } else {
                cmd_scrape(&registry, &url, &site, fetcher, MemoryStore::new()).await?
            };
            println!("{}", render_outcome(&outcome)?);
        }
        Commands::Run { once, memory } => {
            let fetcher = build_fetcher(cli.allow_private_urls)?;
            if memory {
                let store = MemoryStore::new();
                cmd_run(registry, fetcher, store.clone(), store, once).await?;
            } else {
                let db = connect_db().await?;
                cmd_run(registry, fetcher, db.item_repo(), db.status_repo(), once).await?;
            }
        }
        Commands::Sites => {
            print!("{}", render_sites(&registry));
        }
        Commands::Latest {
            source,
            q,
            page,
            limit,
        } => {
            let db = connect_db().await?;
            let mut query = ItemQuery::new().paginate(page, limit);
            if let Some(source) = source {
                query = query.with_source(source);
            }
            if let Some(q) = q {
                query = query.with_search(q);
            }
            cmd_latest(&db, &query).await?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and apply migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env()
        .context("DATABASE_URL not set. Required for --save, run and latest.")?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;
    Ok(db)
}

fn build_fetcher(allow_private_urls: bool) -> Result<ReqwestFetcher> {
    let fetcher = ReqwestFetcher::new().context("Failed to create HTTP client")?;
    if allow_private_urls {
        tracing::warn!("SSRF protection disabled (--allow-private-urls)");
        return Ok(fetcher.allow_private_urls());
    }
    Ok(fetcher)
}

async fn cmd_scrape<S: ItemStore>(
    registry: &SiteRegistry,
    url: &str,
    site: &str,
    fetcher: ReqwestFetcher,
    store: S,
) -> Result<ScrapeOutcome> {
    let site = registry
        .get(site)
        .with_context(|| format!("Unknown site '{site}'"))?;

    tracing::info!("Fetching {url}");
    let service = ScrapeService::new(fetcher, SelectorExtractor::new(), store);
    let outcome = service.fetch_and_extract(url, site).await?;

    tracing::info!(
        id = %outcome.item.id,
        links = outcome.links.len(),
        changed = outcome.changed,
        "Extraction complete"
    );
    Ok(outcome)
}

fn render_outcome(outcome: &ScrapeOutcome) -> Result<String> {
    let value = serde_json::json!({
        "item": outcome.item,
        "links": outcome.links,
        "changed": outcome.changed,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

async fn cmd_run<S, T>(
    registry: SiteRegistry,
    fetcher: ReqwestFetcher,
    store: S,
    status: T,
    once: bool,
) -> Result<()>
where
    S: ItemStore + 'static,
    T: StatusStore,
{
    let service = Arc::new(ScrapeService::new(
        fetcher,
        SelectorExtractor::new(),
        store,
    ));
    let queue = ScrapeQueue::new(Arc::clone(&service), NullPublisher, QueueConfig::from_env()?);
    let scheduler = Scheduler::new(
        registry,
        service,
        status,
        queue.clone(),
        NullPublisher,
        SchedulerConfig::from_env()?,
    );

    if once {
        let summary = scheduler.run_cycle(&TracingSchedulerReporter).await;
        tracing::info!(pending = queue.len(), "Waiting for queued links");
        queue.wait_idle().await;
        println!(
            "Sites ok: {}, failed: {}, links enqueued: {}",
            summary.sites_ok, summary.sites_failed, summary.links_enqueued
        );
        return Ok(());
    }

    let cancel_token = CancellationToken::new();
    tokio::spawn({
        let cancel_token = cancel_token.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "Failed to install CTRL+C handler"),
            }
            cancel_token.cancel();
        }
    });

    scheduler.run(cancel_token, &TracingSchedulerReporter).await;
    Ok(())
}

fn render_sites(registry: &SiteRegistry) -> String {
    let mut out = String::new();
    for site in registry.iter() {
        let rules: Vec<&str> = site.rules.iter().map(|(kind, _)| kind.as_str()).collect();
        out.push_str(&format!(
            "{:<16} {}  [{}]\n",
            site.name,
            site.base_url,
            rules.join(", ")
        ));
    }
    out.push_str(&format!("\nTotal: {} sites\n", registry.len()));
    out
}

async fn cmd_latest(db: &Database, query: &ItemQuery) -> Result<()> {
    let page = db.item_repo().query(query).await?;

    if page.items.is_empty() {
        println!("No items found");
        return Ok(());
    }

    for item in &page.items {
        println!(
            "  {} [{}] {}\n    {}",
            item.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"),
            item.source,
            item.title,
            item.url,
        );
    }

    println!(
        "\nPage {} of {} ({} items)",
        query.page,
        page.pages(query.limit),
        page.total
    );

    Ok(())
}
