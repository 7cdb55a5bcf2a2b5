#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use consentprobe::command::{self, CrawlConfig};
use consentprobe::errors::CrawlerError;
use consentprobe::resources::{self, Resources};
use consentprobe::session::{Session, SessionConfig};
use consentprobe::signal::LifecycleChannel;
use consentprobe::store::ResultStore;
use consentprobe::types::{ViewportSize, Visit};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const _EXIT_COMMAND_ERROR: i32 = 1;
const _EXIT_RESOURCE_FAILED: i32 = 2;
const _EXIT_STORE_FAILED: i32 = 3;
const _EXIT_WEBDRIVER_FAILED: i32 = 4;
const _EXIT_TIMEOUT: i32 = 5;

#[derive(Parser)]
#[command(name = "consentprobe")]
#[command(about = "Consent-dialog and dark-pattern measurement crawler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Visit every site in a list and record consent measurements
    Crawl {
        /// Site list CSV, one "rank,domain" per line
        site_list: PathBuf,

        #[command(flatten)]
        options: CrawlOptions,
    },

    /// Run a single visit against one URL
    Visit {
        /// URL to visit
        url: String,

        #[command(flatten)]
        options: CrawlOptions,
    },
}

#[derive(Args)]
struct CrawlOptions {
    /// WebDriver endpoint
    #[arg(long, default_value = "http://localhost:4444")]
    webdriver_url: String,

    /// Output directory for the results database and captured artifacts
    #[arg(long, default_value = "crawl-data")]
    data_dir: PathBuf,

    /// Directory holding phrase lists, dialog markers, and cmplist.json
    #[arg(long, default_value = "resources")]
    resources_dir: PathBuf,

    /// Languages to try, in order, for the consent phrase search
    #[arg(long, value_delimiter = ',', default_value = "nl,en")]
    languages: Vec<String>,

    /// Seconds to wait after each page load
    #[arg(long, default_value_t = 3)]
    sleep: u64,

    /// Follow same-site links after loading instead of a plain page load
    #[arg(long)]
    browse: bool,

    /// Number of same-site links to follow when browsing
    #[arg(long, default_value_t = 3)]
    num_links: u32,

    /// Simulate user gestures (mouse movement, scrolling) after each load
    #[arg(long)]
    bot_mitigation: bool,

    /// Save a viewport screenshot per visit
    #[arg(long)]
    screenshot: bool,

    /// Save a stitched full-page screenshot per visit
    #[arg(long)]
    full_page_screenshot: bool,

    /// Dump the page source per visit
    #[arg(long)]
    dump_source: bool,

    /// Dump the full frame tree per visit as gzipped JSON
    #[arg(long)]
    recursive_dump_source: bool,

    /// Ping the IAB TCF API and record the responding CMP
    #[arg(long)]
    ping_cmp: bool,

    /// Record whether a known cookie dialog is present
    #[arg(long)]
    detect_cookie_dialog: bool,

    /// Run browser in visible mode (disables headless)
    #[arg(long = "no-headless")]
    no_headless: bool,

    /// Set viewport size (WIDTHxHEIGHT, e.g., 1366x768)
    #[arg(long)]
    viewport: Option<String>,

    /// Aggregator address for visit lifecycle signals (host:port)
    #[arg(long)]
    aggregator: Option<String>,

    /// Browser id recorded with each visit
    #[arg(long, default_value_t = 0)]
    browser_id: i64,
}

impl CrawlOptions {
    fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            data_dir: self.data_dir.clone(),
            resources_dir: self.resources_dir.clone(),
            languages: self.languages.clone(),
            sleep: self.sleep,
            browse: self.browse,
            num_links: self.num_links,
            bot_mitigation: self.bot_mitigation,
            screenshot: self.screenshot,
            full_page_screenshot: self.full_page_screenshot,
            dump_source: self.dump_source,
            recursive_dump_source: self.recursive_dump_source,
            ping_cmp: self.ping_cmp,
            detect_cookie_dialog: self.detect_cookie_dialog,
            aggregator_addr: self.aggregator.clone(),
            browser_id: self.browser_id,
        }
    }

    fn session_config(&self) -> Result<SessionConfig> {
        let viewport = match &self.viewport {
            Some(spec) => Some(ViewportSize::parse(spec)?),
            None => None,
        };
        Ok(SessionConfig {
            webdriver_url: self.webdriver_url.clone(),
            headless: !self.no_headless,
            viewport,
        })
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            let crawler_err: CrawlerError = err.into();
            eprintln!("Error: {}", crawler_err);
            std::process::exit(crawler_err.exit_code());
        }
    }
}

async fn run() -> Result<()> {
    // Logs go to stderr so stdout stays free for shell pipelines
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consentprobe=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl { site_list, options } => {
            let sites = resources::load_site_list(&site_list)?;
            run_crawl(&sites, &options).await
        }
        Commands::Visit { url, options } => run_crawl(&[url], &options).await,
    }
}

async fn run_crawl(sites: &[String], options: &CrawlOptions) -> Result<()> {
    let config = options.crawl_config();
    config.ensure_directories()?;

    let resources = Resources::open(&config.resources_dir)?;
    let store =
        ResultStore::open(&config.database_path()).context("Failed to open results database")?;
    let mut lifecycle = LifecycleChannel::connect(config.aggregator_addr.as_deref()).await;

    let session = Session::connect(&options.session_config()?).await?;

    info!("Starting crawl of {} site(s)", sites.len());
    let crawl_result =
        visit_sites(sites, &config, &resources, &store, &mut lifecycle, &session).await;

    if let Err(e) = session.close().await {
        warn!("Browser session did not close cleanly: {}", e);
    }

    let recorded = store
        .visit_count()
        .context("Failed to read results database")?;
    info!("Crawl finished: {} visit(s) recorded", recorded);

    crawl_result
}

async fn visit_sites(
    sites: &[String],
    config: &CrawlConfig,
    resources: &Resources,
    store: &ResultStore,
    lifecycle: &mut LifecycleChannel,
    session: &Session,
) -> Result<()> {
    for (index, site) in sites.iter().enumerate() {
        let visit = Visit {
            visit_id: index as i64 + 1,
            browser_id: config.browser_id,
            site_url: site.clone(),
        };
        info!("Visit {} of {}: {}", visit.visit_id, sites.len(), site);

        store
            .record_visit(&visit)
            .context("Failed to write to results database")?;
        lifecycle.visit_started(visit.visit_id).await;

        // A failed command never aborts the visit: later detectors still run
        // and the finalize signal is still sent
        for command in config.command_sequence(site) {
            if let Err(e) = command::run_command(
                &command, &visit, session, config, resources, store, lifecycle,
            )
            .await
            {
                warn!("Visit {} command {:?} failed: {:#}", visit.visit_id, command, e);
            }
        }
    }
    Ok(())
}
