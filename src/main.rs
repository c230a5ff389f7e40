//! listing-scraper - browser-driven catalog listing scraper
//!
//! Drives Chrome through WebDriver, or replays a saved page with `--offline`.

use anyhow::Result;
use clap::Parser;
use listing_scraper::browser::{FixtureLauncher, FixtureSite};
use listing_scraper::commands::ScrapeCommand;
use listing_scraper::config::Config;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "listing-scraper",
    version,
    about = "Scrape product listings from a catalog page",
    long_about = "Opens a catalog page in Chrome, waits for the product cards to render and logs \
                  title, author, prices, rating, stock and description for every listing."
)]
struct Cli {
    /// Application settings file (user agent, browser options)
    #[arg(long, env = "SCRAPER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Catalog settings file (URLs and element selectors)
    #[arg(long, env = "SCRAPER_CATALOG")]
    catalog: Option<PathBuf>,

    /// Key of the catalog URL to scrape
    #[arg(short, long, default_value = "new_books")]
    url: String,

    /// WebDriver endpoint (e.g., http://localhost:9515)
    #[arg(long, env = "SCRAPER_WEBDRIVER_URL")]
    webdriver: Option<String>,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,

    /// Skip opening product pages for descriptions
    #[arg(long)]
    no_descriptions: bool,

    /// Seconds to wait for product cards to appear
    #[arg(long)]
    timeout: Option<u64>,

    /// Scrape a saved HTML copy of the catalog page instead of a live browser
    #[arg(long, value_name = "HTML")]
    offline: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Configuration errors abort before any browser starts
    let mut config = Config::load(cli.settings.as_deref(), cli.catalog.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(webdriver) = cli.webdriver {
        config.settings.browser.webdriver_url = webdriver;
    }
    if cli.headless {
        config.settings.browser.headless = true;
    }
    if cli.no_descriptions || cli.offline.is_some() {
        config.settings.browser.fetch_descriptions = false;
    }
    if let Some(timeout) = cli.timeout {
        config.settings.browser.page_timeout_secs = timeout;
    }

    let cmd = ScrapeCommand::new(config);

    let report = match &cli.offline {
        Some(path) => {
            let plan = cmd.plan(&cli.url)?;
            let launcher = FixtureLauncher::new(FixtureSite::new().with_file(&plan.url, path)?);
            info!("Offline mode: replaying {}", path.display());
            cmd.run(&launcher, &plan).await
        }
        None => cmd.execute(&cli.url).await?,
    };

    if !report.is_success() {
        info!("Run ended without results");
    }

    Ok(())
}
