//! Scrape command: opens the catalog page, waits for listings and logs every record.

use crate::browser::{release, BoundedWait, BrowserError, Launcher, Page, WebDriverLauncher};
use crate::catalog::{DescriptionFetcher, FieldExtractor, ListingRecord, ListingWalker, SelectorMap};
use crate::config::Config;
use anyhow::Result;
use std::fmt;
use tracing::{debug, error, info};

/// Stages of a scrape run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    SessionOpen,
    Navigated,
    Waiting,
    Walking,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "starting the browser",
            RunState::SessionOpen => "navigating",
            RunState::Navigated => "loading the page",
            RunState::Waiting => "waiting for listings",
            RunState::Walking => "walking listings",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a run did. Records are kept for the caller after being logged.
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    /// State the run was in when it failed.
    pub failed_in: Option<RunState>,
    pub failure: Option<BrowserError>,
    pub containers_found: usize,
    pub skipped: usize,
    pub records: Vec<ListingRecord>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            state: RunState::Init,
            failed_in: None,
            failure: None,
            containers_found: 0,
            skipped: 0,
            records: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    fn advance(&mut self, next: RunState) {
        debug!("Run state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: BrowserError) {
        if err.is_timeout() {
            error!("Timed out waiting for page to load: {}", err);
        } else {
            error!("Scrape failed while {}: {}", self.state, err);
        }

        self.failed_in = Some(self.state);
        self.failure = Some(err);
        self.advance(RunState::Failed);
    }
}

/// Everything a run needs, validated before any browser starts.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub url: String,
    pub selectors: SelectorMap,
    pub page_wait: BoundedWait,
    pub description_wait: BoundedWait,
    pub fetch_descriptions: bool,
}

/// Executes a catalog scrape.
pub struct ScrapeCommand {
    config: Config,
}

impl ScrapeCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Resolves the target URL and selectors. Fails on configuration errors only.
    pub fn plan(&self, url_key: &str) -> Result<RunPlan> {
        let browser = &self.config.settings.browser;
        let url = self.config.catalog.url(url_key)?.to_string();
        let selectors = SelectorMap::from_catalog(&self.config.catalog)?;

        Ok(RunPlan {
            url,
            selectors,
            page_wait: BoundedWait::new(browser.page_timeout()).with_interval(browser.poll_interval()),
            description_wait: BoundedWait::new(browser.description_timeout())
                .with_interval(browser.poll_interval()),
            fetch_descriptions: browser.fetch_descriptions,
        })
    }

    /// Scrapes through a real browser.
    pub async fn execute(&self, url_key: &str) -> Result<RunReport> {
        let plan = self.plan(url_key)?;
        let launcher = WebDriverLauncher::new(&self.config.settings);
        Ok(self.run(&launcher, &plan).await)
    }

    /// Scrapes with a provided launcher (offline mode, tests).
    pub async fn execute_with_launcher(
        &self,
        launcher: &impl Launcher,
        url_key: &str,
    ) -> Result<RunReport> {
        let plan = self.plan(url_key)?;
        Ok(self.run(launcher, &plan).await)
    }

    /// Runs the plan. Never fails: errors end in `RunState::Failed` after the
    /// primary session has been released.
    pub async fn run<L: Launcher>(&self, launcher: &L, plan: &RunPlan) -> RunReport {
        let mut report = RunReport::new();
        info!("Scraping {}", plan.url);

        let page = match launcher.launch().await {
            Ok(page) => page,
            Err(e) => {
                report.fail(e);
                return report;
            }
        };
        report.advance(RunState::SessionOpen);

        let outcome = self.drive(launcher, &page, plan, &mut report).await;
        release(page, "primary").await;

        match outcome {
            Ok(()) => {
                report.advance(RunState::Done);
                info!(
                    "Extracted {} of {} products ({} skipped)",
                    report.records.len(),
                    report.containers_found,
                    report.skipped
                );
            }
            Err(e) => report.fail(e),
        }

        report
    }

    async fn drive<L: Launcher>(
        &self,
        launcher: &L,
        page: &L::Page,
        plan: &RunPlan,
        report: &mut RunReport,
    ) -> Result<(), BrowserError> {
        page.goto(&plan.url).await?;
        report.advance(RunState::Navigated);

        report.advance(RunState::Waiting);
        let cards = plan.page_wait.for_elements(page, &plan.selectors.product_card).await?;
        report.containers_found = cards.len();
        info!("Found {} product cells", cards.len());

        report.advance(RunState::Walking);
        let extractor = FieldExtractor::new(&plan.selectors, &plan.url);
        let descriptions = plan
            .fetch_descriptions
            .then(|| DescriptionFetcher::new(launcher, &plan.selectors, plan.description_wait));
        let mut walker = ListingWalker::new(cards, extractor, descriptions);

        while let Some(record) = walker.next().await {
            log_record(&record);
            report.records.push(record);
        }
        report.skipped = walker.skipped();

        Ok(())
    }
}

/// Logs one record as a block of `field: value` lines.
fn log_record(record: &ListingRecord) {
    info!("Product Details:");
    for (field, value) in record.fields() {
        info!("{}: {}", field, value);
    }
    info!("{}", "-".repeat(50));
}
