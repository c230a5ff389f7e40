//! Configuration management: TOML documents, environment variables and CLI overrides.
//!
//! Two documents are loaded once at startup: application settings (user agent,
//! browser options) and catalog settings (target URLs and element selectors).

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const APP_DIR: &str = "listing-scraper";
const SETTINGS_FILE: &str = "settings.toml";
const CATALOG_FILE: &str = "catalog.toml";

/// Request headers sent by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    pub user_agent: String,
}

/// Browser and timing options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// WebDriver endpoint (chromedriver listens on 9515 by default)
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run Chrome without a window
    #[serde(default)]
    pub headless: bool,

    /// How long to wait for listing cards on the catalog page
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// How long to wait for the description on a product page
    #[serde(default = "default_description_timeout_secs")]
    pub description_timeout_secs: u64,

    /// Delay between two probes of a bounded wait
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Open each product page to read its description
    #[serde(default = "default_fetch_descriptions")]
    pub fetch_descriptions: bool,
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_page_timeout_secs() -> u64 {
    180
}

fn default_description_timeout_secs() -> u64 {
    5
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_fetch_descriptions() -> bool {
    true
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: false,
            page_timeout_secs: default_page_timeout_secs(),
            description_timeout_secs: default_description_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            fetch_descriptions: default_fetch_descriptions(),
        }
    }
}

impl BrowserSettings {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn description_timeout(&self) -> Duration {
        Duration::from_secs(self.description_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Application settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    pub headers: Headers,

    #[serde(default)]
    pub browser: BrowserSettings,
}

impl AppSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        read_toml(path.as_ref())
    }
}

/// Catalog settings document: where to go and what to read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Named catalog pages
    pub urls: BTreeMap<String, String>,

    /// Logical element name to selector (`css:`, `xpath:` or a class name)
    pub elements: BTreeMap<String, String>,

    /// Extra selectors tried in order when the primary one finds nothing
    #[serde(default)]
    pub fallbacks: BTreeMap<String, Vec<String>>,
}

impl CatalogSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        read_toml(path.as_ref())
    }

    /// Looks up a named catalog URL.
    pub fn url(&self, key: &str) -> Result<&str, ConfigError> {
        self.urls.get(key).map(String::as_str).ok_or_else(|| ConfigError::MissingUrl {
            key: key.to_string(),
            available: self.urls.keys().cloned().collect::<Vec<_>>().join(", "),
        })
    }
}

/// Missing or malformed configuration keys.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown catalog URL '{key}' (configured: {available})")]
    MissingUrl { key: String, available: String },

    #[error("Missing required element selector '{0}'")]
    MissingElement(String),

    #[error("Invalid selector for '{key}': {reason}")]
    InvalidSelector { key: String, reason: String },
}

/// Both configuration documents, loaded once and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub settings: AppSettings,
    pub catalog: CatalogSettings,
}

impl Config {
    pub fn new(settings: AppSettings, catalog: CatalogSettings) -> Self {
        Self { settings, catalog }
    }

    /// Loads both documents, searching default locations for paths not given.
    pub fn load(settings_path: Option<&Path>, catalog_path: Option<&Path>) -> Result<Self> {
        let settings_path = locate(settings_path, SETTINGS_FILE)?;
        let catalog_path = locate(catalog_path, CATALOG_FILE)?;

        Ok(Self {
            settings: AppSettings::from_file(settings_path)?,
            catalog: CatalogSettings::from_file(catalog_path)?,
        })
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(agent) = std::env::var("SCRAPER_USER_AGENT") {
            if !agent.trim().is_empty() {
                self.settings.headers.user_agent = agent;
            }
        }

        if let Ok(url) = std::env::var("SCRAPER_WEBDRIVER_URL") {
            if !url.trim().is_empty() {
                self.settings.browser.webdriver_url = url;
            }
        }

        if let Ok(headless) = std::env::var("SCRAPER_HEADLESS") {
            if let Ok(h) = headless.parse() {
                self.settings.browser.headless = h;
            }
        }

        self
    }
}

/// Resolves a config file: explicit path, then `./config/`, then the XDG config directory.
fn locate(explicit: Option<&Path>, file_name: &str) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let local = Path::new("config").join(file_name);
    if local.exists() {
        debug!("Found {} in ./config", file_name);
        return Ok(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let xdg = config_dir.join(APP_DIR).join(file_name);
        if xdg.exists() {
            debug!("Found {} in XDG config directory", file_name);
            return Ok(xdg);
        }
    }

    anyhow::bail!(
        "No {} found. Pass it explicitly or create config/{} or ~/.config/{}/{}",
        file_name,
        file_name,
        APP_DIR,
        file_name
    )
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Loading config from: {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
