//! WebDriver backend using fantoccini (chromedriver by default).

use crate::browser::{BrowserError, Element, Launcher, Locator, Page};
use crate::config::AppSettings;
use async_trait::async_trait;
use fantoccini::elements::Element as WdElement;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

const SCROLL_TO_MIDDLE: &str = "window.scrollTo(0, document.body.scrollHeight/2);";

/// Opens Chrome sessions through a WebDriver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    webdriver_url: String,
    user_agent: String,
    headless: bool,
}

impl WebDriverLauncher {
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            webdriver_url: settings.browser.webdriver_url.clone(),
            user_agent: settings.headers.user_agent.clone(),
            headless: settings.browser.headless,
        }
    }

    /// Chrome capabilities: automation flag hidden, maximized window, configured user agent.
    pub fn capabilities(&self) -> Map<String, Value> {
        let mut args = vec![
            "--disable-blink-features=AutomationControlled".to_string(),
            "--start-maximized".to_string(),
            format!("--user-agent={}", self.user_agent),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }

        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": args, "excludeSwitches": ["enable-automation"] }),
        );
        caps
    }
}

#[async_trait(?Send)]
impl Launcher for WebDriverLauncher {
    type Page = WebDriverPage;

    async fn launch(&self) -> Result<WebDriverPage, BrowserError> {
        debug!("Connecting to WebDriver at {}", self.webdriver_url);

        let client = ClientBuilder::native()
            .capabilities(self.capabilities())
            .connect(&self.webdriver_url)
            .await
            .map_err(|e| BrowserError::SessionCreation(format!("{} ({})", e, self.webdriver_url)))?;

        info!("Browser session started");
        Ok(WebDriverPage { client })
    }
}

/// Owned form of a locator, borrowable as a fantoccini locator.
enum Query {
    Css(String),
    XPath(String),
}

impl Query {
    fn from_locator(locator: &Locator) -> Self {
        match locator {
            Locator::Class(_) | Locator::Css(_) => {
                Query::Css(locator.to_css().unwrap_or_default())
            }
            Locator::XPath(_) | Locator::OwnText { .. } => {
                Query::XPath(locator.to_xpath().unwrap_or_default())
            }
        }
    }

    fn as_wd(&self) -> fantoccini::Locator<'_> {
        match self {
            Query::Css(css) => fantoccini::Locator::Css(css),
            Query::XPath(xpath) => fantoccini::Locator::XPath(xpath),
        }
    }
}

/// A `no such element` reply is an expected miss; anything else is a command failure.
fn lookup_error(locator: &Locator, err: CmdError) -> BrowserError {
    if err.is_no_such_element() {
        BrowserError::NotFound(locator.clone())
    } else {
        BrowserError::Command(err.to_string())
    }
}

fn command_error(err: CmdError) -> BrowserError {
    BrowserError::Command(err.to_string())
}

/// A live browser session.
pub struct WebDriverPage {
    client: Client,
}

#[async_trait(?Send)]
impl Page for WebDriverPage {
    type Element = WebDriverElement;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        debug!("GET {}", url);
        self.client
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation { url: url.to_string(), reason: e.to_string() })
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<WebDriverElement>, BrowserError> {
        let query = Query::from_locator(locator);
        let found =
            self.client.find_all(query.as_wd()).await.map_err(|e| lookup_error(locator, e))?;
        Ok(found.into_iter().map(|inner| WebDriverElement { inner }).collect())
    }

    async fn scroll_to_middle(&self) -> Result<(), BrowserError> {
        self.client.execute(SCROLL_TO_MIDDLE, Vec::new()).await.map(|_| ()).map_err(command_error)
    }

    async fn close(self) -> Result<(), BrowserError> {
        self.client.close().await.map_err(command_error)
    }
}

/// Element handle bound to the session that found it.
#[derive(Debug, Clone)]
pub struct WebDriverElement {
    inner: WdElement,
}

#[async_trait(?Send)]
impl Element for WebDriverElement {
    async fn find(&self, locator: &Locator) -> Result<Self, BrowserError> {
        let query = Query::from_locator(locator);
        let inner = self.inner.find(query.as_wd()).await.map_err(|e| lookup_error(locator, e))?;
        Ok(WebDriverElement { inner })
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self>, BrowserError> {
        let query = Query::from_locator(locator);
        let found =
            self.inner.find_all(query.as_wd()).await.map_err(|e| lookup_error(locator, e))?;
        Ok(found.into_iter().map(|inner| WebDriverElement { inner }).collect())
    }

    async fn text(&self) -> Result<String, BrowserError> {
        let text = self.inner.text().await.map_err(command_error)?;
        Ok(text.trim().to_string())
    }

    /// `href` is read as a DOM property so the browser returns the resolved URL.
    async fn attr(&self, name: &str) -> Result<Option<String>, BrowserError> {
        let value = match name {
            "href" => self.inner.prop(name).await,
            _ => self.inner.attr(name).await,
        };
        value.map_err(command_error)
    }
}
