//! Bounded polling wait for asynchronously rendered content.

use crate::browser::{BrowserError, Locator, Page};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::trace;

/// Default delay between two probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls a probe at a fixed interval until it yields a value or the timeout elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedWait {
    timeout: Duration,
    interval: Duration,
}

impl BoundedWait {
    /// Creates a wait with the default poll interval.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, interval: DEFAULT_POLL_INTERVAL }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs `probe` until it returns `Some`.
    ///
    /// The last probe runs at the deadline, so a timeout is never reported
    /// before `timeout` has elapsed. A timeout too large to represent as an
    /// instant means no deadline.
    pub async fn until<T, F, Fut>(&self, what: &str, mut probe: F) -> Result<T, BrowserError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let start = Instant::now();
        let deadline = start.checked_add(self.timeout);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if let Some(value) = probe().await {
                trace!("{} ready after {} probe(s)", what, attempts);
                return Ok(value);
            }

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                return Err(BrowserError::Timeout {
                    what: what.to_string(),
                    waited: now.duration_since(start),
                });
            }

            match [now.checked_add(self.interval), deadline].into_iter().flatten().min() {
                Some(wake) => sleep_until(wake).await,
                None => sleep(self.interval).await,
            }
        }
    }

    /// Waits until at least one element matches `locator` in the page.
    pub async fn for_elements<P: Page>(
        &self,
        page: &P,
        locator: &Locator,
    ) -> Result<Vec<P::Element>, BrowserError> {
        self.until(&locator.to_string(), move || async move {
            match page.find_all(locator).await {
                Ok(found) if !found.is_empty() => Some(found),
                Ok(_) => None,
                Err(e) => {
                    trace!("Probe for {} failed: {}", locator, e);
                    None
                }
            }
        })
        .await
    }
}
