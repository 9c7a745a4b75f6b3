//! A live browser session bound to one scenario attempt.
//!
//! The session owns the driver and turns locators into actions with the
//! resolution rules every page object relies on:
//!
//! - zero matches: keep polling, `ElementNotFound` at the deadline
//! - more than one match: `AmbiguousSelector` immediately
//! - one match that is hidden or disabled: keep polling, `ElementNotReady`
//!   at the deadline

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::dialog::{ArmedDialog, DialogHandler};
use crate::driver::{BrowserDriver, ElementHandle, Key, Screenshot};
use crate::locator::Locator;
use crate::result::{PageflowError, PageflowResult};
use crate::snapshot::{SnapshotConfig, SnapshotOutcome};
use crate::wait::{wait_until, Postcondition, UrlPattern, WaitOptions, Waiter};

/// Browser session shared by the page objects of one scenario
pub struct Session {
    id: Uuid,
    driver_name: String,
    driver: Mutex<Box<dyn BrowserDriver>>,
    dialogs: DialogHandler,
    base_url: String,
    wait: WaitOptions,
    snapshots: SnapshotConfig,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("driver", &self.driver_name)
            .field("base_url", &self.base_url)
            .field("wait", &self.wait)
            .finish()
    }
}

impl Session {
    /// Bind a driver using the harness timeouts and base URL
    #[must_use]
    pub fn new(driver: Box<dyn BrowserDriver>, config: &HarnessConfig) -> Self {
        Self::with_options(driver, config.base_url.clone(), config.wait_options())
            .with_snapshots(config.snapshot_config())
    }

    /// Bind a driver with explicit options
    #[must_use]
    pub fn with_options(
        driver: Box<dyn BrowserDriver>,
        base_url: impl Into<String>,
        wait: WaitOptions,
    ) -> Self {
        let dialogs = driver.dialogs().clone();
        Self {
            id: Uuid::new_v4(),
            driver_name: driver.name().to_string(),
            driver: Mutex::new(driver),
            dialogs,
            base_url: base_url.into(),
            wait,
            snapshots: SnapshotConfig::default(),
        }
    }

    /// Replace the snapshot settings
    #[must_use]
    pub fn with_snapshots(mut self, snapshots: SnapshotConfig) -> Self {
        self.snapshots = snapshots;
        self
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Base URL for relative targets
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-action wait options
    #[must_use]
    pub fn wait_options(&self) -> WaitOptions {
        self.wait
    }

    /// Resolve `target` against the base URL unless it is already absolute
    #[must_use]
    pub fn resolve_url(&self, target: &str) -> String {
        if target.contains("://") || target.starts_with("about:") {
            return target.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            target.trim_start_matches('/')
        )
    }

    /// Navigate and wait until the browser reports the target URL
    pub async fn goto(&self, target: &str) -> PageflowResult<()> {
        let url = self.resolve_url(target);
        debug!(session = %self.id, url = %url, "navigate");
        self.driver.lock().await.goto(&url).await?;
        let pattern = if target.starts_with('/') {
            let end = target.find(['?', '#']).unwrap_or(target.len());
            UrlPattern::Path(target[..end].to_string())
        } else {
            UrlPattern::Exact(url)
        };
        self.wait_for_url(&pattern).await
    }

    /// Current URL
    pub async fn current_url(&self) -> PageflowResult<String> {
        self.driver.lock().await.current_url().await
    }

    /// Wait until the URL matches (→ `NavigationTimeout`)
    pub async fn wait_for_url(&self, pattern: &UrlPattern) -> PageflowResult<()> {
        let mut waiter = Waiter::new(&self.wait);
        loop {
            let actual = self.current_url().await?;
            if pattern.matches(&actual) {
                return Ok(());
            }
            if !waiter.tick().await {
                return Err(PageflowError::NavigationTimeout {
                    url: pattern.to_string(),
                    actual,
                    ms: waiter.timeout_ms(),
                });
            }
        }
    }

    /// All current matches for a locator, without waiting
    pub async fn query(&self, locator: &Locator) -> PageflowResult<Vec<ElementHandle>> {
        let driver = self.driver.lock().await;
        let mut found = driver.query(locator.selector(), None).await?;
        if let Some(index) = locator.index() {
            found = found.into_iter().nth(index).into_iter().collect();
        }
        if let Some(child) = locator.child_selector() {
            let mut children = Vec::new();
            for parent in &found {
                children.extend(driver.query(child, Some(parent)).await?);
            }
            found = children;
        }
        Ok(found)
    }

    /// Resolve to exactly one element, optionally waiting until it is
    /// visible and enabled
    pub async fn resolve(&self, locator: &Locator, actionable: bool) -> PageflowResult<ElementHandle> {
        let mut waiter = Waiter::new(&self.wait);
        loop {
            let mut found = self.query(locator).await?;
            let not_ready = match found.len() {
                0 => None,
                1 => {
                    let element = found.remove(0);
                    match element.not_ready_reason() {
                        Some(reason) if actionable => Some(reason),
                        _ => return Ok(element),
                    }
                }
                count => {
                    return Err(PageflowError::AmbiguousSelector {
                        selector: locator.describe(),
                        count,
                    })
                }
            };
            if !waiter.tick().await {
                return Err(match not_ready {
                    Some(reason) => PageflowError::ElementNotReady {
                        selector: locator.describe(),
                        reason: reason.to_string(),
                        ms: waiter.timeout_ms(),
                    },
                    None => PageflowError::not_found(locator.describe()),
                });
            }
        }
    }

    /// Click an element
    pub async fn click(&self, locator: &Locator) -> PageflowResult<()> {
        let element = self.resolve(locator, true).await?;
        debug!(session = %self.id, target = %locator, "click");
        self.driver.lock().await.click(&element).await
    }

    /// Hover over an element
    pub async fn hover(&self, locator: &Locator) -> PageflowResult<()> {
        let element = self.resolve(locator, true).await?;
        debug!(session = %self.id, target = %locator, "hover");
        self.driver.lock().await.hover(&element).await
    }

    /// Replace the value of a form control
    pub async fn fill(&self, locator: &Locator, value: &str) -> PageflowResult<()> {
        let element = self.resolve(locator, true).await?;
        debug!(session = %self.id, target = %locator, len = value.len(), "fill");
        self.driver.lock().await.fill(&element, value).await
    }

    /// Press a key on an element
    pub async fn press(&self, locator: &Locator, key: Key) -> PageflowResult<()> {
        let element = self.resolve(locator, true).await?;
        debug!(session = %self.id, target = %locator, key = key.dom_key(), "press");
        self.driver.lock().await.press(&element, key).await
    }

    /// Wait for a post-condition with the session timeout (→ `WaitTimeout`)
    pub async fn wait_for(&self, condition: &Postcondition) -> PageflowResult<()> {
        self.wait_for_with(condition, &self.wait).await
    }

    /// Wait for a post-condition with explicit options
    pub async fn wait_for_with(
        &self,
        condition: &Postcondition,
        options: &WaitOptions,
    ) -> PageflowResult<()> {
        debug!(session = %self.id, condition = %condition, "wait");
        let driver = self.driver.lock().await;
        wait_until(driver.as_ref(), condition, options).await
    }

    /// Dialog registry of the underlying driver
    #[must_use]
    pub fn dialogs(&self) -> &DialogHandler {
        &self.dialogs
    }

    /// Arm interception of the next confirmation dialog
    pub fn arm_dialog(&self, expected: impl Into<String>) -> ArmedDialog {
        self.dialogs.arm(expected)
    }

    /// Capture the page
    pub async fn screenshot(&self) -> PageflowResult<Screenshot> {
        self.driver.lock().await.screenshot().await
    }

    /// Capture the page and check it against the baseline called `name`
    pub async fn expect_screenshot(&self, name: &str) -> PageflowResult<SnapshotOutcome> {
        let shot = self.screenshot().await?;
        self.snapshots.check(name, &shot)
    }

    /// Close the driver
    pub async fn close(&self) -> PageflowResult<()> {
        debug!(session = %self.id, "close");
        self.driver.lock().await.close().await
    }
}
