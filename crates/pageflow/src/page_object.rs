//! Page objects.
//!
//! A page object pairs a [`LocatorRegistry`] with the session it drives and
//! exposes user-level actions. [`BasePage`] carries the shared machinery;
//! concrete pages wrap it and add domain verbs:
//!
//! ```ignore
//! struct CampaignsPage<'s> {
//!     base: BasePage<'s>,
//! }
//!
//! impl<'s> CampaignsPage<'s> {
//!     async fn delete_selected(&self) -> PageflowResult<()> {
//!         let armed = self.base.confirm_dialog("Are you sure you want to delete?");
//!         self.base.click("delete").await?;
//!         armed.confirmed(self.base.timeout()).await?;
//!         Ok(())
//!     }
//! }
//! ```

use std::time::Duration;

use crate::dialog::ArmedDialog;
use crate::driver::{Key, Screenshot};
use crate::locator::{Locator, LocatorRegistry, Selector};
use crate::result::{PageflowError, PageflowResult};
use crate::session::Session;
use crate::wait::{Postcondition, UrlPattern, Waiter};

/// Trait for page objects representing a page or view of the application
pub trait PageObject {
    /// Page name for logging/debugging
    fn page_name(&self) -> &str;

    /// URL (or path pattern) the page lives at
    fn url_pattern(&self) -> &str;

    /// Element registry
    fn locators(&self) -> &LocatorRegistry;
}

/// Something that names an element on a page
pub trait Target {
    /// Turn into a locator, looking names up in `registry`
    fn to_locator(&self, registry: &LocatorRegistry) -> Locator;
}

impl Target for &str {
    fn to_locator(&self, registry: &LocatorRegistry) -> Locator {
        registry.locator(self)
    }
}

impl Target for String {
    fn to_locator(&self, registry: &LocatorRegistry) -> Locator {
        registry.locator(self)
    }
}

impl Target for Locator {
    fn to_locator(&self, _registry: &LocatorRegistry) -> Locator {
        self.clone()
    }
}

impl Target for &Locator {
    fn to_locator(&self, _registry: &LocatorRegistry) -> Locator {
        (*self).clone()
    }
}

/// How a form is submitted after filling a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submit {
    /// Press Enter in the field
    Enter,
    /// Click the named button
    Click(String),
}

/// Shared page-object machinery bound to one session
#[derive(Debug)]
pub struct BasePage<'s> {
    session: &'s Session,
    registry: LocatorRegistry,
    url_pattern: String,
}

impl<'s> BasePage<'s> {
    /// Bind a registry to a session
    #[must_use]
    pub fn new(session: &'s Session, registry: LocatorRegistry, url_pattern: impl Into<String>) -> Self {
        Self {
            session,
            registry,
            url_pattern: url_pattern.into(),
        }
    }

    /// Underlying session
    #[must_use]
    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Per-action timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.session.wait_options().timeout()
    }

    /// Locator for a registered element
    #[must_use]
    pub fn locator(&self, element: &str) -> Locator {
        self.registry.locator(element)
    }

    /// Locator for the `index`-th match of a registered element
    #[must_use]
    pub fn nth(&self, element: &str, index: usize) -> Locator {
        self.registry.locator(element).nth(index)
    }

    /// Locator for `child` inside the `index`-th match of `element`
    #[must_use]
    pub fn nth_child(&self, element: &str, index: usize, child: &str) -> Locator {
        self.nth(element, index)
            .child(child, self.registry.get(child).clone())
    }

    /// Navigate to `target` (relative to the base URL) and wait for it
    pub async fn navigate(&self, target: &str) -> PageflowResult<()> {
        self.session.goto(target).await
    }

    /// Navigate to this page's own URL
    pub async fn open(&self) -> PageflowResult<()> {
        self.session.goto(&self.url_pattern).await
    }

    /// Whether the current URL matches this page
    pub async fn is_at(&self) -> PageflowResult<bool> {
        let pattern = UrlPattern::parse(&self.url_pattern)?;
        Ok(pattern.matches(&self.session.current_url().await?))
    }

    /// Click an element
    pub async fn click(&self, target: impl Target) -> PageflowResult<()> {
        self.session.click(&target.to_locator(&self.registry)).await
    }

    /// Hover over an element
    pub async fn hover(&self, target: impl Target) -> PageflowResult<()> {
        self.session.hover(&target.to_locator(&self.registry)).await
    }

    /// Replace a field's value
    pub async fn fill(&self, target: impl Target, value: &str) -> PageflowResult<()> {
        self.session.fill(&target.to_locator(&self.registry), value).await
    }

    /// Press a key in an element
    pub async fn press(&self, target: impl Target, key: Key) -> PageflowResult<()> {
        self.session.press(&target.to_locator(&self.registry), key).await
    }

    /// Fill `field` then submit with Enter or a button click
    pub async fn fill_and_submit(
        &self,
        field: impl Target,
        value: &str,
        submit: Submit,
    ) -> PageflowResult<()> {
        let field = field.to_locator(&self.registry);
        self.session.fill(&field, value).await?;
        match submit {
            Submit::Enter => self.session.press(&field, Key::Enter).await,
            Submit::Click(button) => self.session.click(&self.registry.locator(&button)).await,
        }
    }

    /// Wait for a post-condition
    pub async fn wait_for(&self, condition: &Postcondition) -> PageflowResult<()> {
        self.session.wait_for(condition).await
    }

    /// Wait until the URL matches `pattern` (see [`UrlPattern::parse`])
    pub async fn wait_for_url(&self, pattern: &str) -> PageflowResult<()> {
        self.session.wait_for_url(&UrlPattern::parse(pattern)?).await
    }

    /// Wait until some match of `target` is visible
    pub async fn wait_visible(&self, target: impl Target) -> PageflowResult<()> {
        self.wait_visibility(target.to_locator(&self.registry), true).await
    }

    /// Wait until no match of `target` is visible
    pub async fn wait_hidden(&self, target: impl Target) -> PageflowResult<()> {
        self.wait_visibility(target.to_locator(&self.registry), false).await
    }

    async fn wait_visibility(&self, locator: Locator, visible: bool) -> PageflowResult<()> {
        let mut waiter = Waiter::new(&self.session.wait_options());
        loop {
            let any_visible = self.session.query(&locator).await?.iter().any(|e| e.visible);
            if any_visible == visible {
                return Ok(());
            }
            if !waiter.tick().await {
                return Err(PageflowError::WaitTimeout {
                    condition: format!(
                        "{} to be {}",
                        locator.describe(),
                        if visible { "visible" } else { "hidden" }
                    ),
                    ms: waiter.timeout_ms(),
                });
            }
        }
    }

    /// Arm interception of the next confirmation dialog.
    ///
    /// Call before the action that opens the dialog, then await
    /// [`ArmedDialog::confirmed`] after it.
    pub fn confirm_dialog(&self, expected: &str) -> ArmedDialog {
        self.session.arm_dialog(expected)
    }

    /// Trimmed text of exactly one element
    pub async fn text_of(&self, target: impl Target) -> PageflowResult<String> {
        let element = self
            .session
            .resolve(&target.to_locator(&self.registry), false)
            .await?;
        Ok(element.text_content.trim().to_string())
    }

    /// Trimmed texts of all current matches, in document order
    pub async fn texts_of(&self, target: impl Target) -> PageflowResult<Vec<String>> {
        Ok(self
            .session
            .query(&target.to_locator(&self.registry))
            .await?
            .into_iter()
            .map(|e| e.text_content.trim().to_string())
            .collect())
    }

    /// Number of current matches
    pub async fn count_of(&self, target: impl Target) -> PageflowResult<usize> {
        Ok(self.session.query(&target.to_locator(&self.registry)).await?.len())
    }

    /// Whether exactly one element carries `class`
    pub async fn has_class(&self, target: impl Target, class: &str) -> PageflowResult<bool> {
        let element = self
            .session
            .resolve(&target.to_locator(&self.registry), false)
            .await?;
        Ok(element.has_class(class))
    }

    /// Whether any current match is visible (no waiting)
    pub async fn is_visible(&self, target: impl Target) -> PageflowResult<bool> {
        Ok(self
            .session
            .query(&target.to_locator(&self.registry))
            .await?
            .iter()
            .any(|e| e.visible))
    }

    /// Current value of a form control
    pub async fn value_of(&self, target: impl Target) -> PageflowResult<Option<String>> {
        let element = self
            .session
            .resolve(&target.to_locator(&self.registry), false)
            .await?;
        Ok(element.value)
    }

    /// Capture the page
    pub async fn screenshot(&self) -> PageflowResult<Screenshot> {
        self.session.screenshot().await
    }
}

impl PageObject for BasePage<'_> {
    fn page_name(&self) -> &str {
        self.registry.page()
    }

    fn url_pattern(&self) -> &str {
        &self.url_pattern
    }

    fn locators(&self) -> &LocatorRegistry {
        &self.registry
    }
}

/// Reusable login form: `username`, `password` and `submit`
#[derive(Debug)]
pub struct LoginPage<'s> {
    base: BasePage<'s>,
    landing: String,
}

impl<'s> LoginPage<'s> {
    /// Default registry for conventional login forms
    pub fn default_registry() -> PageflowResult<LocatorRegistry> {
        LocatorRegistry::builder("login")
            .with("username", Selector::css("input[name='username']"))
            .with("password", Selector::css("input[name='password']"))
            .with("submit", Selector::css("button[type='submit']"))
            .build()
    }

    /// Login form at `path` that lands on `landing` after a successful login
    pub fn new(session: &'s Session, path: &str, landing: &str) -> PageflowResult<Self> {
        Ok(Self::with_registry(session, Self::default_registry()?, path, landing))
    }

    /// Login form with a custom registry (must define `username`, `password`, `submit`)
    #[must_use]
    pub fn with_registry(
        session: &'s Session,
        registry: LocatorRegistry,
        path: &str,
        landing: &str,
    ) -> Self {
        Self {
            base: BasePage::new(session, registry, path),
            landing: landing.to_string(),
        }
    }

    /// Shared page machinery
    #[must_use]
    pub fn base(&self) -> &BasePage<'s> {
        &self.base
    }

    /// Open the login form
    pub async fn open(&self) -> PageflowResult<()> {
        self.base.open().await
    }

    /// Fill credentials, submit and wait for the landing URL
    pub async fn login(&self, username: &str, password: &str) -> PageflowResult<()> {
        tracing::debug!(user = username, "login");
        self.base.fill("username", username).await?;
        self.base
            .fill_and_submit("password", password, Submit::Click("submit".into()))
            .await?;
        self.base.wait_for_url(&self.landing).await
    }
}

impl PageObject for LoginPage<'_> {
    fn page_name(&self) -> &str {
        self.base.page_name()
    }

    fn url_pattern(&self) -> &str {
        self.base.url_pattern()
    }

    fn locators(&self) -> &LocatorRegistry {
        self.base.locators()
    }
}
