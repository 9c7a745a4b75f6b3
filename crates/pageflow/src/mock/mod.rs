//! In-process browser driver.
//!
//! [`MockDriver`] drives a [`VirtualApp`]: a simulated page that renders a flat
//! list of DOM-like [`VirtualNode`]s and reacts to events. The driver resolves
//! selectors against the rendered nodes, so page objects run unchanged against
//! the mock and against a real browser.

mod css;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::HarnessConfig;
use crate::dialog::DialogHandler;
use crate::driver::{BrowserDriver, DriverFactory, ElementHandle, Key, Screenshot};
use crate::locator::Selector;
use crate::result::{PageflowError, PageflowResult};

use css::{CssSelector, Dom};

/// One node of the simulated DOM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualNode {
    /// Stable node id, unique within one render
    pub handle: String,
    /// Tag name
    pub tag: String,
    /// Parent handle (`None` for roots)
    pub parent: Option<String>,
    /// Attributes other than `class`
    pub attrs: BTreeMap<String, String>,
    /// CSS classes
    pub classes: Vec<String>,
    /// Own text (not including children)
    pub text: String,
    /// Form control value
    pub value: Option<String>,
    /// Rendered visible
    pub visible: bool,
    /// Accepts input
    pub enabled: bool,
}

impl VirtualNode {
    /// Create a visible, enabled node
    #[must_use]
    pub fn new(handle: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            tag: tag.into(),
            parent: None,
            attrs: BTreeMap::new(),
            classes: Vec::new(),
            text: String::new(),
            value: None,
            visible: true,
            enabled: true,
        }
    }

    /// Set the parent
    #[must_use]
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Add a class
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set `data-testid`
    #[must_use]
    pub fn test_id(self, id: impl Into<String>) -> Self {
        self.attr("data-testid", id)
    }

    /// Set own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the control value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Render hidden
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Render disabled
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Attribute lookup including the synthetic `class` and `value`
    #[must_use]
    pub fn attr_value(&self, name: &str) -> Option<String> {
        match name {
            "class" if !self.classes.is_empty() => Some(self.classes.join(" ")),
            "value" if self.value.is_some() => self.value.clone(),
            _ => self.attrs.get(name).cloned(),
        }
    }
}

/// User input delivered to a virtual app
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Click on the node
    Click,
    /// Pointer over the node
    Hover,
    /// Replace the value of a control
    Fill(String),
    /// Key pressed while the node has focus
    Press(Key),
}

/// A simulated page
pub trait VirtualApp: Send {
    /// Load `url`
    fn navigate(&mut self, url: &str) -> PageflowResult<()>;

    /// Current URL
    fn current_url(&self) -> String;

    /// Current DOM in document order
    fn render(&self) -> Vec<VirtualNode>;

    /// React to input on the node `handle`; native dialogs go through `dialogs`
    fn dispatch(
        &mut self,
        handle: &str,
        event: AppEvent,
        dialogs: &DialogHandler,
    ) -> PageflowResult<()>;

    /// Advance simulated time by one observation (each query or URL read)
    fn tick(&mut self) {}
}

/// Shared call log, readable after the driver has been moved into a session
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Driver over a [`VirtualApp`]
pub struct MockDriver {
    app: Mutex<Box<dyn VirtualApp>>,
    dialogs: DialogHandler,
    history: CallLog,
    closed: bool,
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver")
            .field("calls", &self.history().len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl MockDriver {
    /// Wrap a virtual app
    #[must_use]
    pub fn new(app: Box<dyn VirtualApp>) -> Self {
        Self {
            app: Mutex::new(app),
            dialogs: DialogHandler::new(),
            history: Arc::new(Mutex::new(Vec::new())),
            closed: false,
        }
    }

    /// Handle on the call log
    #[must_use]
    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.history)
    }

    /// Snapshot of recorded calls
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Whether a call starting with `method` was recorded
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.history().iter().any(|c| c.starts_with(method))
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn record(&self, call: String) {
        if let Ok(mut h) = self.history.lock() {
            h.push(call);
        }
    }

    fn app(&self) -> PageflowResult<MutexGuard<'_, Box<dyn VirtualApp>>> {
        if self.closed {
            return Err(PageflowError::driver("session is closed"));
        }
        self.app
            .lock()
            .map_err(|_| PageflowError::driver("virtual app lock poisoned"))
    }

    /// Deliver `event` to a live, actionable element
    fn dispatch(&self, element: &ElementHandle, event: AppEvent) -> PageflowResult<()> {
        let mut app = self.app()?;
        let nodes = app.render();
        let dom = Dom::new(&nodes);
        let index = dom.index_of(&element.id).ok_or_else(|| {
            PageflowError::driver(format!("element {} is detached from the DOM", element.id))
        })?;
        if !dom.is_visible(index) {
            return Err(PageflowError::driver(format!(
                "element {} is not visible",
                element.id
            )));
        }
        if !nodes[index].enabled && !matches!(event, AppEvent::Hover) {
            return Err(PageflowError::driver(format!(
                "element {} is disabled",
                element.id
            )));
        }
        app.dispatch(&element.id, event, &self.dialogs)
    }
}

fn to_handle(dom: &Dom<'_>, index: usize) -> ElementHandle {
    let node = &dom.nodes[index];
    ElementHandle {
        id: node.handle.clone(),
        tag_name: node.tag.to_ascii_lowercase(),
        text_content: dom.text_content(index),
        visible: dom.is_visible(index),
        enabled: node.enabled,
        classes: node.classes.clone(),
        value: node.value.clone(),
    }
}

fn matches(selector: &Selector, compiled: Option<&CssSelector>, dom: &Dom<'_>, index: usize) -> bool {
    let node = &dom.nodes[index];
    match selector {
        Selector::Css(_) => compiled.is_some_and(|c| c.matches(dom, index)),
        Selector::CssWithText { text, .. } => {
            compiled.is_some_and(|c| c.matches(dom, index)) && dom.text_content(index).contains(text.as_str())
        }
        Selector::Text(text) => node.text.trim().contains(text.as_str()),
        Selector::TestId(id) => node.attr_value("data-testid").as_deref() == Some(id.as_str()),
        Selector::Attribute { name, value } => node.attr_value(name).as_deref() == Some(value.as_str()),
        Selector::XPath(_) => false,
    }
}

fn render_dump(nodes: &[VirtualNode], url: &str) -> String {
    let dom = Dom::new(nodes);
    let mut out = format!("# {url}\n");
    for (i, node) in nodes.iter().enumerate() {
        let mut depth = 0;
        let mut current = dom.parent(i);
        while let Some(p) = current {
            depth += 1;
            current = dom.parent(p);
        }
        out.push_str(&"  ".repeat(depth));
        out.push('<');
        out.push_str(&node.tag);
        if !node.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", node.classes.join(" ")));
        }
        for (k, v) in &node.attrs {
            out.push_str(&format!(" {k}=\"{v}\""));
        }
        if let Some(v) = &node.value {
            out.push_str(&format!(" value=\"{v}\""));
        }
        if !dom.is_visible(i) {
            out.push_str(" hidden");
        }
        out.push('>');
        out.push_str(&node.text);
        out.push('\n');
    }
    out
}

#[async_trait]
impl BrowserDriver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn goto(&mut self, url: &str) -> PageflowResult<()> {
        self.record(format!("goto:{url}"));
        self.app()?.navigate(url)
    }

    async fn current_url(&self) -> PageflowResult<String> {
        let mut app = self.app()?;
        app.tick();
        Ok(app.current_url())
    }

    async fn query(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> PageflowResult<Vec<ElementHandle>> {
        let compiled = match selector {
            Selector::Css(css) | Selector::CssWithText { css, .. } => Some(CssSelector::parse(css)?),
            Selector::XPath(_) => {
                return Err(PageflowError::driver(
                    "xpath selectors are not supported by the mock driver",
                ))
            }
            _ => None,
        };
        let nodes = {
            let mut app = self.app()?;
            app.tick();
            app.render()
        };
        let dom = Dom::new(&nodes);
        let scope_index = match scope {
            Some(el) => Some(dom.index_of(&el.id).ok_or_else(|| {
                PageflowError::driver(format!("scope element {} is detached from the DOM", el.id))
            })?),
            None => None,
        };
        Ok((0..nodes.len())
            .filter(|&i| scope_index.map_or(true, |s| dom.is_descendant(i, s)))
            .filter(|&i| matches(selector, compiled.as_ref(), &dom, i))
            .map(|i| to_handle(&dom, i))
            .collect())
    }

    async fn click(&mut self, element: &ElementHandle) -> PageflowResult<()> {
        self.record(format!("click:{}", element.id));
        self.dispatch(element, AppEvent::Click)
    }

    async fn hover(&mut self, element: &ElementHandle) -> PageflowResult<()> {
        self.record(format!("hover:{}", element.id));
        self.dispatch(element, AppEvent::Hover)
    }

    async fn fill(&mut self, element: &ElementHandle, value: &str) -> PageflowResult<()> {
        self.record(format!("fill:{}={value}", element.id));
        self.dispatch(element, AppEvent::Fill(value.to_string()))
    }

    async fn press(&mut self, element: &ElementHandle, key: Key) -> PageflowResult<()> {
        self.record(format!("press:{}:{}", element.id, key.dom_key()));
        self.dispatch(element, AppEvent::Press(key))
    }

    async fn screenshot(&self) -> PageflowResult<Screenshot> {
        self.record("screenshot".to_string());
        let app = self.app()?;
        Ok(Screenshot::text(render_dump(&app.render(), &app.current_url())))
    }

    fn dialogs(&self) -> &DialogHandler {
        &self.dialogs
    }

    async fn close(&mut self) -> PageflowResult<()> {
        self.record("close".to_string());
        self.closed = true;
        Ok(())
    }
}

type AppBuilder = dyn Fn() -> Box<dyn VirtualApp> + Send + Sync;

/// Launches a [`MockDriver`] over a fresh app per session
#[derive(Clone)]
pub struct MockDriverFactory {
    name: String,
    build: Arc<AppBuilder>,
}

impl std::fmt::Debug for MockDriverFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriverFactory")
            .field("name", &self.name)
            .finish()
    }
}

impl MockDriverFactory {
    /// Factory calling `build` for every launch
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn() -> Box<dyn VirtualApp> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(build),
        }
    }
}

#[async_trait]
impl DriverFactory for MockDriverFactory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn launch(&self, config: &HarnessConfig) -> PageflowResult<Box<dyn BrowserDriver>> {
        tracing::debug!(factory = %self.name, headless = config.headless, "launching mock session");
        Ok(Box::new(MockDriver::new((self.build)())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dialog::Dialog;

    /// A counter page: a button increments, a reset button asks for confirmation.
    struct Counter {
        url: String,
        count: u32,
        ticks: u32,
    }

    impl Counter {
        fn boxed() -> Box<dyn VirtualApp> {
            Box::new(Self {
                url: "about:blank".into(),
                count: 0,
                ticks: 0,
            })
        }
    }

    impl VirtualApp for Counter {
        fn navigate(&mut self, url: &str) -> PageflowResult<()> {
            self.url = url.to_string();
            Ok(())
        }

        fn current_url(&self) -> String {
            self.url.clone()
        }

        fn render(&self) -> Vec<VirtualNode> {
            let mut nodes = vec![
                VirtualNode::new("root", "div").id("counter"),
                VirtualNode::new("value", "span")
                    .parent("root")
                    .test_id("count")
                    .text(self.count.to_string()),
                VirtualNode::new("inc", "button").parent("root").text("Increment"),
                VirtualNode::new("reset", "button").parent("root").text("Reset"),
                VirtualNode::new("locked", "button").parent("root").text("Locked").disabled(),
            ];
            if self.ticks >= 3 {
                nodes.push(VirtualNode::new("late", "p").parent("root").text("Loaded"));
            }
            nodes
        }

        fn dispatch(
            &mut self,
            handle: &str,
            event: AppEvent,
            dialogs: &DialogHandler,
        ) -> PageflowResult<()> {
            match (handle, event) {
                ("inc", AppEvent::Click) => self.count += 1,
                ("reset", AppEvent::Click) => {
                    if dialogs.handle(Dialog::confirm("Reset counter?")).action().is_accept() {
                        self.count = 0;
                    }
                }
                _ => {}
            }
            Ok(())
        }

        fn tick(&mut self) {
            self.ticks += 1;
        }
    }

    async fn one(driver: &MockDriver, selector: &Selector) -> ElementHandle {
        let mut found = driver.query(selector, None).await.unwrap();
        assert_eq!(found.len(), 1, "{selector}");
        found.remove(0)
    }

    mod query_tests {
        use super::*;

        #[tokio::test]
        async fn test_query_by_text_and_testid() {
            let driver = MockDriver::new(Counter::boxed());
            let inc = one(&driver, &Selector::text("Increment")).await;
            assert_eq!(inc.tag_name, "button");
            let count = one(&driver, &Selector::test_id("count")).await;
            assert_eq!(count.text_content, "0");
        }

        #[tokio::test]
        async fn test_query_css_with_text() {
            let driver = MockDriver::new(Counter::boxed());
            let found = driver
                .query(&Selector::css("button").with_text("Re"), None)
                .await
                .unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].id, "reset");
        }

        #[tokio::test]
        async fn test_scoped_query() {
            let driver = MockDriver::new(Counter::boxed());
            let root = one(&driver, &Selector::css("#counter")).await;
            let buttons = driver.query(&Selector::css("button"), Some(&root)).await.unwrap();
            assert_eq!(buttons.len(), 3);
            let inc = one(&driver, &Selector::text("Increment")).await;
            assert!(driver.query(&Selector::css("button"), Some(&inc)).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_xpath_unsupported() {
            let driver = MockDriver::new(Counter::boxed());
            let err = driver.query(&Selector::xpath("//button"), None).await.unwrap_err();
            assert_eq!(err.kind(), "driver");
        }

        #[tokio::test]
        async fn test_tick_advances_app() {
            let driver = MockDriver::new(Counter::boxed());
            let sel = Selector::text("Loaded");
            assert!(driver.query(&sel, None).await.unwrap().is_empty());
            driver.query(&sel, None).await.unwrap();
            assert_eq!(driver.query(&sel, None).await.unwrap().len(), 1);
        }
    }

    mod action_tests {
        use super::*;

        #[tokio::test]
        async fn test_click_updates_state() {
            let mut driver = MockDriver::new(Counter::boxed());
            let inc = one(&driver, &Selector::text("Increment")).await;
            driver.click(&inc).await.unwrap();
            driver.click(&inc).await.unwrap();
            let count = one(&driver, &Selector::test_id("count")).await;
            assert_eq!(count.text_content, "2");
            assert!(driver.was_called("click:inc"));
        }

        #[tokio::test]
        async fn test_click_disabled_fails() {
            let mut driver = MockDriver::new(Counter::boxed());
            let locked = one(&driver, &Selector::text("Locked")).await;
            assert!(!locked.enabled);
            let err = driver.click(&locked).await.unwrap_err();
            assert!(err.to_string().contains("disabled"));
        }

        #[tokio::test]
        async fn test_click_detached_fails() {
            let mut driver = MockDriver::new(Counter::boxed());
            let ghost = ElementHandle::new("ghost", "button");
            let err = driver.click(&ghost).await.unwrap_err();
            assert!(err.to_string().contains("detached"));
        }

        #[tokio::test]
        async fn test_dialog_routed_through_handler() {
            let mut driver = MockDriver::new(Counter::boxed());
            let inc = one(&driver, &Selector::text("Increment")).await;
            driver.click(&inc).await.unwrap();
            let reset = one(&driver, &Selector::text("Reset")).await;

            driver.click(&reset).await.unwrap();
            assert_eq!(one(&driver, &Selector::test_id("count")).await.text_content, "1");

            let armed = driver.dialogs().arm("Reset");
            driver.click(&reset).await.unwrap();
            armed
                .confirmed(std::time::Duration::from_millis(50))
                .await
                .unwrap();
            assert_eq!(one(&driver, &Selector::test_id("count")).await.text_content, "0");
        }

        #[tokio::test]
        async fn test_close_blocks_further_use() {
            let mut driver = MockDriver::new(Counter::boxed());
            driver.close().await.unwrap();
            assert!(driver.is_closed());
            assert!(driver.current_url().await.is_err());
        }

        #[tokio::test]
        async fn test_screenshot_is_text_dump() {
            let mut driver = MockDriver::new(Counter::boxed());
            driver.goto("http://localhost:3000/").await.unwrap();
            let shot = driver.screenshot().await.unwrap();
            let text = String::from_utf8(shot.data).unwrap();
            assert!(text.starts_with("# http://localhost:3000/"));
            assert!(text.contains("  <span data-testid=\"count\">0"));
        }
    }

    mod factory_tests {
        use super::*;

        #[tokio::test]
        async fn test_factory_launches_fresh_apps() {
            let factory = MockDriverFactory::new("counter", Counter::boxed);
            let config = HarnessConfig::default();
            let mut first = factory.launch(&config).await.unwrap();
            first.goto("http://a/").await.unwrap();
            let second = factory.launch(&config).await.unwrap();
            assert_eq!(second.current_url().await.unwrap(), "about:blank");
            assert_eq!(factory.name(), "counter");
        }
    }
}
