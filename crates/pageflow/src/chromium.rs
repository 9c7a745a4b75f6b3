//! Real browser driver over the Chrome DevTools Protocol.
//!
//! Compiled with the `browser` feature. Element resolution runs as a script
//! in the page: every match is stamped with a `data-pageflow-id` attribute
//! that later actions use to find the same node again. Native dialogs are
//! answered by a background task listening for
//! `Page.javascriptDialogOpening`.

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, DialogType as CdpDialogType,
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::HarnessConfig;
use crate::dialog::{Dialog, DialogAction, DialogHandler, DialogType};
use crate::driver::{BrowserDriver, DriverFactory, ElementHandle, Key, Screenshot};
use crate::locator::{js_str, Selector};
use crate::result::{PageflowError, PageflowResult};

const ID_ATTR: &str = "data-pageflow-id";

fn lookup(id: &str) -> String {
    format!("document.querySelector({})", js_str(&format!("[{ID_ATTR}=\"{id}\"]")))
}

/// Script returning matches as `ElementHandle` objects, or `null` when the
/// scope element is gone
fn query_script(selector: &Selector, scope: Option<&ElementHandle>) -> String {
    let scope_expr = scope.map_or_else(|| "document".to_string(), |el| lookup(&el.id));
    format!(
        "(() => {{ const scope = {scope_expr}; if (!scope) return null; \
         return {query}.map(el => {{ \
           if (!el.getAttribute('{ID_ATTR}')) {{ \
             window.__pageflowSeq = (window.__pageflowSeq || 0) + 1; \
             el.setAttribute('{ID_ATTR}', 'pf-' + window.__pageflowSeq); }} \
           const style = window.getComputedStyle(el); const rect = el.getBoundingClientRect(); \
           return {{ id: el.getAttribute('{ID_ATTR}'), tag_name: el.tagName.toLowerCase(), \
             text_content: el.textContent || '', \
             visible: style.display !== 'none' && style.visibility !== 'hidden' && (rect.width > 0 || rect.height > 0), \
             enabled: !el.disabled, classes: Array.from(el.classList), \
             value: (typeof el.value === 'string') ? el.value : null }}; }}); }})()",
        query = selector.to_query_all("scope"),
    )
}

/// Script running `body` with `el` bound, returning `false` if detached
fn action_script(id: &str, body: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; {body} return true; }})()",
        lookup(id)
    )
}

fn fill_body(value: &str) -> String {
    format!(
        "el.focus(); \
         const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
         const desc = Object.getOwnPropertyDescriptor(proto, 'value'); \
         if (desc && desc.set) {{ desc.set.call(el, {v}); }} else {{ el.value = {v}; }} \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }}));",
        v = js_str(value)
    )
}

fn press_body(key: Key) -> String {
    let key = js_str(key.dom_key());
    format!(
        "el.focus(); for (const type of ['keydown', 'keypress', 'keyup']) {{ \
         el.dispatchEvent(new KeyboardEvent(type, {{ key: {key}, bubbles: true, cancelable: true }})); }}"
    )
}

const CLICK_BODY: &str = "el.scrollIntoView({ block: 'center' }); el.click();";
const HOVER_BODY: &str = "el.scrollIntoView({ block: 'center' }); \
    for (const type of ['mouseover', 'mouseenter', 'mousemove']) { \
    el.dispatchEvent(new MouseEvent(type, { bubbles: true })); }";

fn cdp_err(context: &str, err: impl std::fmt::Display) -> PageflowError {
    PageflowError::driver(format!("{context}: {err}"))
}

fn dialog_kind(kind: &CdpDialogType) -> DialogType {
    match kind {
        CdpDialogType::Alert => DialogType::Alert,
        CdpDialogType::Confirm => DialogType::Confirm,
        CdpDialogType::Prompt => DialogType::Prompt,
        CdpDialogType::Beforeunload => DialogType::BeforeUnload,
    }
}

/// Answer every native dialog through `dialogs`
async fn answer_dialogs(page: CdpPage, dialogs: DialogHandler) {
    let mut events = match page.event_listener::<EventJavascriptDialogOpening>().await {
        Ok(events) => events,
        Err(err) => {
            warn!(error = %err, "cannot listen for dialogs");
            return;
        }
    };
    while let Some(event) = events.next().await {
        let kind = dialog_kind(&event.r#type);
        let dialog = if kind == DialogType::Prompt {
            Dialog::prompt(event.message.clone(), event.default_prompt.clone())
        } else {
            Dialog::new(kind, event.message.clone())
        };
        let handled = dialogs.handle(dialog);
        debug!(kind = %kind, action = ?handled.action(), "dialog");
        let mut builder = HandleJavaScriptDialogParams::builder().accept(handled.action().is_accept());
        if let DialogAction::AcceptWith(text) = handled.action() {
            builder = builder.prompt_text(text.clone());
        }
        match builder.build() {
            Ok(params) => {
                if let Err(err) = page.execute(params).await {
                    warn!(error = %err, "failed to answer dialog");
                }
            }
            Err(err) => warn!(error = %err, "invalid dialog response"),
        }
    }
}

/// Chromium session driven over CDP
pub struct ChromiumDriver {
    browser: Mutex<CdpBrowser>,
    page: Mutex<CdpPage>,
    dialogs: DialogHandler,
    handler: JoinHandle<()>,
    dialog_task: JoinHandle<()>,
    closed: bool,
}

impl std::fmt::Debug for ChromiumDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumDriver")
            .field("dialogs", &self.dialogs)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl ChromiumDriver {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> PageflowResult<T> {
        let page = self.page.lock().await;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| cdp_err("script evaluation failed", e))?;
        result
            .into_value()
            .map_err(|e| cdp_err("unexpected script result", e))
    }

    async fn act(&self, element: &ElementHandle, body: &str) -> PageflowResult<()> {
        let attached: bool = self.eval(action_script(&element.id, body)).await?;
        if attached {
            Ok(())
        } else {
            Err(PageflowError::driver(format!(
                "element {} is detached from the DOM",
                element.id
            )))
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn goto(&mut self, url: &str) -> PageflowResult<()> {
        let page = self.page.lock().await;
        page.goto(url)
            .await
            .map_err(|e| cdp_err(&format!("navigation to {url} failed"), e))?;
        Ok(())
    }

    async fn current_url(&self) -> PageflowResult<String> {
        let page = self.page.lock().await;
        let url = page.url().await.map_err(|e| cdp_err("cannot read url", e))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn query(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> PageflowResult<Vec<ElementHandle>> {
        let found: Option<Vec<ElementHandle>> = self.eval(query_script(selector, scope)).await?;
        match (found, scope) {
            (Some(found), _) => Ok(found),
            (None, Some(el)) => Err(PageflowError::driver(format!(
                "scope element {} is detached from the DOM",
                el.id
            ))),
            (None, None) => Ok(Vec::new()),
        }
    }

    async fn click(&mut self, element: &ElementHandle) -> PageflowResult<()> {
        self.act(element, CLICK_BODY).await
    }

    async fn hover(&mut self, element: &ElementHandle) -> PageflowResult<()> {
        self.act(element, HOVER_BODY).await
    }

    async fn fill(&mut self, element: &ElementHandle, value: &str) -> PageflowResult<()> {
        self.act(element, &fill_body(value)).await
    }

    async fn press(&mut self, element: &ElementHandle, key: Key) -> PageflowResult<()> {
        self.act(element, &press_body(key)).await
    }

    async fn screenshot(&self) -> PageflowResult<Screenshot> {
        let page = self.page.lock().await;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = page
            .execute(params)
            .await
            .map_err(|e| cdp_err("screenshot failed", e))?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| cdp_err("screenshot decode failed", e))?;
        Ok(Screenshot::png(data))
    }

    fn dialogs(&self) -> &DialogHandler {
        &self.dialogs
    }

    async fn close(&mut self) -> PageflowResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.dialog_task.abort();
        let result = self.browser.lock().await.close().await;
        self.handler.abort();
        result.map(drop).map_err(|e| cdp_err("browser close failed", e))
    }
}

/// Launches one Chromium per session
#[derive(Debug, Clone, Default)]
pub struct ChromiumDriverFactory {
    executable: Option<PathBuf>,
    no_sandbox: bool,
}

impl ChromiumDriverFactory {
    /// Factory using the Chromium found on the system
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific Chromium binary
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Disable the Chromium sandbox (containers)
    #[must_use]
    pub fn no_sandbox(mut self) -> Self {
        self.no_sandbox = true;
        self
    }
}

#[async_trait]
impl DriverFactory for ChromiumDriverFactory {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn launch(&self, config: &HarnessConfig) -> PageflowResult<Box<dyn BrowserDriver>> {
        let mut builder = CdpConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }
        if self.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(PageflowError::launch)?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config)
            .await
            .map_err(|e| PageflowError::launch(e.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| PageflowError::launch(e.to_string()))?;
        let dialogs = DialogHandler::new();
        let dialog_task = tokio::spawn(answer_dialogs(page.clone(), dialogs.clone()));
        debug!(headless = config.headless, "chromium session launched");

        Ok(Box::new(ChromiumDriver {
            browser: Mutex::new(browser),
            page: Mutex::new(page),
            dialogs,
            handler,
            dialog_task,
            closed: false,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod script_tests {
        use super::*;

        #[test]
        fn test_js_str_escapes() {
            assert_eq!(js_str(r#"a"b\c"#), r#""a\"b\\c""#);
            assert_eq!(js_str("🗑️"), "\"🗑️\"");
        }

        #[test]
        fn test_query_script_scopes() {
            let top = query_script(&Selector::css(".todo_list_item"), None);
            assert!(top.contains("const scope = document;"));
            assert!(top.contains("scope.querySelectorAll(\".todo_list_item\")"));

            let row = ElementHandle::new("pf-3", "li");
            let scoped = query_script(&Selector::css("span"), Some(&row));
            assert!(scoped.contains(r#"[data-pageflow-id=\"pf-3\"]"#));
        }

        #[test]
        fn test_action_scripts() {
            let fill = action_script("pf-1", &fill_body("x\"y"));
            assert!(fill.contains("if (!el) return false;"));
            assert!(fill.contains(r#""x\"y""#));
            assert!(press_body(Key::Enter).contains("\"Enter\""));
        }

        #[test]
        fn test_dialog_kind_mapping() {
            assert_eq!(dialog_kind(&CdpDialogType::Confirm), DialogType::Confirm);
            assert_eq!(dialog_kind(&CdpDialogType::Beforeunload), DialogType::BeforeUnload);
        }
    }
}
