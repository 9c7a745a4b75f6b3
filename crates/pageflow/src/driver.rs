//! Browser automation seam.
//!
//! Everything above this module (sessions, waits, page objects) talks to a
//! [`BrowserDriver`]. Two implementations ship with the crate:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  BrowserDriver (async trait)                                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │  MockDriver                     ChromiumDriver               │
//! │  in-process VirtualApp          CDP via chromiumoxide        │
//! │  (always available)             (feature = "browser")        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Drivers only expose primitives. Waiting for selectors and URLs is built on
//! top of them by [`crate::wait`] and [`crate::session`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::HarnessConfig;
use crate::dialog::DialogHandler;
use crate::locator::Selector;
use crate::result::PageflowResult;

/// Snapshot of one matched DOM node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-specific opaque id
    pub id: String,
    /// Lower-case tag name
    pub tag_name: String,
    /// Text content (including descendants)
    pub text_content: String,
    /// Whether the node is rendered and visible
    pub visible: bool,
    /// Whether the node accepts input
    pub enabled: bool,
    /// CSS classes
    pub classes: Vec<String>,
    /// Current value for form controls
    pub value: Option<String>,
}

impl ElementHandle {
    /// Create a visible, enabled handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            text_content: String::new(),
            visible: true,
            enabled: true,
            classes: Vec::new(),
            value: None,
        }
    }

    /// Whether the node carries `class`
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Reason the element cannot be acted upon, if any
    #[must_use]
    pub fn not_ready_reason(&self) -> Option<&'static str> {
        if !self.visible {
            Some("element is not visible")
        } else if !self.enabled {
            Some("element is disabled")
        } else {
            None
        }
    }
}

/// Keys the drivers know how to press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    /// Enter / Return
    Enter,
    /// Escape
    Escape,
    /// Tab
    Tab,
    /// Backspace
    Backspace,
}

impl Key {
    /// DOM `KeyboardEvent.key` value
    #[must_use]
    pub const fn dom_key(self) -> &'static str {
        match self {
            Self::Enter => "Enter",
            Self::Escape => "Escape",
            Self::Tab => "Tab",
            Self::Backspace => "Backspace",
        }
    }
}

/// Screenshot payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    /// Raw bytes
    pub data: Vec<u8>,
    /// MIME type (`image/png` for real browsers, `text/plain` for the mock)
    pub mime: &'static str,
}

impl Screenshot {
    /// PNG screenshot
    #[must_use]
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            data,
            mime: "image/png",
        }
    }

    /// Textual page dump
    #[must_use]
    pub fn text(dump: impl Into<String>) -> Self {
        Self {
            data: dump.into().into_bytes(),
            mime: "text/plain",
        }
    }

    /// File extension matching the MIME type
    #[must_use]
    pub fn extension(&self) -> &'static str {
        if self.mime == "image/png" {
            "png"
        } else {
            "txt"
        }
    }

    /// Write to disk
    pub fn save(&self, path: &Path) -> PageflowResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

/// Browser automation primitives
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Driver name for logs and reports
    fn name(&self) -> &str;

    /// Start a navigation to an absolute URL
    async fn goto(&mut self, url: &str) -> PageflowResult<()>;

    /// Current page URL
    async fn current_url(&self) -> PageflowResult<String>;

    /// All nodes matching `selector` in document order, optionally inside `scope`
    async fn query(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> PageflowResult<Vec<ElementHandle>>;

    /// Scroll into view and click
    async fn click(&mut self, element: &ElementHandle) -> PageflowResult<()>;

    /// Move the pointer over the element
    async fn hover(&mut self, element: &ElementHandle) -> PageflowResult<()>;

    /// Replace the value of a form control
    async fn fill(&mut self, element: &ElementHandle, value: &str) -> PageflowResult<()>;

    /// Press a key with the element focused
    async fn press(&mut self, element: &ElementHandle, key: Key) -> PageflowResult<()>;

    /// Capture the page
    async fn screenshot(&self) -> PageflowResult<Screenshot>;

    /// Dialog registry shared with the session
    fn dialogs(&self) -> &DialogHandler;

    /// Tear the session down
    async fn close(&mut self) -> PageflowResult<()>;
}

/// Launches one fresh driver per scenario attempt
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Factory name for logs
    fn name(&self) -> &str;

    /// Launch a new browser session
    async fn launch(&self, config: &HarnessConfig) -> PageflowResult<Box<dyn BrowserDriver>>;
}
