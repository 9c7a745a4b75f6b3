//! Result and error types for Pageflow.
//!
//! Element, navigation and timeout errors carry the selector or URL that
//! failed so reports can point at the broken locator directly.

use thiserror::Error;

/// Result type for Pageflow operations
pub type PageflowResult<T> = Result<T, PageflowError>;

/// Errors that can occur while driving a page
#[derive(Debug, Error)]
pub enum PageflowError {
    /// Selector resolved to zero nodes within the action timeout
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// Selector that failed to resolve
        selector: String,
    },

    /// Selector resolved to more than one node for a single-target action
    #[error("Ambiguous selector {selector}: matched {count} elements")]
    AmbiguousSelector {
        /// Selector that matched too much
        selector: String,
        /// Number of matches
        count: usize,
    },

    /// Element resolved but never became actionable
    #[error("Element {selector} not ready after {ms}ms: {reason}")]
    ElementNotReady {
        /// Selector of the element
        selector: String,
        /// Missing precondition (hidden, disabled, detached)
        reason: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Post-condition wait elapsed
    #[error("Timed out after {ms}ms waiting for {condition}")]
    WaitTimeout {
        /// Human readable condition
        condition: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Navigation did not reach the expected URL
    #[error("Navigation to {url} timed out after {ms}ms (current: {actual})")]
    NavigationTimeout {
        /// Expected URL or pattern
        url: String,
        /// URL the page was on when the timeout hit
        actual: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Dialog did not match the armed expectation
    #[error("Dialog mismatch: expected {expected}, got {actual}")]
    DialogMismatch {
        /// What the armed handle expected
        expected: String,
        /// What actually showed up
        actual: String,
    },

    /// Checkpoint assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailure {
        /// Error message
        message: String,
    },

    /// Whole scenario exceeded its time budget
    #[error("Scenario timed out after {ms}ms")]
    ScenarioTimeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Browser session could not be created
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Driver backend failure
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Selector failed construction-time validation
    #[error("Invalid selector {selector}: {reason}")]
    InvalidSelector {
        /// Offending selector
        selector: String,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// A scenario step failed
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        /// Step label
        step: String,
        /// Underlying error
        #[source]
        source: Box<PageflowError>,
    },

    /// Screenshot differs from its stored baseline
    #[error("Snapshot {name} differs from baseline by {percent:.2}% (actual saved to {actual})")]
    SnapshotMismatch {
        /// Baseline name
        name: String,
        /// Share of differing bytes, in percent
        percent: f64,
        /// Where the rejected screenshot was written
        actual: String,
    },

    /// Backend HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl PageflowError {
    /// Create an element-not-found error
    pub fn not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Create an assertion failure
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailure {
            message: message.into(),
        }
    }

    /// Create a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a browser launch error
    pub fn launch(message: impl Into<String>) -> Self {
        Self::BrowserLaunch {
            message: message.into(),
        }
    }

    /// Wrap an error with the step that produced it
    pub fn in_step(self, step: impl Into<String>) -> Self {
        Self::StepFailed {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// Stable machine-readable error kind, used in reports.
    ///
    /// Step wrappers report the kind of the underlying error.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ElementNotFound { .. } => "element_not_found",
            Self::AmbiguousSelector { .. } => "ambiguous_selector",
            Self::ElementNotReady { .. } => "element_not_ready",
            Self::WaitTimeout { .. } => "wait_timeout",
            Self::NavigationTimeout { .. } => "navigation_timeout",
            Self::DialogMismatch { .. } => "dialog_mismatch",
            Self::AssertionFailure { .. } => "assertion_failure",
            Self::ScenarioTimeout { .. } => "scenario_timeout",
            Self::BrowserLaunch { .. } => "browser_launch",
            Self::Driver { .. } => "driver",
            Self::InvalidSelector { .. } => "invalid_selector",
            Self::Config { .. } => "config",
            Self::StepFailed { source, .. } => source.kind(),
            Self::SnapshotMismatch { .. } => "snapshot_mismatch",
            Self::Http(_) => "http",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Yaml(_) => "yaml",
        }
    }

    /// Whether the failure is time-based (a candidate for flakiness)
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::ElementNotFound { .. }
            | Self::ElementNotReady { .. }
            | Self::WaitTimeout { .. }
            | Self::NavigationTimeout { .. }
            | Self::ScenarioTimeout { .. } => true,
            Self::StepFailed { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Selector or URL the failure refers to, if any
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::ElementNotFound { selector }
            | Self::AmbiguousSelector { selector, .. }
            | Self::ElementNotReady { selector, .. }
            | Self::InvalidSelector { selector, .. } => Some(selector),
            Self::NavigationTimeout { url, .. } => Some(url),
            Self::SnapshotMismatch { name, .. } => Some(name),
            Self::StepFailed { source, .. } => source.target(),
            _ => None,
        }
    }
}
