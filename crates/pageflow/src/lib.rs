//! Pageflow: page-object acceptance testing for browser-driven scenarios.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    PAGEFLOW Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Harness    │    │ Scenario   │    │ Page       │            │
//! │   │ (workers,  │───►│ Runner     │───►│ Objects    │            │
//! │   │  retries)  │    │ (steps)    │    │            │            │
//! │   └─────┬──────┘    └────────────┘    └─────┬──────┘            │
//! │         │ launch                            │ resolve           │
//! │   ┌─────▼──────┐                      ┌─────▼──────┐            │
//! │   │ Driver     │◄─────────────────────│ Locator    │            │
//! │   │ (mock/CDP) │       Session        │ Registry   │            │
//! │   └────────────┘                      └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`Harness`] deals scenarios to workers; each attempt gets a fresh
//! [`Session`] from a [`DriverFactory`]. Page objects resolve their
//! [`LocatorRegistry`] entries against the live DOM through the session and
//! wait for post-conditions, and may check screenshots against stored
//! baselines. The sample to-do application lives in [`todo`].

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod assertion;
mod config;
mod driver;
mod harness;
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
mod locator;
mod page_object;
#[allow(clippy::format_push_string, clippy::needless_raw_string_hashes)]
mod reporter;
mod result;
mod scenario;
mod session;
mod snapshot;

/// Native dialog interception
pub mod dialog;

/// In-process driver over simulated pages
pub mod mock;

/// The sample to-do application, its page object and acceptance suites
pub mod todo;

/// Bounded waits, URL patterns and post-conditions
pub mod wait;

/// Chromium driver over CDP
#[cfg(feature = "browser")]
#[allow(clippy::format_push_string)]
pub mod chromium;

pub use assertion::{expect_contains, expect_eq, expect_len, expect_not_contains, expect_true, SoftAssertions};
pub use config::HarnessConfig;
pub use dialog::{ArmedDialog, AutoDialogBehavior, Dialog, DialogAction, DialogHandler, DialogType};
pub use driver::{BrowserDriver, DriverFactory, ElementHandle, Key, Screenshot};
pub use harness::Harness;
pub use locator::{
    CssIdStrategy, Locator, LocatorRegistry, RegistryBuilder, Selector, SelectorStrategy, TestIdStrategy,
};
pub use mock::{AppEvent, MockDriver, MockDriverFactory, VirtualApp, VirtualNode};
pub use page_object::{BasePage, LoginPage, PageObject, Submit, Target};
pub use reporter::{
    FailureInfo, LogSink, MemorySink, ReportSink, RunReport, ScenarioOutcome, ScenarioReport,
};
pub use result::{PageflowError, PageflowResult};
pub use scenario::{FnScenario, Scenario, ScenarioCatalog, ScenarioFilter, Step, StepScenario};
pub use session::Session;
pub use snapshot::{Snapshot, SnapshotConfig, SnapshotDiff, SnapshotOutcome};
pub use wait::{wait_until, Postcondition, UrlPattern, WaitOptions};

#[cfg(feature = "browser")]
pub use chromium::{ChromiumDriver, ChromiumDriverFactory};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a suite author needs
pub mod prelude {
    pub use super::assertion::*;
    pub use super::config::*;
    pub use super::dialog::*;
    pub use super::driver::*;
    pub use super::harness::*;
    pub use super::locator::*;
    pub use super::mock::*;
    pub use super::page_object::*;
    pub use super::reporter::*;
    pub use super::result::*;
    pub use super::scenario::*;
    pub use super::session::*;
    pub use super::snapshot::*;
    pub use super::todo::*;
    pub use super::wait::*;
}
