//! Harness configuration.
//!
//! Precedence, lowest first: built-in defaults, config file (YAML or JSON),
//! environment, CLI flags. Keys accept the camel-case spellings used by
//! common browser-test configs (`baseURL`, `timeout`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::result::{PageflowError, PageflowResult};
use crate::snapshot::SnapshotConfig;
use crate::todo::SeedMode;
use crate::wait::{WaitOptions, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS};

/// Default base URL of the application under test
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default address of the to-do backend queried by the service seed
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Default whole-scenario timeout (60 seconds)
pub const DEFAULT_SCENARIO_TIMEOUT_MS: u64 = 60_000;

/// Retries applied on CI when neither the file nor the environment sets them
pub const CI_RETRIES: u32 = 2;

/// Workers applied on CI when nothing else sets them
pub const CI_WORKERS: usize = 1;

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL that relative navigation targets resolve against
    #[serde(alias = "baseURL", alias = "baseUrl")]
    pub base_url: String,
    /// Per-action timeout in milliseconds
    #[serde(alias = "timeout")]
    pub timeout_ms: u64,
    /// Whole-scenario retries on failure; unset means none, or
    /// [`CI_RETRIES`] on CI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Parallel workers; unset or 0 means one per available core, unset
    /// means [`CI_WORKERS`] on CI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Run the browser without a window
    pub headless: bool,
    /// Budget for one scenario attempt in milliseconds
    pub scenario_timeout_ms: u64,
    /// Wait poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Capture a screenshot before tearing down a failed attempt
    pub screenshot_on_failure: bool,
    /// Where reports and screenshots go
    pub output_dir: PathBuf,
    /// Stop scheduling scenarios after the first failure
    pub fail_fast: bool,
    /// Initial to-do list for the sample app
    pub seed: SeedMode,
    /// To-do backend whose `GET /items` feeds the service seed
    #[serde(alias = "backendURL", alias = "backendUrl")]
    pub backend_url: String,
    /// Rewrite snapshot baselines instead of comparing against them
    pub update_snapshots: bool,
    /// Tolerated share of differing snapshot bytes (0.0 to 1.0)
    pub snapshot_threshold: f64,
    /// Baseline directory; unset means `snapshots` under `output_dir`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: None,
            workers: None,
            headless: true,
            scenario_timeout_ms: DEFAULT_SCENARIO_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            screenshot_on_failure: true,
            output_dir: PathBuf::from("target/pageflow"),
            fail_fast: false,
            seed: SeedMode::default(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            update_snapshots: false,
            snapshot_threshold: 0.0,
            snapshot_dir: None,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> PageflowResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| PageflowError::config(format!("{key}: cannot parse {raw:?}")))
}

fn parse_bool(key: &str, raw: &str) -> PageflowResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PageflowError::config(format!("{key}: expected a boolean, got {raw:?}"))),
    }
}

impl HarnessConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a `.yaml`/`.yml` or `.json` file
    pub fn load(path: &Path) -> PageflowResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config: Self = match ext.as_deref() {
            Some("yaml" | "yml") => serde_yaml_ng::from_str(&text)?,
            Some("json") => serde_json::from_str(&text)?,
            _ => {
                return Err(PageflowError::config(format!(
                    "unsupported config format: {}",
                    path.display()
                )))
            }
        };
        tracing::debug!(path = %path.display(), "loaded harness config");
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> PageflowResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`.
    ///
    /// `CI` switches to 2 retries and 1 worker unless the config file set
    /// them, even to 0; explicit `PAGEFLOW_*` variables win over both.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> PageflowResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let on_ci = lookup("CI").is_some_and(|v| !v.is_empty() && v != "0" && v != "false");
        if on_ci {
            self.retries.get_or_insert(CI_RETRIES);
            self.workers.get_or_insert(CI_WORKERS);
        }
        if let Some(url) = lookup("PAGEFLOW_BASE_URL") {
            self.base_url = url;
        }
        if let Some(raw) = lookup("PAGEFLOW_TIMEOUT_MS") {
            self.timeout_ms = parse_env("PAGEFLOW_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("PAGEFLOW_WORKERS") {
            self.workers = Some(parse_env("PAGEFLOW_WORKERS", &raw)?);
        }
        if let Some(raw) = lookup("PAGEFLOW_RETRIES") {
            self.retries = Some(parse_env("PAGEFLOW_RETRIES", &raw)?);
        }
        if let Some(url) = lookup("PAGEFLOW_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(raw) = lookup("PAGEFLOW_UPDATE_SNAPSHOTS") {
            self.update_snapshots = parse_bool("PAGEFLOW_UPDATE_SNAPSHOTS", &raw)?;
        }
        if let Some(raw) = lookup("PAGEFLOW_HEADLESS") {
            self.headless = parse_bool("PAGEFLOW_HEADLESS", &raw)?;
        }
        Ok(())
    }

    /// Reject configurations the harness cannot run with
    pub fn validate(&self) -> PageflowResult<()> {
        let url = self.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://") || url.starts_with("file://")) {
            return Err(PageflowError::config(format!(
                "base_url must be an absolute http(s) or file URL, got {url:?}"
            )));
        }
        let backend = self.backend_url.as_str();
        if !(backend.starts_with("http://") || backend.starts_with("https://")) {
            return Err(PageflowError::config(format!(
                "backend_url must be an absolute http(s) URL, got {backend:?}"
            )));
        }
        if self.timeout_ms == 0 {
            return Err(PageflowError::config("timeout_ms must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.snapshot_threshold) {
            return Err(PageflowError::config(
                "snapshot_threshold must be between 0.0 and 1.0",
            ));
        }
        if self.scenario_timeout_ms == 0 {
            return Err(PageflowError::config(
                "scenario_timeout_ms must be greater than 0",
            ));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > self.timeout_ms {
            return Err(PageflowError::config(
                "poll_interval_ms must be between 1 and timeout_ms",
            ));
        }
        Ok(())
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the per-action timeout
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the retry count
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Set the worker count
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set headless mode
    #[must_use]
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the scenario timeout
    #[must_use]
    pub fn with_scenario_timeout_ms(mut self, ms: u64) -> Self {
        self.scenario_timeout_ms = ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Toggle failure screenshots
    #[must_use]
    pub fn with_screenshot_on_failure(mut self, enabled: bool) -> Self {
        self.screenshot_on_failure = enabled;
        self
    }

    /// Set the output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Toggle fail-fast
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Select the seed mode
    #[must_use]
    pub fn with_seed(mut self, seed: SeedMode) -> Self {
        self.seed = seed;
        self
    }

    /// Set the to-do backend address
    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    /// Rewrite snapshot baselines on this run
    #[must_use]
    pub fn with_update_snapshots(mut self, update: bool) -> Self {
        self.update_snapshots = update;
        self
    }

    /// Set the tolerated snapshot difference
    #[must_use]
    pub fn with_snapshot_threshold(mut self, threshold: f64) -> Self {
        self.snapshot_threshold = threshold;
        self
    }

    /// Retries after the first failed attempt
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(0)
    }

    /// Snapshot settings for sessions of this run
    #[must_use]
    pub fn snapshot_config(&self) -> SnapshotConfig {
        let dir = self
            .snapshot_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("snapshots"));
        SnapshotConfig::default()
            .with_dir(dir)
            .with_update(self.update_snapshots)
            .with_threshold(self.snapshot_threshold)
    }

    /// Wait options derived from the timeouts
    #[must_use]
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout_ms: self.timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    /// Worker count with `0` resolved to the available parallelism
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        match self.workers {
            Some(workers) if workers > 0 => workers,
            _ => std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
        }
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> PageflowResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}
