//! Run reporting.
//!
//! The harness produces one [`ScenarioReport`] per selected scenario and
//! streams them to a [`ReportSink`] as they complete. The finished
//! [`RunReport`] renders as a text summary, JSON, or JUnit XML for CI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::driver::Screenshot;
use crate::result::{PageflowError, PageflowResult};

/// Final state of one scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioOutcome {
    /// Passed on the first attempt
    Passed,
    /// Failed on every attempt
    Failed,
    /// Failed at least once, then passed on a retry
    Flaky,
    /// Never run
    Skipped,
}

impl ScenarioOutcome {
    /// Passed or flaky
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Passed | Self::Flaky)
    }

    /// Failed
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Lowercase label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Flaky => "flaky",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error captured from the last failing attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Stable error kind, e.g. `element_not_found`
    pub kind: String,
    /// Rendered error
    pub message: String,
    /// Failing selector or URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Whether the failure was a timeout
    pub timeout: bool,
}

impl From<&PageflowError> for FailureInfo {
    fn from(err: &PageflowError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            target: err.target().map(str::to_string),
            timeout: err.is_timeout(),
        }
    }
}

/// Result of one scenario across all of its attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// `suite::name`
    pub id: String,
    /// Suite
    pub suite: String,
    /// Scenario name
    pub name: String,
    /// Tags
    pub tags: Vec<String>,
    /// Outcome
    pub outcome: ScenarioOutcome,
    /// Attempts made (0 when skipped)
    pub attempts: u32,
    /// Wall time across attempts
    pub duration_ms: u64,
    /// Error of the last failing attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureInfo>,
    /// Worker that ran it
    pub worker: usize,
    /// Where the failure screenshot was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<PathBuf>,
    /// Failure screenshot
    #[serde(skip)]
    pub screenshot: Option<Screenshot>,
}

impl ScenarioReport {
    /// Report for a scenario that never ran
    #[must_use]
    pub fn skipped(
        suite: impl Into<String>,
        name: impl Into<String>,
        tags: Vec<String>,
        worker: usize,
    ) -> Self {
        let suite = suite.into();
        let name = name.into();
        Self {
            id: format!("{suite}::{name}"),
            suite,
            name,
            tags,
            outcome: ScenarioOutcome::Skipped,
            attempts: 0,
            duration_ms: 0,
            error: None,
            worker,
            screenshot_path: None,
            screenshot: None,
        }
    }

    /// File stem for artifacts of this scenario
    #[must_use]
    pub fn artifact_stem(&self) -> String {
        self.id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    }
}

/// A complete harness run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run id
    pub run_id: Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall time of the whole run
    pub duration_ms: u64,
    /// Scenario reports in catalog order
    pub scenarios: Vec<ScenarioReport>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    /// Empty report starting now
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            duration_ms: 0,
            scenarios: Vec::new(),
        }
    }

    fn count(&self, outcome: ScenarioOutcome) -> usize {
        self.scenarios.iter().filter(|s| s.outcome == outcome).count()
    }

    /// Scenarios passed on the first attempt
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(ScenarioOutcome::Passed)
    }

    /// Scenarios failed on every attempt
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(ScenarioOutcome::Failed)
    }

    /// Scenarios that needed a retry
    #[must_use]
    pub fn flaky_count(&self) -> usize {
        self.count(ScenarioOutcome::Flaky)
    }

    /// Scenarios never run
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(ScenarioOutcome::Skipped)
    }

    /// Number of scenarios
    #[must_use]
    pub fn total(&self) -> usize {
        self.scenarios.len()
    }

    /// No failures and nothing skipped
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.scenarios.iter().all(|s| s.outcome.is_success())
    }

    /// Failed scenarios
    #[must_use]
    pub fn failures(&self) -> Vec<&ScenarioReport> {
        self.scenarios.iter().filter(|s| s.outcome.is_failed()).collect()
    }

    /// Report for a scenario id
    #[must_use]
    pub fn scenario(&self, id: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} scenarios: {} passed, {} failed, {} flaky, {} skipped ({:.2}s)",
            self.total(),
            self.passed_count(),
            self.failed_count(),
            self.flaky_count(),
            self.skipped_count(),
            self.duration_ms as f64 / 1000.0
        )
    }

    /// Plain-text listing followed by the summary
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for s in &self.scenarios {
            out.push_str(&format!(
                "{:<8} {} ({}ms, {} attempt{})\n",
                s.outcome.label(),
                s.id,
                s.duration_ms,
                s.attempts,
                if s.attempts == 1 { "" } else { "s" }
            ));
            if let Some(error) = &s.error {
                out.push_str(&format!("         {}\n", error.message));
            }
        }
        out.push_str(&self.summary());
        out.push('\n');
        out
    }

    /// Pretty JSON
    pub fn to_json(&self) -> PageflowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JUnit XML, one `<testsuite>` per suite
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut suites: Vec<&str> = Vec::new();
        for s in &self.scenarios {
            if !suites.contains(&s.suite.as_str()) {
                suites.push(&s.suite);
            }
        }

        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<testsuites name="pageflow" tests="{}" failures="{}" skipped="{}" time="{:.3}">"#,
            self.total(),
            self.failed_count(),
            self.skipped_count(),
            self.duration_ms as f64 / 1000.0
        ));
        xml.push('\n');

        for suite in suites {
            let cases: Vec<&ScenarioReport> = self.scenarios.iter().filter(|s| s.suite == suite).collect();
            let failures = cases.iter().filter(|c| c.outcome.is_failed()).count();
            let skipped = cases.iter().filter(|c| c.outcome == ScenarioOutcome::Skipped).count();
            let time: u64 = cases.iter().map(|c| c.duration_ms).sum();
            xml.push_str(&format!(
                r#"  <testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{:.3}">"#,
                escape_xml(suite),
                cases.len(),
                failures,
                skipped,
                time as f64 / 1000.0
            ));
            xml.push('\n');
            for case in cases {
                xml.push_str(&format!(
                    r#"    <testcase classname="{}" name="{}" time="{:.3}">"#,
                    escape_xml(&case.suite),
                    escape_xml(&case.name),
                    case.duration_ms as f64 / 1000.0
                ));
                xml.push('\n');
                match (&case.outcome, &case.error) {
                    (ScenarioOutcome::Failed, Some(error)) => {
                        xml.push_str(&format!(
                            r#"      <failure type="{}" message="{}">{}</failure>"#,
                            error.kind,
                            escape_xml(&error.message),
                            escape_xml(&error.message)
                        ));
                        xml.push('\n');
                    }
                    (ScenarioOutcome::Skipped, _) => xml.push_str("      <skipped/>\n"),
                    (ScenarioOutcome::Flaky, _) => {
                        xml.push_str(&format!(
                            "      <system-out>flaky: passed after {} attempts</system-out>\n",
                            case.attempts
                        ));
                    }
                    _ => {}
                }
                xml.push_str("    </testcase>\n");
            }
            xml.push_str("  </testsuite>\n");
        }

        xml.push_str("</testsuites>\n");
        xml
    }

    /// Write the JSON report
    pub fn write_json(&self, path: &Path) -> PageflowResult<()> {
        write_file(path, &self.to_json()?)
    }

    /// Write the JUnit report
    pub fn write_junit(&self, path: &Path) -> PageflowResult<()> {
        write_file(path, &self.render_junit())
    }

    /// Save failure screenshots under `dir`, recording each path
    pub fn save_screenshots(&mut self, dir: &Path) -> PageflowResult<usize> {
        let mut saved = 0;
        for s in &mut self.scenarios {
            if let Some(shot) = &s.screenshot {
                let path = dir.join(format!("{}.{}", s.artifact_stem(), shot.extension()));
                shot.save(&path)?;
                s.screenshot_path = Some(path);
                saved += 1;
            }
        }
        Ok(saved)
    }
}

fn write_file(path: &Path, contents: &str) -> PageflowResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Receives results as the harness produces them
pub trait ReportSink: Send {
    /// Run is about to start with `total` selected scenarios
    fn on_start(&mut self, _total: usize) {}

    /// One scenario finished (or was skipped)
    fn record(&mut self, report: &ScenarioReport);

    /// Run finished
    fn on_finish(&mut self, _run: &RunReport) {}
}

/// Keeps every report in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Reports in completion order
    pub reports: Vec<ScenarioReport>,
    /// Total announced by `on_start`
    pub announced: Option<usize>,
    /// Whether `on_finish` ran
    pub finished: bool,
}

impl MemorySink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for MemorySink {
    fn on_start(&mut self, total: usize) {
        self.announced = Some(total);
    }

    fn record(&mut self, report: &ScenarioReport) {
        self.reports.push(report.clone());
    }

    fn on_finish(&mut self, _run: &RunReport) {
        self.finished = true;
    }
}

/// Logs each result through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn on_start(&mut self, total: usize) {
        info!(total, "run started");
    }

    fn record(&mut self, report: &ScenarioReport) {
        match &report.error {
            Some(error) if report.outcome.is_failed() => warn!(
                scenario = %report.id,
                attempts = report.attempts,
                kind = %error.kind,
                "{}",
                error.message
            ),
            _ => info!(
                scenario = %report.id,
                outcome = %report.outcome,
                duration_ms = report.duration_ms,
                "scenario finished"
            ),
        }
    }

    fn on_finish(&mut self, run: &RunReport) {
        info!(run_id = %run.run_id, "{}", run.summary());
    }
}
