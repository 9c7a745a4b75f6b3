//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use pageflow::{ReportSink, RunReport, ScenarioOutcome, ScenarioReport};
use std::time::Duration;

/// Counts for the closing summary line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Passed on the first attempt
    pub passed: usize,
    /// Failed after all attempts
    pub failed: usize,
    /// Passed after a retry
    pub flaky: usize,
    /// Never run
    pub skipped: usize,
}

impl Tally {
    /// Tally of a finished run
    #[must_use]
    pub fn of(run: &RunReport) -> Self {
        Self {
            passed: run.passed_count(),
            failed: run.failed_count(),
            flaky: run.flaky_count(),
            skipped: run.skipped_count(),
        }
    }

    /// All scenarios counted
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.flaky + self.skipped
    }
}

/// Progress reporter for scenario execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn line(&self, text: &str) {
        match self.progress_bar {
            Some(ref pb) => pb.println(text),
            None => {
                let _ = self.term.write_line(text);
            }
        }
    }

    fn prefixed(&self, symbol: &str, plain: &str, paint: Style) -> String {
        if self.use_color {
            paint.apply_to(symbol).bold().to_string()
        } else {
            plain.to_string()
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefixed("✓", "PASS", Style::new().green());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Failures print even in quiet mode
        let prefix = self.prefixed("✗", "FAIL", Style::new().red());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefixed("⚠", "WARN", Style::new().yellow());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefixed("ℹ", "INFO", Style::new().blue());
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        self.line("");
        self.line(&styled);
    }

    /// Print the run summary
    pub fn summary(&self, tally: Tally, duration: Duration) {
        if self.quiet && tally.failed == 0 {
            return;
        }

        self.line("");
        self.line(&format_summary(tally, duration, self.use_color));
    }
}

/// Closing summary line
#[must_use]
pub fn format_summary(tally: Tally, duration: Duration, use_color: bool) -> String {
    let Tally {
        passed,
        failed,
        flaky,
        skipped,
    } = tally;
    let total = tally.total();
    let secs = duration.as_secs_f64();

    if !use_color {
        let status = if failed > 0 { "FAILED" } else { "PASSED" };
        return format!(
            "{status} {total} scenarios in {secs:.2}s ({passed} passed, {failed} failed, {flaky} flaky, {skipped} skipped)"
        );
    }

    let passed_style = Style::new().green().bold();
    let failed_style = Style::new().red().bold();
    let flaky_style = Style::new().yellow().bold();
    let skipped_style = Style::new().yellow();

    let status = if failed > 0 {
        failed_style.apply_to("FAILED")
    } else {
        passed_style.apply_to("PASSED")
    };

    format!(
        "{status} {total} scenarios in {secs:.2}s ({} passed, {} failed, {} flaky, {} skipped)",
        passed_style.apply_to(passed),
        if failed > 0 {
            failed_style.apply_to(failed).to_string()
        } else {
            failed.to_string()
        },
        flaky_style.apply_to(flaky),
        skipped_style.apply_to(skipped)
    )
}

/// One line per finished scenario
#[must_use]
pub fn describe_scenario(report: &ScenarioReport) -> String {
    let mut line = format!("{} ({}ms)", report.id, report.duration_ms);
    match report.outcome {
        ScenarioOutcome::Flaky => line.push_str(&format!(" after {} attempts", report.attempts)),
        ScenarioOutcome::Failed => {
            if let Some(error) = &report.error {
                line.push_str(&format!(": {}", error.message));
            }
        }
        ScenarioOutcome::Passed | ScenarioOutcome::Skipped => {}
    }
    line
}

/// [`ReportSink`] that drives a [`ProgressReporter`]
#[derive(Debug)]
pub struct ConsoleSink {
    reporter: ProgressReporter,
}

impl ConsoleSink {
    /// Sink printing through `reporter`
    #[must_use]
    pub const fn new(reporter: ProgressReporter) -> Self {
        Self { reporter }
    }
}

impl ReportSink for ConsoleSink {
    fn on_start(&mut self, total: usize) {
        self.reporter.header(&format!("Running {total} scenarios"));
        self.reporter.start_progress(total as u64, "scenarios");
    }

    fn record(&mut self, report: &ScenarioReport) {
        let line = describe_scenario(report);
        match report.outcome {
            ScenarioOutcome::Passed => self.reporter.success(&line),
            ScenarioOutcome::Failed => self.reporter.failure(&line),
            ScenarioOutcome::Flaky => self.reporter.warning(&line),
            ScenarioOutcome::Skipped => self.reporter.info(&format!("{line} skipped")),
        }
        self.reporter.increment(1);
    }

    fn on_finish(&mut self, run: &RunReport) {
        self.reporter.finish();
        self.reporter
            .summary(Tally::of(run), Duration::from_millis(run.duration_ms));
    }
}
