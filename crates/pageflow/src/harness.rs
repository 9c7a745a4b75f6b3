//! Test harness: session lifecycle, retries and the worker pool.
//!
//! Selected scenarios are dealt round-robin to `workers` tokio tasks. Each
//! worker launches a fresh session per attempt, runs the scenario under the
//! scenario timeout, captures a screenshot on failure and always tears the
//! session down. Results flow over an mpsc channel to the single collector,
//! which feeds the [`ReportSink`] and assembles the [`RunReport`] in catalog
//! order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::driver::DriverFactory;
use crate::reporter::{FailureInfo, ReportSink, RunReport, ScenarioOutcome, ScenarioReport};
use crate::result::{PageflowError, PageflowResult};
use crate::scenario::{Scenario, ScenarioCatalog, ScenarioFilter};
use crate::session::Session;

type Indexed = (usize, Arc<dyn Scenario>);

/// Runs scenarios against sessions produced by a [`DriverFactory`]
#[derive(Clone)]
pub struct Harness {
    config: HarnessConfig,
    factory: Arc<dyn DriverFactory>,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("factory", &self.factory.name())
            .finish()
    }
}

impl Harness {
    /// Harness over `factory`
    pub fn new(config: HarnessConfig, factory: impl DriverFactory + 'static) -> Self {
        Self::with_factory(config, Arc::new(factory))
    }

    /// Harness over a shared factory
    #[must_use]
    pub fn with_factory(config: HarnessConfig, factory: Arc<dyn DriverFactory>) -> Self {
        Self { config, factory }
    }

    /// Effective configuration
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run the scenarios of `catalog` selected by `filter`
    pub async fn run_catalog(
        &self,
        catalog: &ScenarioCatalog,
        filter: &ScenarioFilter,
        sink: &mut dyn ReportSink,
    ) -> PageflowResult<RunReport> {
        self.run(catalog.select(filter), sink).await
    }

    /// Run `scenarios`, reporting in the given order
    pub async fn run(
        &self,
        scenarios: Vec<Arc<dyn Scenario>>,
        sink: &mut dyn ReportSink,
    ) -> PageflowResult<RunReport> {
        self.config.validate()?;
        let started = Instant::now();
        let mut run = RunReport::new();
        let total = scenarios.len();
        sink.on_start(total);

        let workers = self.config.effective_workers().clamp(1, total.max(1));
        info!(run_id = %run.run_id, total, workers, driver = self.factory.name(), "starting run");

        let mut buckets: Vec<Vec<Indexed>> = vec![Vec::new(); workers];
        for (index, scenario) in scenarios.iter().enumerate() {
            buckets[index % workers].push((index, Arc::clone(scenario)));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, ScenarioReport)>();
        let stop = Arc::new(AtomicBool::new(false));
        let handles: Vec<_> = buckets
            .into_iter()
            .enumerate()
            .map(|(worker, bucket)| {
                let job = Worker {
                    id: worker,
                    config: self.config.clone(),
                    factory: Arc::clone(&self.factory),
                    stop: Arc::clone(&stop),
                    tx: tx.clone(),
                };
                tokio::spawn(job.run(bucket))
            })
            .collect();
        drop(tx);

        let mut slots: Vec<Option<ScenarioReport>> = vec![None; total];
        while let Some((index, report)) = rx.recv().await {
            sink.record(&report);
            slots[index] = Some(report);
        }

        for (worker, handle) in handles.into_iter().enumerate() {
            if let Err(err) = handle.await {
                warn!(worker, error = %err, "worker aborted");
            }
        }

        run.scenarios = slots
            .into_iter()
            .zip(&scenarios)
            .map(|(slot, scenario)| {
                slot.unwrap_or_else(|| {
                    let err = PageflowError::driver("worker stopped before reporting");
                    let mut report = ScenarioReport::skipped(
                        scenario.suite(),
                        scenario.name(),
                        scenario.tags().to_vec(),
                        0,
                    );
                    report.outcome = ScenarioOutcome::Failed;
                    report.error = Some(FailureInfo::from(&err));
                    report
                })
            })
            .collect();
        run.duration_ms = elapsed_ms(started);
        info!(run_id = %run.run_id, "{}", run.summary());
        sink.on_finish(&run);
        Ok(run)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Why a scenario stopped short
enum Aborted {
    /// The driver could not be launched; the worker gives up
    Launch(ScenarioReport, PageflowError),
}

struct Worker {
    id: usize,
    config: HarnessConfig,
    factory: Arc<dyn DriverFactory>,
    stop: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<(usize, ScenarioReport)>,
}

impl Worker {
    async fn run(self, bucket: Vec<Indexed>) {
        let mut pending = bucket.into_iter();
        while let Some((index, scenario)) = pending.next() {
            if self.stop.load(Ordering::SeqCst) {
                self.send(index, self.skipped(scenario.as_ref()));
                continue;
            }
            match self.run_scenario(scenario.as_ref()).await {
                Ok(report) => {
                    if report.outcome.is_failed() && self.config.fail_fast {
                        warn!(scenario = %report.id, "fail-fast: stopping the run");
                        self.stop.store(true, Ordering::SeqCst);
                    }
                    self.send(index, report);
                }
                Err(Aborted::Launch(report, err)) => {
                    warn!(worker = self.id, error = %err, "browser launch failed, abandoning worker");
                    if self.config.fail_fast {
                        self.stop.store(true, Ordering::SeqCst);
                    }
                    self.send(index, report);
                    for (index, rest) in pending.by_ref() {
                        let mut report = self.skipped(rest.as_ref());
                        report.outcome = ScenarioOutcome::Failed;
                        report.error = Some(FailureInfo::from(&err));
                        self.send(index, report);
                    }
                }
            }
        }
    }

    fn send(&self, index: usize, report: ScenarioReport) {
        if self.tx.send((index, report)).is_err() {
            debug!(worker = self.id, "collector gone");
        }
    }

    fn skipped(&self, scenario: &dyn Scenario) -> ScenarioReport {
        ScenarioReport::skipped(scenario.suite(), scenario.name(), scenario.tags().to_vec(), self.id)
    }

    async fn run_scenario(&self, scenario: &dyn Scenario) -> Result<ScenarioReport, Aborted> {
        let started = Instant::now();
        let mut report = self.skipped(scenario);
        let max_attempts = self.config.retries().saturating_add(1);
        let timeout = Duration::from_millis(self.config.scenario_timeout_ms);

        for attempt in 1..=max_attempts {
            report.attempts = attempt;
            debug!(scenario = %report.id, attempt, worker = self.id, "attempt");

            let driver = match self.factory.launch(&self.config).await {
                Ok(driver) => driver,
                Err(err) => {
                    let err = match err {
                        PageflowError::BrowserLaunch { .. } => err,
                        other => PageflowError::launch(other.to_string()),
                    };
                    report.outcome = ScenarioOutcome::Failed;
                    report.error = Some(FailureInfo::from(&err));
                    report.duration_ms = elapsed_ms(started);
                    return Err(Aborted::Launch(report, err));
                }
            };
            let session = Arc::new(Session::new(driver, &self.config));

            let result = match tokio::time::timeout(timeout, scenario.run(Arc::clone(&session))).await {
                Ok(result) => result,
                Err(_) => Err(PageflowError::ScenarioTimeout {
                    ms: self.config.scenario_timeout_ms,
                }),
            };

            if result.is_err() && self.config.screenshot_on_failure {
                match session.screenshot().await {
                    Ok(shot) => report.screenshot = Some(shot),
                    Err(err) => debug!(scenario = %report.id, error = %err, "failure screenshot unavailable"),
                }
            }
            if let Err(err) = session.close().await {
                warn!(scenario = %report.id, error = %err, "session teardown failed");
            }

            match result {
                Ok(()) => {
                    report.outcome = if attempt == 1 {
                        ScenarioOutcome::Passed
                    } else {
                        ScenarioOutcome::Flaky
                    };
                    report.screenshot = None;
                    report.duration_ms = elapsed_ms(started);
                    info!(scenario = %report.id, outcome = %report.outcome, attempts = attempt, "scenario finished");
                    return Ok(report);
                }
                Err(err) => {
                    if attempt < max_attempts {
                        warn!(scenario = %report.id, attempt, error = %err, "attempt failed, retrying");
                    }
                    report.error = Some(FailureInfo::from(&err));
                }
            }
        }

        report.outcome = ScenarioOutcome::Failed;
        report.duration_ms = elapsed_ms(started);
        info!(scenario = %report.id, outcome = %report.outcome, attempts = report.attempts, "scenario finished");
        Ok(report)
    }
}
