//! Scenario runner: layers the configuration, picks the driver, runs the
//! catalog and writes the reports

use crate::commands::{DriverKind, HarnessArgs, ReportFormat, SelectArgs, TestArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{ConsoleSink, ProgressReporter};
use pageflow::todo::{todo_catalog, BackendClient, SeedMode, TodoApp};
use pageflow::{
    DriverFactory, Harness, HarnessConfig, MockDriverFactory, RunReport, Scenario, ScenarioFilter,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// JSON report file name inside the output directory
pub const JSON_REPORT: &str = "report.json";

/// JUnit report file name inside the output directory
pub const JUNIT_REPORT: &str = "junit.xml";

/// Defaults, then the config file, then the environment, then flags
pub fn resolve_harness_config(args: &HarnessArgs) -> CliResult<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    config.apply_env()?;
    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

/// Apply command-line flags on top of `config`
pub fn apply_overrides(config: &mut HarnessConfig, args: &HarnessArgs) {
    if let Some(url) = &args.base_url {
        config.base_url.clone_from(url);
    }
    if let Some(ms) = args.timeout {
        config.timeout_ms = ms;
    }
    if let Some(retries) = args.retries {
        config.retries = Some(retries);
    }
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if let Some(headless) = args.headless_override() {
        config.headless = headless;
    }
    if let Some(seed) = args.seed {
        config.seed = seed.into();
    }
    if let Some(url) = &args.backend_url {
        config.backend_url.clone_from(url);
    }
    if args.update_snapshots {
        config.update_snapshots = true;
    }
    if let Some(dir) = &args.output {
        config.output_dir.clone_from(dir);
    }
    if args.fail_fast {
        config.fail_fast = true;
    }
}

/// Filter from the selection flags
#[must_use]
pub fn scenario_filter(select: &SelectArgs) -> ScenarioFilter {
    let mut filter = ScenarioFilter::all();
    for tag in &select.tags {
        filter = filter.with_tag(tag.clone());
    }
    if let Some(suite) = &select.suite {
        filter = filter.with_suite(suite.clone());
    }
    if let Some(grep) = &select.grep {
        filter = filter.with_grep(grep.clone());
    }
    filter
}

/// Driver factory for `kind`; the mock runs the sample to-do app.
///
/// With the service seed the mock's items come from the backend's
/// `GET /items`, fetched once per run; an unreachable backend yields an
/// empty list.
pub async fn driver_factory(kind: DriverKind, config: &HarnessConfig) -> CliResult<Arc<dyn DriverFactory>> {
    match kind {
        DriverKind::Mock => {
            let seed = config.seed;
            let backend = match seed {
                SeedMode::Service => {
                    let client = BackendClient::new(&config.backend_url, Duration::from_millis(config.timeout_ms));
                    let items = client.items_or_empty().await;
                    info!(url = %client.items_url(), items = items.len(), "seeded from backend");
                    Some(items)
                }
                SeedMode::Static => None,
            };
            Ok(Arc::new(MockDriverFactory::new("mock", move || {
                Box::new(TodoApp::seeded(seed, backend.clone()))
            })))
        }
        DriverKind::Chromium => chromium_factory(),
    }
}

#[cfg(feature = "browser")]
fn chromium_factory() -> CliResult<Arc<dyn DriverFactory>> {
    Ok(Arc::new(pageflow::ChromiumDriverFactory::new()))
}

#[cfg(not(feature = "browser"))]
fn chromium_factory() -> CliResult<Arc<dyn DriverFactory>> {
    Err(CliError::config(
        "the chromium driver needs pageflow-cli built with `--features browser`",
    ))
}

/// Save screenshots, then the JSON and JUnit reports, under `dir`
pub fn write_artifacts(run: &mut RunReport, dir: &Path) -> CliResult<()> {
    std::fs::create_dir_all(dir)?;
    let shots = run.save_screenshots(dir)?;
    run.write_json(&dir.join(JSON_REPORT))
        .map_err(|e| CliError::report_generation(e.to_string()))?;
    run.write_junit(&dir.join(JUNIT_REPORT))
        .map_err(|e| CliError::report_generation(e.to_string()))?;
    debug!(dir = %dir.display(), screenshots = shots, "wrote reports");
    Ok(())
}

/// The run report in `format`
pub fn render_report(run: &RunReport, format: ReportFormat) -> CliResult<String> {
    Ok(match format {
        ReportFormat::Text => run.render_text(),
        ReportFormat::Json => {
            let mut json = run.to_json()?;
            json.push('\n');
            json
        }
        ReportFormat::Junit => run.render_junit(),
    })
}

/// Selected scenarios of the built-in catalog
#[must_use]
pub fn select_scenarios(select: &SelectArgs) -> Vec<Arc<dyn Scenario>> {
    todo_catalog().select(&scenario_filter(select))
}

/// One `id [tags]` line per scenario, or a JSON array
pub fn render_list(scenarios: &[Arc<dyn Scenario>], json: bool) -> CliResult<String> {
    if json {
        let entries: Vec<serde_json::Value> = scenarios
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id(),
                    "suite": s.suite(),
                    "name": s.name(),
                    "tags": s.tags(),
                })
            })
            .collect();
        let mut out = serde_json::to_string_pretty(&entries).map_err(pageflow::PageflowError::from)?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    for s in scenarios {
        out.push_str(&s.id());
        if !s.tags().is_empty() {
            out.push_str(&format!(" [{}]", s.tags().join(", ")));
        }
        out.push('\n');
    }
    Ok(out)
}

/// Effective configuration as YAML or JSON
pub fn render_config(config: &HarnessConfig, json: bool) -> CliResult<String> {
    if json {
        let mut out = serde_json::to_string_pretty(config).map_err(pageflow::PageflowError::from)?;
        out.push('\n');
        Ok(out)
    } else {
        Ok(config.to_yaml()?)
    }
}

/// Runs the built-in catalog for `pageflow test`
#[derive(Debug)]
pub struct TestRunner {
    config: CliConfig,
}

impl TestRunner {
    /// Create a new test runner
    #[must_use]
    pub const fn new(config: CliConfig) -> Self {
        Self { config }
    }

    /// Run the selected scenarios and write the reports
    pub async fn run(&self, args: &TestArgs) -> CliResult<RunReport> {
        let harness_config = resolve_harness_config(&args.harness)?;
        let factory = driver_factory(args.driver, &harness_config).await?;
        let output_dir = harness_config.output_dir.clone();

        let reporter = ProgressReporter::new(
            self.config.color.should_color(),
            self.config.verbosity.is_quiet(),
        );
        let mut sink = ConsoleSink::new(reporter);
        let harness = Harness::with_factory(harness_config, factory);
        let mut run = harness
            .run_catalog(&todo_catalog(), &scenario_filter(&args.select), &mut sink)
            .await?;

        write_artifacts(&mut run, &output_dir)?;
        Ok(run)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::SeedArg;
    use crate::config::{ColorChoice, Verbosity};
    use crate::handlers::backend_router;
    use pageflow::todo::{TodoItem, TodoList, TodoPage};
    use pageflow::{expect_eq, FnScenario, MemorySink, Session};
    use tempfile::TempDir;

    fn test_args(dir: &Path) -> TestArgs {
        TestArgs {
            select: SelectArgs::default(),
            harness: HarnessArgs {
                timeout: Some(200),
                retries: Some(0),
                workers: Some(2),
                output: Some(dir.to_path_buf()),
                ..HarnessArgs::default()
            },
            driver: DriverKind::Mock,
            format: ReportFormat::Text,
        }
    }

    fn quiet_runner() -> TestRunner {
        TestRunner::new(
            CliConfig::new()
                .with_verbosity(Verbosity::Quiet)
                .with_color(ColorChoice::Never),
        )
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_flags_override_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("pageflow.yaml");
            std::fs::write(&path, "base_url: http://file:1\ntimeout_ms: 900\nretries: 1\n").unwrap();
            let args = HarnessArgs {
                config: Some(path),
                base_url: Some("http://flag:2".to_string()),
                headed: true,
                seed: Some(SeedArg::Service),
                fail_fast: true,
                ..HarnessArgs::default()
            };
            let config = resolve_harness_config(&args).unwrap();
            assert_eq!(config.base_url, "http://flag:2");
            assert_eq!(config.timeout_ms, 900);
            assert!(!config.headless);
            assert_eq!(config.seed, SeedMode::Service);
            assert!(config.fail_fast);
        }

        #[test]
        fn test_invalid_flag_rejected() {
            let args = HarnessArgs {
                timeout: Some(0),
                ..HarnessArgs::default()
            };
            let err = resolve_harness_config(&args).unwrap_err();
            assert!(err.to_string().contains("timeout_ms"));
        }

        #[test]
        fn test_missing_config_file() {
            let args = HarnessArgs {
                config: Some("/no/such/pageflow.yaml".into()),
                ..HarnessArgs::default()
            };
            assert!(resolve_harness_config(&args).is_err());
        }

        #[test]
        fn test_render_config_yaml_and_json() {
            let config = HarnessConfig::default().with_workers(3);
            assert!(render_config(&config, false).unwrap().contains("workers: 3"));
            let json: serde_json::Value = serde_json::from_str(&render_config(&config, true).unwrap()).unwrap();
            assert_eq!(json["workers"], 3);
            assert_eq!(json["seed"], "static");
        }
    }

    mod select_tests {
        use super::*;

        #[test]
        fn test_all_scenarios_selected_by_default() {
            assert_eq!(select_scenarios(&SelectArgs::default()).len(), 10);
        }

        #[test]
        fn test_tag_selection() {
            let select = SelectArgs {
                tags: vec!["edge".to_string()],
                ..SelectArgs::default()
            };
            let picked = select_scenarios(&select);
            assert_eq!(picked.len(), 3);
            assert!(picked.iter().all(|s| s.suite() == "02-advanced"));
        }

        #[test]
        fn test_render_list_text() {
            let select = SelectArgs {
                suite: Some("01-basic".to_string()),
                grep: Some("add".to_string()),
                ..SelectArgs::default()
            };
            let text = render_list(&select_scenarios(&select), false).unwrap();
            assert_eq!(text, "01-basic::should add a new todo [smoke]\n");
        }

        #[test]
        fn test_render_list_json() {
            let text = render_list(&select_scenarios(&SelectArgs::default()), true).unwrap();
            let json: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
            assert_eq!(json.len(), 10);
            assert_eq!(json[0]["suite"], "01-basic");
        }
    }

    mod driver_tests {
        use super::*;

        #[cfg(not(feature = "browser"))]
        #[tokio::test]
        async fn test_chromium_needs_feature() {
            let err = driver_factory(DriverKind::Chromium, &HarnessConfig::default())
                .await
                .err()
                .unwrap();
            assert!(err.to_string().contains("browser"));
        }

        #[test]
        fn test_backend_and_snapshot_flags() {
            let args = HarnessArgs {
                backend_url: Some("http://api.test:9000".to_string()),
                update_snapshots: true,
                ..HarnessArgs::default()
            };
            let config = resolve_harness_config(&args).unwrap();
            assert_eq!(config.backend_url, "http://api.test:9000");
            assert!(config.update_snapshots);
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_run_passes_and_writes_reports() {
            let dir = TempDir::new().unwrap();
            let run = quiet_runner().run(&test_args(dir.path())).await.unwrap();
            assert_eq!(run.total(), 10);
            assert!(run.all_passed(), "{}", run.render_text());
            assert!(dir.path().join("snapshots").join("empty-todo-list.txt").exists());
            assert!(dir.path().join(JSON_REPORT).exists());
            let junit = std::fs::read_to_string(dir.path().join(JUNIT_REPORT)).unwrap();
            assert!(junit.contains("01-basic"));
        }

        /// Serve `items` on an ephemeral port; returns the base URL
        async fn spawn_backend(items: TodoList) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, backend_router(items)).await.unwrap();
            });
            format!("http://{addr}")
        }

        fn backend_check(expected: Vec<String>) -> FnScenario {
            FnScenario::new("seed", "shows backend items", move |s: Arc<Session>| {
                let expected = expected.clone();
                async move {
                    let page = TodoPage::new(&s)?;
                    page.goto().await?;
                    expect_eq(&page.todo_texts().await?, &expected, "texts")
                }
            })
        }

        async fn run_one(config: HarnessConfig, scenario: FnScenario) -> RunReport {
            let factory = driver_factory(DriverKind::Mock, &config).await.unwrap();
            Harness::with_factory(config, factory)
                .run(vec![Arc::new(scenario)], &mut MemorySink::new())
                .await
                .unwrap()
        }

        #[tokio::test]
        async fn test_service_seed_fetches_backend_items() {
            let items = TodoList::from_items(vec![TodoItem::new("From the backend"), TodoItem::done("Already done")]);
            let url = spawn_backend(items).await;
            let config = HarnessConfig::default()
                .with_seed(SeedMode::Service)
                .with_backend_url(url)
                .with_timeout_ms(500)
                .with_poll_interval_ms(5);
            let expected = vec!["From the backend".to_string(), "Already done".to_string()];
            let run = run_one(config, backend_check(expected)).await;
            assert!(run.all_passed(), "{}", run.render_text());
        }

        #[tokio::test]
        async fn test_unreachable_backend_seeds_empty_list() {
            let port = {
                let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
                listener.local_addr().unwrap().port()
            };
            let config = HarnessConfig::default()
                .with_seed(SeedMode::Service)
                .with_backend_url(format!("http://127.0.0.1:{port}"))
                .with_timeout_ms(500)
                .with_poll_interval_ms(5);
            let run = run_one(config, backend_check(Vec::new())).await;
            assert!(run.all_passed(), "{}", run.render_text());
        }

        #[tokio::test]
        async fn test_full_catalog_against_served_backend() {
            let dir = TempDir::new().unwrap();
            let url = spawn_backend(TodoList::from_items(vec![TodoItem::done("Served")])).await;
            let mut args = test_args(dir.path());
            args.harness.seed = Some(SeedArg::Service);
            args.harness.backend_url = Some(url);
            let run = quiet_runner().run(&args).await.unwrap();
            assert!(run.all_passed(), "{}", run.render_text());
        }

        #[tokio::test]
        async fn test_empty_selection() {
            let dir = TempDir::new().unwrap();
            let mut args = test_args(dir.path());
            args.select.grep = Some("no such scenario".to_string());
            let run = quiet_runner().run(&args).await.unwrap();
            assert_eq!(run.total(), 0);
            assert!(run.all_passed());
            assert!(dir.path().join(JSON_REPORT).exists());
        }

        #[test]
        fn test_render_report_formats() {
            let run = RunReport::new();
            assert!(render_report(&run, ReportFormat::Text).unwrap().contains("0 scenarios"));
            assert!(render_report(&run, ReportFormat::Junit).unwrap().starts_with("<?xml"));
            let json: serde_json::Value =
                serde_json::from_str(&render_report(&run, ReportFormat::Json).unwrap()).unwrap();
            assert!(json["scenarios"].as_array().unwrap().is_empty());
        }
    }
}
