//! The to-do acceptance suites run end to end through the harness on the
//! mock driver.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;

use pageflow::todo::suites::{visual_suite, VISUAL_SNAPSHOTS};
use pageflow::todo::{todo_catalog, SeedMode, TodoApp, TodoList, TodoPage};
use pageflow::{
    FnScenario, Harness, HarnessConfig, MemorySink, MockDriverFactory, PageflowError, Scenario,
    ScenarioCatalog, ScenarioFilter, ScenarioOutcome, Session,
};
use tempfile::TempDir;

fn config(seed: SeedMode) -> HarnessConfig {
    HarnessConfig::default()
        .with_timeout_ms(200)
        .with_poll_interval_ms(5)
        .with_workers(3)
        .with_seed(seed)
}

fn config_in(seed: SeedMode, output: &Path) -> HarnessConfig {
    config(seed).with_output_dir(output)
}

fn factory(seed: SeedMode, backend: Option<TodoList>) -> MockDriverFactory {
    MockDriverFactory::new("todo", move || Box::new(TodoApp::seeded(seed, backend.clone())))
}

#[tokio::test]
async fn test_all_suites_pass_on_static_seed() {
    let out = TempDir::new().unwrap();
    let harness = Harness::new(config_in(SeedMode::Static, out.path()), factory(SeedMode::Static, None));
    let mut sink = MemorySink::new();
    let run = harness
        .run_catalog(&todo_catalog(), &ScenarioFilter::all(), &mut sink)
        .await
        .unwrap();
    for report in &run.scenarios {
        assert_eq!(report.outcome, ScenarioOutcome::Passed, "{}: {:?}", report.id, report.error);
        assert_eq!(report.attempts, 1);
    }
    assert_eq!(run.total(), 10);
    assert!(run.all_passed());
    assert_eq!(sink.reports.len(), 10);
    for name in VISUAL_SNAPSHOTS {
        assert!(out.path().join("snapshots").join(format!("{name}.txt")).exists());
    }
}

#[tokio::test]
async fn test_all_suites_pass_on_empty_service_seed() {
    let out = TempDir::new().unwrap();
    let harness = Harness::new(config_in(SeedMode::Service, out.path()), factory(SeedMode::Service, None));
    let run = harness
        .run_catalog(&todo_catalog(), &ScenarioFilter::all(), &mut MemorySink::new())
        .await
        .unwrap();
    assert!(run.all_passed(), "{}", run.render_text());
}

#[tokio::test]
async fn test_service_seed_uses_backend_items() {
    let backend = TodoList::new().add("from backend").unwrap();
    let seeded = FnScenario::new("seed", "backend items shown", |s: Arc<Session>| async move {
        let page = TodoPage::new(&s)?;
        page.goto().await?;
        pageflow::expect_eq(&page.todo_texts().await?, &vec!["from backend".to_string()], "texts")
    });
    let harness = Harness::new(config(SeedMode::Service), factory(SeedMode::Service, Some(backend)));
    let run = harness.run(vec![Arc::new(seeded)], &mut MemorySink::new()).await.unwrap();
    assert!(run.all_passed(), "{}", run.render_text());
}

#[tokio::test]
async fn test_select_smoke_suite_only() {
    let harness = Harness::new(config(SeedMode::Static), factory(SeedMode::Static, None));
    let filter = ScenarioFilter::all().with_suite("01-basic").with_grep("toggle");
    let run = harness
        .run_catalog(&todo_catalog(), &filter, &mut MemorySink::new())
        .await
        .unwrap();
    assert_eq!(run.total(), 1);
    assert_eq!(run.scenarios[0].name, "should toggle todo completion status");
}

#[tokio::test]
async fn test_deleting_completed_row_fails_with_target() {
    let scenario = FnScenario::new("edge", "delete completed", |s: Arc<Session>| async move {
        let page = TodoPage::new(&s)?;
        page.goto().await?;
        page.toggle_todo(0).await?;
        page.delete_todo(0).await
    });
    let harness = Harness::new(
        config(SeedMode::Static).with_timeout_ms(30),
        factory(SeedMode::Static, None),
    );
    let run = harness.run(vec![Arc::new(scenario)], &mut MemorySink::new()).await.unwrap();
    let report = &run.scenarios[0];
    assert_eq!(report.outcome, ScenarioOutcome::Failed);
    let error = report.error.as_ref().unwrap();
    assert_eq!(error.kind, "element_not_found");
    assert!(error.target.as_ref().unwrap().contains("todo_list_item_delete"));
    let shot = String::from_utf8(report.screenshot.clone().unwrap().data).unwrap();
    assert!(shot.contains("todo_list_item_completed"));
}

#[tokio::test]
async fn test_catalog_scenarios_are_independent() {
    let mut catalog = ScenarioCatalog::new();
    for i in 0..4 {
        catalog.add(FnScenario::new("iso", format!("add {i}"), move |s: Arc<Session>| async move {
            let page = TodoPage::new(&s)?;
            page.goto().await?;
            page.add_todo(&format!("only {i}")).await?;
            page.assert_todo_count(4).await
        }));
    }
    let harness = Harness::new(config(SeedMode::Static).with_workers(2), factory(SeedMode::Static, None));
    let run = harness
        .run_catalog(&catalog, &ScenarioFilter::all(), &mut MemorySink::new())
        .await
        .unwrap();
    assert!(run.all_passed(), "{}", run.render_text());
    let workers: Vec<usize> = run.scenarios.iter().map(|s| s.worker).collect();
    assert_eq!(workers, vec![0, 1, 0, 1]);
}

#[tokio::test]
async fn test_scenario_errors_keep_their_kind() {
    let scenario = FnScenario::new("edge", "bad index", |s: Arc<Session>| async move {
        let page = TodoPage::new(&s)?;
        page.goto().await?;
        page.index_of("not there").await.map(drop)
    });
    assert_eq!(scenario.id(), "edge::bad index");
    let harness = Harness::new(config(SeedMode::Static), factory(SeedMode::Static, None));
    let run = harness.run(vec![Arc::new(scenario)], &mut MemorySink::new()).await.unwrap();
    let err = run.scenarios[0].error.clone().unwrap();
    assert_eq!(err.kind, PageflowError::assertion("x").kind());
    assert!(!err.timeout);
}

async fn run_visual(config: HarnessConfig, seed: SeedMode, backend: Option<TodoList>) -> pageflow::RunReport {
    Harness::new(config, factory(seed, backend))
        .run_catalog(&visual_suite(), &ScenarioFilter::all(), &mut MemorySink::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_visual_baselines_do_not_depend_on_seed() {
    let out = TempDir::new().unwrap();
    let first = run_visual(config_in(SeedMode::Static, out.path()), SeedMode::Static, None).await;
    assert!(first.all_passed(), "{}", first.render_text());

    let backend = TodoList::new().add("from backend").unwrap().toggle(0).unwrap();
    let second = run_visual(config_in(SeedMode::Service, out.path()), SeedMode::Service, Some(backend)).await;
    assert!(second.all_passed(), "{}", second.render_text());
}

#[tokio::test]
async fn test_visual_mismatch_fails_until_updated() {
    let out = TempDir::new().unwrap();
    let config = config_in(SeedMode::Static, out.path()).with_screenshot_on_failure(false);
    assert!(run_visual(config.clone(), SeedMode::Static, None).await.all_passed());

    let baseline = out.path().join("snapshots").join("todo-list-with-items.txt");
    let tampered = std::fs::read_to_string(&baseline).unwrap().replace("Second", "Third!");
    std::fs::write(&baseline, tampered).unwrap();

    let run = run_visual(config.clone(), SeedMode::Static, None).await;
    let failed: Vec<_> = run.scenarios.iter().filter(|r| r.outcome == ScenarioOutcome::Failed).collect();
    assert_eq!(failed.len(), 1);
    let error = failed[0].error.as_ref().unwrap();
    assert_eq!(error.kind, "snapshot_mismatch");
    assert!(out.path().join("snapshots").join("todo-list-with-items.actual.txt").exists());

    let updated = run_visual(config.clone().with_update_snapshots(true), SeedMode::Static, None).await;
    assert!(updated.all_passed(), "{}", updated.render_text());
    assert!(run_visual(config, SeedMode::Static, None).await.all_passed());
}
