//! Acceptance suites for the to-do page.

use std::sync::Arc;

use crate::assertion::{expect_contains, expect_eq, expect_true};
use crate::locator::Selector;
use crate::scenario::{FnScenario, ScenarioCatalog, Step, StepScenario};
use crate::session::Session;
use crate::wait::Postcondition;

use super::page::TodoPage;

/// Suite with add/toggle/delete
pub const BASIC_SUITE: &str = "01-basic";

/// Suite with edge-case input
pub const ADVANCED_SUITE: &str = "02-advanced";

/// Suite comparing page captures with stored baselines
pub const VISUAL_SUITE: &str = "03-visual";

/// Sentence repeated to build the long-text case
pub const LONG_SENTENCE: &str = "This is a very long todo item text that should still be handled correctly by the application without any issues or truncation in the display or functionality";

/// Punctuation-only todo text
pub const SPECIAL_TEXT: &str = r#"!@#$%^&*()_+<>?:"{}|~`-=[]\;',./"#;

/// Every to-do scenario, basic suite first
#[must_use]
pub fn todo_catalog() -> ScenarioCatalog {
    let mut catalog = basic_suite();
    catalog.extend(advanced_suite());
    catalog.extend(visual_suite());
    catalog
}

async fn open(session: &Session) -> crate::PageflowResult<TodoPage<'_>> {
    let page = TodoPage::new(session)?;
    page.goto().await?;
    Ok(page)
}

/// Add, toggle and delete
#[must_use]
pub fn basic_suite() -> ScenarioCatalog {
    let add = StepScenario::new("should add a new todo")
        .in_suite(BASIC_SUITE)
        .tag("smoke")
        .then("open page", |s: Arc<Session>| async move { open(&s).await.map(drop) })
        .step(
            Step::new("add todo", |s: Arc<Session>| async move {
                TodoPage::new(&s)?.add_todo("Buy groceries").await
            })
            .expect(Postcondition::ElementVisible(
                Selector::css(".todo_list_item span").with_text("Buy groceries"),
            )),
        )
        .then("check todo", |s: Arc<Session>| async move {
            let page = TodoPage::new(&s)?;
            page.assert_todo_exists("Buy groceries").await?;
            let index = page.index_of("Buy groceries").await?;
            expect_eq(&page.is_todo_completed(index).await?, &false, "completed")
        });

    let toggle = FnScenario::new(BASIC_SUITE, "should toggle todo completion status", |s: Arc<Session>| async move {
        let page = open(&s).await?;
        let text = "Complete Playwright tests";
        page.add_todo(text).await?;
        let index = page.index_of(text).await?;
        expect_true(!page.is_todo_completed(index).await?, "new todo should be open")?;
        page.toggle_todo(index).await?;
        expect_true(page.is_todo_completed(index).await?, "todo should be completed")?;
        page.toggle_todo(index).await?;
        expect_true(!page.is_todo_completed(index).await?, "todo should be open again")
    })
    .tag("smoke");

    let delete = FnScenario::new(BASIC_SUITE, "should delete a todo", |s: Arc<Session>| async move {
        let page = open(&s).await?;
        let text = "Delete this todo";
        page.add_todo(text).await?;
        let index = page.index_of(text).await?;
        page.delete_todo(index).await?;
        page.assert_todo_does_not_exist(text).await
    })
    .tag("smoke");

    ScenarioCatalog::new().with(add).with(toggle).with(delete)
}

/// Several adds, empty input, long text, punctuation
#[must_use]
pub fn advanced_suite() -> ScenarioCatalog {
    let multiple = FnScenario::new(ADVANCED_SUITE, "should handle multiple todos", |s: Arc<Session>| async move {
        let page = open(&s).await?;
        let initial = page.todo_count().await?;
        let todos = ["First task", "Second task", "Third task"];
        for todo in todos {
            page.add_todo(todo).await?;
        }
        page.assert_todo_count(initial + todos.len()).await?;
        let texts = page.todo_texts().await?;
        for todo in todos {
            expect_contains(&texts, &todo.to_string())?;
        }
        Ok(())
    });

    let empty = FnScenario::new(ADVANCED_SUITE, "should handle empty input", |s: Arc<Session>| async move {
        let page = open(&s).await?;
        let initial = page.todo_texts().await?.len();
        page.add_todo("").await?;
        page.assert_todo_count(initial).await
    })
    .tag("edge");

    let long = FnScenario::new(ADVANCED_SUITE, "should handle very long todo text", |s: Arc<Session>| async move {
        let page = open(&s).await?;
        let text = LONG_SENTENCE.repeat(3);
        page.add_todo(&text).await?;
        page.assert_todo_exists(&text).await
    })
    .tag("edge");

    let special = FnScenario::new(
        ADVANCED_SUITE,
        "should handle special characters in todo text",
        |s: Arc<Session>| async move {
            let page = open(&s).await?;
            page.add_todo(SPECIAL_TEXT).await?;
            page.assert_todo_exists(SPECIAL_TEXT).await
        },
    )
    .tag("edge");

    ScenarioCatalog::new()
        .with(multiple)
        .with(empty)
        .with(long)
        .with(special)
}

/// Baseline names of the visual suite
pub const VISUAL_SNAPSHOTS: [&str; 3] = [
    "empty-todo-list",
    "todo-list-with-items",
    "completed-todo-item",
];

/// Cleared list, two items, one completed item; each compared with its
/// baseline. Every scenario clears the seed first so baselines do not depend
/// on the seed mode.
#[must_use]
pub fn visual_suite() -> ScenarioCatalog {
    let [empty_name, items_name, completed_name] = VISUAL_SNAPSHOTS;

    let empty = FnScenario::new(VISUAL_SUITE, "should match empty todo list snapshot", move |s: Arc<Session>| async move {
        let page = open(&s).await?;
        page.clear_todos().await?;
        s.expect_screenshot(empty_name).await.map(drop)
    })
    .tag("visual");

    let items = FnScenario::new(
        VISUAL_SUITE,
        "should match todo list with items snapshot",
        move |s: Arc<Session>| async move {
            let page = open(&s).await?;
            page.clear_todos().await?;
            page.add_todo("First visual test todo").await?;
            page.add_todo("Second visual test todo").await?;
            page.assert_todo_count(2).await?;
            s.expect_screenshot(items_name).await.map(drop)
        },
    )
    .tag("visual");

    let completed = FnScenario::new(
        VISUAL_SUITE,
        "should match completed todo item snapshot",
        move |s: Arc<Session>| async move {
            let page = open(&s).await?;
            page.clear_todos().await?;
            let text = "Completed todo item";
            page.add_todo(text).await?;
            let index = page.index_of(text).await?;
            page.toggle_todo(index).await?;
            expect_true(page.is_todo_completed(index).await?, "todo should be completed")?;
            s.expect_screenshot(completed_name).await.map(drop)
        },
    )
    .tag("visual");

    ScenarioCatalog::new().with(empty).with(items).with(completed)
}
