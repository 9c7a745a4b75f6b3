//! The sample to-do page, simulated for the mock driver.
//!
//! Markup mirrors the real page: an input with class `todo_item_add`, then a
//! `ul.todo_list` whose `li.todo_list_item` rows hold a clickable text span
//! and, for open items only, a `a.todo_list_item_delete` link.

use tracing::debug;

use crate::dialog::DialogHandler;
use crate::driver::Key;
use crate::mock::{AppEvent, VirtualApp, VirtualNode};
use crate::result::PageflowResult;

use super::model::{static_seed, SeedMode, TodoList};

/// Placeholder of the add input
pub const INPUT_PLACEHOLDER: &str = "create a new task";

/// Text of the delete link
pub const DELETE_GLYPH: &str = "🗑️";

/// In-memory to-do page
#[derive(Debug, Clone)]
pub struct TodoApp {
    url: String,
    initial: TodoList,
    list: TodoList,
    input: String,
}

impl TodoApp {
    /// Page whose every load starts from `initial`
    #[must_use]
    pub fn new(initial: TodoList) -> Self {
        Self {
            url: "about:blank".to_string(),
            list: initial.clone(),
            initial,
            input: String::new(),
        }
    }

    /// Page seeded according to `mode`; `backend` is what `GET /items`
    /// returned, if anything
    #[must_use]
    pub fn seeded(mode: SeedMode, backend: Option<TodoList>) -> Self {
        match mode {
            SeedMode::Static => Self::new(static_seed()),
            SeedMode::Service => Self::new(backend.unwrap_or_default()),
        }
    }

    /// Current list state
    #[must_use]
    pub fn list(&self) -> &TodoList {
        &self.list
    }

    fn loaded(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://") || self.url.starts_with("file://")
    }

    fn submit(&mut self) {
        match self.list.add(&self.input) {
            Ok(next) => {
                self.list = next;
                self.input.clear();
            }
            Err(reason) => debug!(%reason, "add ignored"),
        }
    }
}

/// Parse `item-{i}-{part}` handles
fn item_part(handle: &str) -> Option<(usize, &str)> {
    let rest = handle.strip_prefix("item-")?;
    let (index, part) = rest.split_once('-')?;
    Some((index.parse().ok()?, part))
}

impl VirtualApp for TodoApp {
    fn navigate(&mut self, url: &str) -> PageflowResult<()> {
        self.url = url.to_string();
        self.list = self.initial.clone();
        self.input.clear();
        Ok(())
    }

    fn current_url(&self) -> String {
        self.url.clone()
    }

    fn render(&self) -> Vec<VirtualNode> {
        if !self.loaded() {
            return Vec::new();
        }
        let mut nodes = vec![
            VirtualNode::new("page", "div").class("page"),
            VirtualNode::new("input", "input")
                .parent("page")
                .class("todo_item_add")
                .attr("type", "text")
                .attr("placeholder", INPUT_PLACEHOLDER)
                .test_id("todo-input")
                .value(self.input.clone()),
            VirtualNode::new("list", "ul")
                .parent("page")
                .class("todo_list")
                .test_id("todo-list"),
        ];
        for (i, item) in self.list.items().iter().enumerate() {
            let row = format!("item-{i}");
            let mut li = VirtualNode::new(row.clone(), "li")
                .parent("list")
                .class("todo_list_item")
                .test_id("todo-item");
            if item.completed {
                li = li.class("todo_list_item_completed");
            }
            nodes.push(li);
            nodes.push(
                VirtualNode::new(format!("{row}-text"), "span")
                    .parent(row.clone())
                    .test_id("todo-text")
                    .text(item.text.clone()),
            );
            if !item.completed {
                nodes.push(
                    VirtualNode::new(format!("{row}-delete"), "a")
                        .parent(row)
                        .class("todo_list_item_delete")
                        .test_id("todo-delete")
                        .text(DELETE_GLYPH),
                );
            }
        }
        nodes
    }

    fn dispatch(&mut self, handle: &str, event: AppEvent, _dialogs: &DialogHandler) -> PageflowResult<()> {
        match (handle, event) {
            ("input", AppEvent::Fill(value)) => self.input = value,
            ("input", AppEvent::Press(Key::Enter)) => self.submit(),
            (other, AppEvent::Click) => match item_part(other) {
                Some((index, "text")) => {
                    if let Ok(next) = self.list.toggle(index) {
                        self.list = next;
                    }
                }
                Some((index, "delete")) => {
                    if let Ok(next) = self.list.delete(index) {
                        self.list = next;
                    }
                }
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::todo::model::TodoItem;

    fn loaded(list: TodoList) -> TodoApp {
        let mut app = TodoApp::new(list);
        app.navigate("http://localhost:3000/").unwrap();
        app
    }

    fn send(app: &mut TodoApp, handle: &str, event: AppEvent) {
        app.dispatch(handle, event, &DialogHandler::new()).unwrap();
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_blank_before_navigation() {
            assert!(TodoApp::new(static_seed()).render().is_empty());
        }

        #[test]
        fn test_completed_row_has_no_delete() {
            let app = loaded(TodoList::from_items(vec![TodoItem::new("a"), TodoItem::done("b")]));
            let nodes = app.render();
            assert!(nodes.iter().any(|n| n.handle == "item-0-delete"));
            assert!(!nodes.iter().any(|n| n.handle == "item-1-delete"));
            let row = nodes.iter().find(|n| n.handle == "item-1").unwrap();
            assert!(row.classes.contains(&"todo_list_item_completed".to_string()));
        }

        #[test]
        fn test_seed_modes_are_distinct() {
            let backend = TodoList::new().add("from service").unwrap();
            let static_app = TodoApp::seeded(SeedMode::Static, Some(backend.clone()));
            assert_eq!(static_app.list(), &static_seed());
            assert_eq!(TodoApp::seeded(SeedMode::Service, Some(backend.clone())).list(), &backend);
            assert!(TodoApp::seeded(SeedMode::Service, None).list().is_empty());
        }
    }

    mod event_tests {
        use super::*;

        #[test]
        fn test_enter_adds_and_clears() {
            let mut app = loaded(TodoList::new());
            send(&mut app, "input", AppEvent::Fill(" Buy groceries ".into()));
            send(&mut app, "input", AppEvent::Press(Key::Enter));
            assert_eq!(app.list().texts(), vec!["Buy groceries"]);
            assert_eq!(app.input, "");
        }

        #[test]
        fn test_rejected_add_keeps_input() {
            let mut app = loaded(static_seed());
            send(&mut app, "input", AppEvent::Fill("Learn Rust".into()));
            send(&mut app, "input", AppEvent::Press(Key::Enter));
            assert_eq!(app.list().len(), 3);
            assert_eq!(app.input, "Learn Rust");
        }

        #[test]
        fn test_click_text_toggles_and_delete_removes() {
            let mut app = loaded(static_seed());
            send(&mut app, "item-1-text", AppEvent::Click);
            assert!(app.list().get(1).unwrap().completed);
            send(&mut app, "item-0-delete", AppEvent::Click);
            assert_eq!(app.list().texts(), vec!["Write page objects", "Ship the release"]);
        }

        #[test]
        fn test_reload_restores_initial() {
            let mut app = loaded(static_seed());
            send(&mut app, "item-0-delete", AppEvent::Click);
            app.navigate("http://localhost:3000/").unwrap();
            assert_eq!(app.list(), &static_seed());
        }

        #[test]
        fn test_item_part() {
            assert_eq!(item_part("item-12-delete"), Some((12, "delete")));
            assert_eq!(item_part("item-x-text"), None);
            assert_eq!(item_part("input"), None);
        }
    }
}
