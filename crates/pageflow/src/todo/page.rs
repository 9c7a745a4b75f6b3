//! Page object for the to-do page.

use std::fmt;

use crate::locator::{CssIdStrategy, Locator, LocatorRegistry, TestIdStrategy};
use crate::page_object::{BasePage, PageObject, Submit};
use crate::result::{PageflowError, PageflowResult};
use crate::session::Session;
use crate::wait::{Postcondition, Waiter};

/// Element names every to-do registry defines
pub const ELEMENTS: [&str; 5] = ["input", "list", "item", "text", "delete"];

/// Class carried by completed rows
pub const COMPLETED_CLASS: &str = "todo_list_item_completed";

/// Which selector convention the page object resolves through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LocatorStyle {
    /// Class names from the page's stylesheet
    #[default]
    Css,
    /// `data-testid` attributes prefixed with `todo-`
    TestId,
}

impl fmt::Display for LocatorStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css => write!(f, "css"),
            Self::TestId => write!(f, "test-id"),
        }
    }
}

/// Locator registry for the to-do page
pub fn todo_registry(style: LocatorStyle) -> PageflowResult<LocatorRegistry> {
    let builder = match style {
        LocatorStyle::Css => LocatorRegistry::builder("todo").strategy(
            CssIdStrategy::new()
                .with("input", ".todo_item_add")
                .with("list", ".todo_list")
                .with("item", ".todo_list_item")
                .with("text", "span")
                .with("delete", ".todo_list_item_delete"),
        ),
        LocatorStyle::TestId => LocatorRegistry::builder("todo").strategy(TestIdStrategy::with_prefix("todo-")),
    };
    ELEMENTS
        .iter()
        .fold(builder, |b, name| b.element(*name))
        .build()
}

/// The to-do list page
#[derive(Debug)]
pub struct TodoPage<'s> {
    base: BasePage<'s>,
}

impl<'s> TodoPage<'s> {
    /// Page object using class selectors
    pub fn new(session: &'s Session) -> PageflowResult<Self> {
        Self::with_style(session, LocatorStyle::Css)
    }

    /// Page object using the given selector convention
    pub fn with_style(session: &'s Session, style: LocatorStyle) -> PageflowResult<Self> {
        Ok(Self {
            base: BasePage::new(session, todo_registry(style)?, "/"),
        })
    }

    /// Shared page machinery
    #[must_use]
    pub fn base(&self) -> &BasePage<'s> {
        &self.base
    }

    fn item_texts(&self) -> Locator {
        self.base
            .locator("item")
            .child("text", self.base.locators().get("text").clone())
    }

    /// Load the page and wait for the add input
    pub async fn goto(&self) -> PageflowResult<()> {
        self.base.open().await?;
        self.base.wait_visible("input").await
    }

    /// Type `text` into the add input and press Enter
    pub async fn add_todo(&self, text: &str) -> PageflowResult<()> {
        self.base.fill_and_submit("input", text, Submit::Enter).await
    }

    /// Current value of the add input
    pub async fn input_value(&self) -> PageflowResult<String> {
        Ok(self.base.value_of("input").await?.unwrap_or_default())
    }

    /// Item texts in display order
    pub async fn todo_texts(&self) -> PageflowResult<Vec<String>> {
        self.base.texts_of(self.item_texts()).await
    }

    /// Index of the item showing exactly `text`
    pub async fn index_of(&self, text: &str) -> PageflowResult<usize> {
        let texts = self.todo_texts().await?;
        texts
            .iter()
            .position(|t| t == text)
            .ok_or_else(|| PageflowError::assertion(format!("no todo {text:?} in {texts:?}")))
    }

    /// Number of rows
    pub async fn todo_count(&self) -> PageflowResult<usize> {
        self.base.count_of("item").await
    }

    /// Click the text of row `index`
    pub async fn toggle_todo(&self, index: usize) -> PageflowResult<()> {
        self.base.click(self.base.nth_child("item", index, "text")).await
    }

    /// Click the delete link of row `index`; completed rows have none
    pub async fn delete_todo(&self, index: usize) -> PageflowResult<()> {
        self.base.click(self.base.nth_child("item", index, "delete")).await
    }

    /// Whether row `index` is marked completed
    pub async fn is_todo_completed(&self, index: usize) -> PageflowResult<bool> {
        self.base.has_class(self.base.nth("item", index), COMPLETED_CLASS).await
    }

    /// Delete every row, reopening completed ones first since they have no
    /// delete link
    pub async fn clear_todos(&self) -> PageflowResult<()> {
        let mut remaining = self.todo_count().await?;
        while remaining > 0 {
            if self.is_todo_completed(0).await? {
                self.toggle_todo(0).await?;
            }
            self.delete_todo(0).await?;
            remaining -= 1;
            self.assert_todo_count(remaining).await?;
        }
        Ok(())
    }

    /// Wait until an item shows exactly `text`
    pub async fn assert_todo_exists(&self, text: &str) -> PageflowResult<()> {
        self.eventually(|texts| texts.iter().any(|t| t == text), || format!("todo {text:?} to exist"))
            .await
    }

    /// Wait until no item shows `text`
    pub async fn assert_todo_does_not_exist(&self, text: &str) -> PageflowResult<()> {
        self.eventually(|texts| !texts.iter().any(|t| t == text), || format!("todo {text:?} to be gone"))
            .await
    }

    /// Wait until exactly `count` rows are shown
    pub async fn assert_todo_count(&self, count: usize) -> PageflowResult<()> {
        let condition = Postcondition::ElementCount(self.base.locators().get("item").clone(), count);
        match self.base.wait_for(&condition).await {
            Err(PageflowError::WaitTimeout { .. }) => Err(PageflowError::assertion(format!(
                "expected {count} todos, found {}",
                self.todo_count().await?
            ))),
            other => other,
        }
    }

    async fn eventually<P, D>(&self, predicate: P, describe: D) -> PageflowResult<()>
    where
        P: Fn(&[String]) -> bool,
        D: Fn() -> String,
    {
        let mut waiter = Waiter::new(&self.base.session().wait_options());
        loop {
            let texts = self.todo_texts().await?;
            if predicate(&texts) {
                return Ok(());
            }
            if !waiter.tick().await {
                return Err(PageflowError::assertion(format!(
                    "expected {} within {}ms; todos are {texts:?}",
                    describe(),
                    waiter.timeout_ms()
                )));
            }
        }
    }
}

impl PageObject for TodoPage<'_> {
    fn page_name(&self) -> &str {
        self.base.page_name()
    }

    fn url_pattern(&self) -> &str {
        self.base.url_pattern()
    }

    fn locators(&self) -> &LocatorRegistry {
        self.base.locators()
    }
}
