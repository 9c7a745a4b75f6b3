//! To-do list state.
//!
//! The list is a plain value owned by the caller. Every transform consumes a
//! borrowed list and returns the next one, so there is no shared store to
//! keep in sync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One to-do entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Trimmed, non-empty text
    pub text: String,
    /// Whether the item is done
    #[serde(default)]
    pub completed: bool,
}

impl TodoItem {
    /// Open item
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
        }
    }

    /// Completed item
    #[must_use]
    pub fn done(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: true,
        }
    }
}

/// Why an add left the list unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Empty after trimming
    Empty,
    /// Same trimmed text already present
    Duplicate,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "text is empty"),
            Self::Duplicate => write!(f, "text already exists"),
        }
    }
}

/// Index outside the list
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("index {index} out of bounds for list of {len}")]
pub struct IndexOutOfBounds {
    /// Requested index
    pub index: usize,
    /// List length
    pub len: usize,
}

/// Ordered to-do list, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoList {
    items: Vec<TodoItem>,
}

impl TodoList {
    /// Empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// List with the given items, in order
    #[must_use]
    pub fn from_items(items: Vec<TodoItem>) -> Self {
        Self { items }
    }

    /// Items in display order
    #[must_use]
    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TodoItem> {
        self.items.get(index)
    }

    /// Index of the first item with exactly `text`
    #[must_use]
    pub fn position(&self, text: &str) -> Option<usize> {
        self.items.iter().position(|i| i.text == text)
    }

    /// Texts in display order
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.text.as_str()).collect()
    }

    /// Prepend a new open item.
    ///
    /// Text is trimmed first; empty text and exact (case-sensitive)
    /// duplicates are rejected without changing anything.
    pub fn add(&self, text: &str) -> Result<Self, Rejection> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Rejection::Empty);
        }
        if self.position(text).is_some() {
            return Err(Rejection::Duplicate);
        }
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.push(TodoItem::new(text));
        items.extend(self.items.iter().cloned());
        Ok(Self { items })
    }

    /// Flip `completed` at `index`
    pub fn toggle(&self, index: usize) -> Result<Self, IndexOutOfBounds> {
        self.check(index)?;
        let mut items = self.items.clone();
        items[index].completed = !items[index].completed;
        Ok(Self { items })
    }

    /// Remove the item at `index`; later items shift down by one
    pub fn delete(&self, index: usize) -> Result<Self, IndexOutOfBounds> {
        self.check(index)?;
        let mut items = self.items.clone();
        items.remove(index);
        Ok(Self { items })
    }

    fn check(&self, index: usize) -> Result<(), IndexOutOfBounds> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(IndexOutOfBounds {
                index,
                len: self.items.len(),
            })
        }
    }
}

/// Where the initial list comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedMode {
    /// Fixed demo list
    #[default]
    Static,
    /// Whatever the backend's `GET /items` returns (empty if unreachable)
    Service,
}

impl SeedMode {
    /// Mode name as used in config files and flags
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for SeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "service" => Ok(Self::Service),
            other => Err(format!("unknown seed mode '{other}' (expected static or service)")),
        }
    }
}

/// Texts of the static demo list, in display order
pub const STATIC_SEED: [&str; 3] = ["Learn Rust", "Write page objects", "Ship the release"];

/// The static demo list
#[must_use]
pub fn static_seed() -> TodoList {
    TodoList::from_items(STATIC_SEED.iter().map(|t| TodoItem::new(*t)).collect())
}
