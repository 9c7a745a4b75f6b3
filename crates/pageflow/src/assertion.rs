//! Checkpoint assertions.
//!
//! Every helper returns `PageflowResult<()>` so scenarios can `?` through
//! checkpoints; a failed check becomes `AssertionFailure`.

use std::fmt::Debug;

use crate::result::{PageflowError, PageflowResult};

/// Assert a condition holds
pub fn expect_true(condition: bool, message: impl AsRef<str>) -> PageflowResult<()> {
    if condition {
        Ok(())
    } else {
        Err(PageflowError::assertion(message.as_ref()))
    }
}

/// Assert two values are equal
pub fn expect_eq<T: PartialEq + Debug>(actual: &T, expected: &T, what: &str) -> PageflowResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(PageflowError::assertion(format!(
            "{what}: expected {expected:?}, got {actual:?}"
        )))
    }
}

/// Assert a collection contains an item
pub fn expect_contains<T: PartialEq + Debug>(items: &[T], item: &T) -> PageflowResult<()> {
    if items.contains(item) {
        Ok(())
    } else {
        Err(PageflowError::assertion(format!(
            "expected {items:?} to contain {item:?}"
        )))
    }
}

/// Assert a collection does not contain an item
pub fn expect_not_contains<T: PartialEq + Debug>(items: &[T], item: &T) -> PageflowResult<()> {
    if items.contains(item) {
        Err(PageflowError::assertion(format!(
            "expected {items:?} not to contain {item:?}"
        )))
    } else {
        Ok(())
    }
}

/// Assert a collection's length
pub fn expect_len<T: Debug>(items: &[T], len: usize) -> PageflowResult<()> {
    if items.len() == len {
        Ok(())
    } else {
        Err(PageflowError::assertion(format!(
            "expected {len} items, got {}: {items:?}",
            items.len()
        )))
    }
}

/// Collects failures instead of stopping at the first one
#[derive(Debug, Default)]
pub struct SoftAssertions {
    failures: Vec<String>,
    checked: usize,
}

impl SoftAssertions {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of any check; non-assertion errors are recorded too
    pub fn check(&mut self, result: PageflowResult<()>) -> &mut Self {
        self.checked += 1;
        if let Err(err) = result {
            self.failures.push(match err {
                PageflowError::AssertionFailure { message } => message,
                other => other.to_string(),
            });
        }
        self
    }

    /// Failures so far
    #[must_use]
    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// Number of checks recorded
    #[must_use]
    pub fn checked(&self) -> usize {
        self.checked
    }

    /// Fail with every collected message, or pass
    pub fn finish(self) -> PageflowResult<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(PageflowError::assertion(format!(
            "{} of {} checks failed: {}",
            self.failures.len(),
            self.checked,
            self.failures.join("; ")
        )))
    }
}
