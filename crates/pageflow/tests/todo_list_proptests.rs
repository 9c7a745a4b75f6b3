//! Property-based tests for the to-do list transforms

use pageflow::todo::{static_seed, Rejection, TodoItem, TodoList};
use proptest::prelude::*;

// ===== Strategy definitions =====

/// Text that is non-empty after trimming
fn text_strategy() -> impl Strategy<Value = String> {
    "[ \t]{0,2}[a-zA-Z0-9!@#$%^&*()_+<>?:{}|~-]{1,24}[ \t]{0,2}"
}

/// Whitespace-only text
fn blank_strategy() -> impl Strategy<Value = String> {
    "[ \t\n]{0,6}"
}

/// A list built from distinct adds, some toggled
fn list_strategy() -> impl Strategy<Value = TodoList> {
    (
        prop::collection::vec(text_strategy(), 0..12),
        prop::collection::vec(any::<bool>(), 12),
    )
        .prop_map(|(texts, done)| {
            let mut list = TodoList::new();
            for text in texts {
                if let Ok(next) = list.add(&text) {
                    list = next;
                }
            }
            let items = list
                .items()
                .iter()
                .zip(done)
                .map(|(item, completed)| TodoItem {
                    text: item.text.clone(),
                    completed,
                })
                .collect();
            TodoList::from_items(items)
        })
}

// ===== Add =====

proptest! {
    /// A fresh text lands first and open
    #[test]
    fn prop_add_prepends_open_item(list in list_strategy(), text in text_strategy()) {
        prop_assume!(list.position(text.trim()).is_none());
        let next = list.add(&text).unwrap();
        prop_assert_eq!(next.len(), list.len() + 1);
        prop_assert_eq!(next.get(0), Some(&TodoItem::new(text.trim())));
        prop_assert_eq!(&next.items()[1..], list.items());
    }

    /// Adding the same text twice leaves the length unchanged the second time
    #[test]
    fn prop_duplicate_add_is_rejected(list in list_strategy(), text in text_strategy()) {
        let once = match list.add(&text) {
            Ok(next) => next,
            Err(_) => list.clone(),
        };
        prop_assert_eq!(once.add(&text), Err(Rejection::Duplicate));
        prop_assert_eq!(once.add(&format!("  {text}  ")), Err(Rejection::Duplicate));
    }

    /// Blank text never changes the list
    #[test]
    fn prop_blank_add_is_rejected(list in list_strategy(), blank in blank_strategy()) {
        prop_assert_eq!(list.add(&blank), Err(Rejection::Empty));
    }
}

// ===== Toggle and delete =====

proptest! {
    /// Toggling twice restores the item; others never move
    #[test]
    fn prop_toggle_twice_is_identity(list in list_strategy(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!list.is_empty());
        let i = pick.index(list.len());
        let once = list.toggle(i).unwrap();
        prop_assert_eq!(once.get(i).unwrap().completed, !list.get(i).unwrap().completed);
        for j in (0..list.len()).filter(|&j| j != i) {
            prop_assert_eq!(once.get(j), list.get(j));
        }
        prop_assert_eq!(once.toggle(i).unwrap(), list);
    }

    /// Delete removes exactly one item and keeps the relative order
    #[test]
    fn prop_delete_preserves_order(list in list_strategy(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!list.is_empty());
        let i = pick.index(list.len());
        let next = list.delete(i).unwrap();
        prop_assert_eq!(next.len(), list.len() - 1);
        let mut expected = list.items().to_vec();
        expected.remove(i);
        prop_assert_eq!(next.items(), expected.as_slice());
    }

    /// Out-of-range indices are errors, never panics
    #[test]
    fn prop_out_of_bounds_reported(list in list_strategy(), extra in 0usize..5) {
        let index = list.len() + extra;
        prop_assert_eq!(list.toggle(index).unwrap_err().index, index);
        prop_assert_eq!(list.delete(index).unwrap_err().len, list.len());
    }
}

#[test]
fn test_three_adds_on_seed_give_six() {
    let mut list = static_seed();
    for text in ["First task", "Second task", "Third task"] {
        list = list.add(text).unwrap();
    }
    assert_eq!(list.len(), 6);
    for text in ["First task", "Second task", "Third task"] {
        assert!(list.position(text).is_some());
    }
}
