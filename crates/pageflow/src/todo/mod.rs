//! The sample to-do application and its acceptance suites.
//!
//! - [`model`]: the list as a value with pure add/toggle/delete transforms
//! - [`app`]: the page simulated for the mock driver
//! - [`page`]: the page object
//! - [`backend`]: the `GET /items` client behind the service seed
//! - [`suites`]: the `01-basic`, `02-advanced` and `03-visual` scenarios

pub mod app;
pub mod backend;
pub mod model;
pub mod page;
pub mod suites;

pub use app::TodoApp;
pub use backend::BackendClient;
pub use model::{static_seed, IndexOutOfBounds, Rejection, SeedMode, TodoItem, TodoList, STATIC_SEED};
pub use page::{todo_registry, LocatorStyle, TodoPage};
pub use suites::{todo_catalog, visual_suite};
