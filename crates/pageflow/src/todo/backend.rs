//! Client for the to-do backend that feeds the service seed.
//!
//! The page asks the backend for `GET /items` on load and shows an empty list
//! when the request fails, so a missing backend is a warning, not an error.

use std::time::Duration;

use tracing::{debug, warn};

use crate::result::{PageflowError, PageflowResult};

use super::model::{TodoItem, TodoList};

/// HTTP client for one backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    /// Client for the backend at `base_url`, giving up after `timeout`
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self::with_client(base_url, client)
    }

    /// Client with a preconfigured reqwest client
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Backend address without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the item listing
    #[must_use]
    pub fn items_url(&self) -> String {
        format!("{}/items", self.base_url)
    }

    /// Fetch `GET /items`
    pub async fn fetch_items(&self) -> PageflowResult<TodoList> {
        let url = self.items_url();
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PageflowError::driver(format!("GET {url} returned {status}")));
        }
        let items: Vec<TodoItem> = resp.json().await?;
        debug!(url = %url, count = items.len(), "fetched backend items");
        Ok(TodoList::from_items(items))
    }

    /// Backend items, or an empty list when the backend cannot be reached
    pub async fn items_or_empty(&self) -> TodoList {
        match self.fetch_items().await {
            Ok(list) => list,
            Err(err) => {
                warn!(url = %self.items_url(), error = %err, "backend unavailable, starting with an empty list");
                TodoList::new()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn client(url: &str) -> BackendClient {
        BackendClient::new(url, Duration::from_millis(500))
    }

    #[test]
    fn test_items_url_joins_once() {
        assert_eq!(client("http://localhost:8000/").items_url(), "http://localhost:8000/items");
        assert_eq!(client("http://localhost:8000").base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_empty() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let backend = client(&format!("http://127.0.0.1:{port}"));
        let err = backend.fetch_items().await.unwrap_err();
        assert_eq!(err.kind(), "http");
        assert!(backend.items_or_empty().await.is_empty());
    }
}
