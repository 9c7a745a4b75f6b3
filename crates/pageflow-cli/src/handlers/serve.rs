//! Serve command handler: the to-do backend stub

use crate::commands::ServeArgs;
use crate::error::{CliError, CliResult};
use axum::{routing::get, Json, Router};
use pageflow::todo::TodoList;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Body of `GET /`
pub const ROOT_GREETING: &str = "hello world";

/// Items served at `/items`; none means an empty list
pub fn load_items(path: Option<&Path>) -> CliResult<TodoList> {
    let Some(path) = path else {
        return Ok(TodoList::new());
    };
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        CliError::invalid_argument(format!("{}: expected a JSON array of items: {e}", path.display()))
    })
}

/// Router with `GET /` and `GET /items`
pub fn backend_router(items: TodoList) -> Router {
    let items = Arc::new(items);
    Router::new()
        .route("/", get(|| async { ROOT_GREETING }))
        .route(
            "/items",
            get(move || {
                let items = Arc::clone(&items);
                async move { Json(items.as_ref().clone()) }
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Format a server URL from host and port
#[must_use]
pub fn format_server_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}

/// Run the stub until interrupted
pub async fn serve(args: &ServeArgs) -> CliResult<()> {
    let items = load_items(args.items.as_deref())?;
    let count = items.len();
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CliError::server(format!("cannot bind {addr}: {e}")))?;

    tracing::info!(%addr, items = count, "backend stub listening");
    eprintln!(
        "Serving to-do backend at {} ({count} items, Ctrl+C to stop)",
        format_server_url(&args.host, args.port)
    );

    axum::serve(listener, backend_router(items))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| CliError::server(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pageflow::todo::TodoItem;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    mod router_tests {
        use super::*;

        #[tokio::test]
        async fn test_root_says_hello() {
            let (status, body) = get_body(backend_router(TodoList::new()), "/").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "hello world");
        }

        #[tokio::test]
        async fn test_items_empty_array() {
            let (status, body) = get_body(backend_router(TodoList::new()), "/items").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "[]");
        }

        #[tokio::test]
        async fn test_items_round_trip_through_model() {
            let list = TodoList::from_items(vec![TodoItem::new("Buy milk"), TodoItem::done("Walk dog")]);
            let (_, body) = get_body(backend_router(list.clone()), "/items").await;
            let parsed: TodoList = serde_json::from_str(&body).unwrap();
            assert_eq!(parsed, list);
            assert!(body.contains("\"completed\":true"));
        }

        #[tokio::test]
        async fn test_unknown_route_is_404() {
            let (status, _) = get_body(backend_router(TodoList::new()), "/nope").await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
    }

    mod load_items_tests {
        use super::*;

        #[test]
        fn test_no_file_is_empty() {
            assert!(load_items(None).unwrap().is_empty());
        }

        #[test]
        fn test_completed_defaults_to_false() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("items.json");
            std::fs::write(&path, r#"[{"text": "a"}, {"text": "b", "completed": true}]"#).unwrap();
            let list = load_items(Some(&path)).unwrap();
            assert_eq!(list.texts(), vec!["a", "b"]);
            assert!(!list.get(0).unwrap().completed);
            assert!(list.get(1).unwrap().completed);
        }

        #[test]
        fn test_bad_json_is_invalid_argument() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("items.json");
            std::fs::write(&path, "{\"text\": 1}").unwrap();
            let err = load_items(Some(&path)).unwrap_err();
            assert!(matches!(err, CliError::InvalidArgument { .. }));
        }

        #[test]
        fn test_missing_file_is_io() {
            let err = load_items(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
            assert!(matches!(err, CliError::Io(_)));
        }
    }

    #[test]
    fn test_format_server_url() {
        assert_eq!(format_server_url("127.0.0.1", 3000), "http://127.0.0.1:3000");
    }
}
