use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use pretty_assertions::assert_eq;
use refactor_cli::config::ApiConfig;
use refactor_cli::{build_prompt, HttpRewriteClient, RewriteService};
use refactor_graph::ResolutionContext;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

async fn record(State(seen): State<Seen>, headers: &HeaderMap, body: Value) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    seen.lock().unwrap().push((auth, body));
}

async fn start_server() -> (SocketAddr, Seen) {
    let seen: Seen = Arc::default();

    let router = Router::new()
        .route(
            "/refactor",
            post(
                |state: State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    record(state, &headers, body).await;
                    Json(json!({ "refactored_sql": "\n  SELECT Id FROM dbo.Orders;  \n" }))
                },
            ),
        )
        .route(
            "/empty",
            post(|Json(_body): Json<Value>| async move { Json(json!({})) }),
        )
        .route(
            "/broken",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream failure") }),
        )
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, seen)
}

fn client(addr: SocketAddr, path: &str) -> HttpRewriteClient {
    HttpRewriteClient::new(&ApiConfig {
        endpoint: format!("http://{addr}{path}"),
        key: "test-key".into(),
        timeout_secs: 5,
    })
    .unwrap()
}

fn prompt() -> refactor_cli::RefactorPrompt {
    build_prompt(
        "GetOrders",
        "select * from orders",
        &ResolutionContext::new(),
        &BTreeMap::new(),
    )
}

#[tokio::test]
async fn posts_prompt_with_bearer_key_and_trims_answer() {
    let (addr, seen) = start_server().await;

    let sql = client(addr, "/refactor").rewrite(&prompt()).await.unwrap();
    assert_eq!(sql, "SELECT Id FROM dbo.Orders;");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("Bearer test-key"));
    assert_eq!(seen[0].1["proc_name"], "GetOrders");
    assert_eq!(seen[0].1["sql"], "select * from orders");
    assert_eq!(seen[0].1["context"], json!({}));
}

#[tokio::test]
async fn missing_field_falls_back_to_original_sql() {
    let (addr, _seen) = start_server().await;
    let sql = client(addr, "/empty").rewrite(&prompt()).await.unwrap();
    assert_eq!(sql, "select * from orders");
}

#[tokio::test]
async fn error_status_is_an_error() {
    let (addr, _seen) = start_server().await;
    let err = client(addr, "/broken").rewrite(&prompt()).await.unwrap_err();
    assert!(format!("{err:#}").contains("500"));
}
