use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use note_hub::api;
use note_hub_core::auth::NullVerifier;
use note_hub_core::events::{Event, EventBus};
use note_hub_core::storage::FolderStore;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower::util::ServiceExt;
use uuid::Uuid;

fn app(dir: &std::path::Path) -> (Router, EventBus) {
    let store = Arc::new(RwLock::new(FolderStore::new(dir).unwrap()));
    let events = EventBus::new();
    let router = Router::new()
        .merge(api::router(store, events.clone(), Arc::new(NullVerifier)))
        .route("/health", get(|| async { "OK" }));
    (router, events)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn id_of(value: &serde_json::Value) -> Uuid {
    value["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn server_health_endpoint() {
    let tempdir = tempfile::tempdir().unwrap();
    let (app, _events) = app(tempdir.path());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(axum::serve(listener, app.into_make_service()).into_future());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let resp = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.text().await.unwrap(), "OK");

    server.abort();
}

#[tokio::test]
async fn root_lifecycle() {
    let tempdir = tempfile::tempdir().unwrap();
    let (app, _events) = app(tempdir.path());

    let (status, body) = send(&app, "POST", "/root", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    let root = id_of(&body);

    let (status, body) = send(&app, "GET", "/root", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(id_of(&body), root);

    let (status, body) = send(&app, "POST", "/root", Some("alice"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("alice"));

    let (status, _) = send(&app, "GET", "/root", Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_and_move_folders() {
    let tempdir = tempfile::tempdir().unwrap();
    let (app, _events) = app(tempdir.path());

    let (_, body) = send(&app, "POST", "/root", Some("alice"), None).await;
    let root = id_of(&body);

    let (status, body) = send(
        &app,
        "POST",
        "/folders",
        Some("alice"),
        Some(serde_json::json!({ "title": "X", "parent_id": root })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "X");
    let x = id_of(&body);

    let (_, body) = send(
        &app,
        "POST",
        "/folders",
        Some("alice"),
        Some(serde_json::json!({ "title": "Y", "parent_id": root })),
    )
    .await;
    let y = id_of(&body);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/folders/{x}/move"),
        Some("alice"),
        Some(serde_json::json!({ "new_parent_id": y })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(
        &app,
        "GET",
        &format!("/folders/{root}/children"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(body["children"], serde_json::json!([y]));

    let (_, body) = send(
        &app,
        "GET",
        &format!("/folders/{y}/children"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(body["children"], serde_json::json!([x]));
}

#[tokio::test]
async fn move_into_descendant_is_bad_request() {
    let tempdir = tempfile::tempdir().unwrap();
    let (app, _events) = app(tempdir.path());

    let (_, body) = send(&app, "POST", "/root", Some("alice"), None).await;
    let root = id_of(&body);
    let (_, body) = send(
        &app,
        "POST",
        "/folders",
        Some("alice"),
        Some(serde_json::json!({ "title": "Work", "parent_id": root })),
    )
    .await;
    let work = id_of(&body);
    let (_, body) = send(
        &app,
        "POST",
        "/folders",
        Some("alice"),
        Some(serde_json::json!({ "title": "Proj", "parent_id": work })),
    )
    .await;
    let proj = id_of(&body);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/folders/{work}/move"),
        Some("alice"),
        Some(serde_json::json!({ "new_parent_id": proj })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("descendant"));
}

#[tokio::test]
async fn item_placement_flow() {
    let tempdir = tempfile::tempdir().unwrap();
    let (app, _events) = app(tempdir.path());

    let (_, body) = send(&app, "POST", "/root", Some("alice"), None).await;
    let root = id_of(&body);
    let (_, body) = send(
        &app,
        "POST",
        "/folders",
        Some("alice"),
        Some(serde_json::json!({ "title": "X", "parent_id": root })),
    )
    .await;
    let x = id_of(&body);
    let (_, body) = send(
        &app,
        "POST",
        "/folders",
        Some("alice"),
        Some(serde_json::json!({ "title": "Y", "parent_id": root })),
    )
    .await;
    let y = id_of(&body);

    let (status, _) = send(
        &app,
        "PUT",
        "/items/item1",
        Some("alice"),
        Some(serde_json::json!({ "folder_id": x })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "PUT",
        "/items/item1",
        Some("alice"),
        Some(serde_json::json!({ "folder_id": y })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(
        &app,
        "GET",
        &format!("/folders/{x}/items"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(body["items"], serde_json::json!([]));
    let (_, body) = send(
        &app,
        "GET",
        &format!("/folders/{y}/items"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(body["items"], serde_json::json!(["item1"]));

    let (status, _) = send(&app, "DELETE", "/items/item1", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, "DELETE", "/items/item1", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("item1"));
}

#[tokio::test]
async fn delete_folder_removes_subtree() {
    let tempdir = tempfile::tempdir().unwrap();
    let (app, _events) = app(tempdir.path());

    let (_, body) = send(&app, "POST", "/root", Some("alice"), None).await;
    let root = id_of(&body);
    let (_, body) = send(
        &app,
        "POST",
        "/folders",
        Some("alice"),
        Some(serde_json::json!({ "title": "Work", "parent_id": root })),
    )
    .await;
    let work = id_of(&body);
    let (_, body) = send(
        &app,
        "POST",
        "/folders",
        Some("alice"),
        Some(serde_json::json!({ "title": "Proj", "parent_id": work })),
    )
    .await;
    let proj = id_of(&body);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/folders/{work}"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/folders/{proj}"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = send(
        &app,
        "GET",
        &format!("/folders/{root}/children"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(body["children"], serde_json::json!([]));
}

#[tokio::test]
async fn cross_user_access_is_forbidden() {
    let tempdir = tempfile::tempdir().unwrap();
    let (app, _events) = app(tempdir.path());

    let (_, body) = send(&app, "POST", "/root", Some("alice"), None).await;
    let root = id_of(&body);

    let (status, _) = send(&app, "GET", &format!("/folders/{root}"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/folders/{root}"),
        Some("bob"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn missing_credentials_are_rejected() {
    let tempdir = tempfile::tempdir().unwrap();
    let (app, _events) = app(tempdir.path());

    let (status, body) = send(&app, "POST", "/root", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn mutations_publish_events() {
    let tempdir = tempfile::tempdir().unwrap();
    let (app, events) = app(tempdir.path());
    let mut rx = events.subscribe();

    let (_, body) = send(&app, "POST", "/root", Some("alice"), None).await;
    let root = id_of(&body);

    match rx.recv().await.unwrap() {
        Event::Created { id } => assert_eq!(id, root),
        other => panic!("unexpected event: {other:?}"),
    }
}
