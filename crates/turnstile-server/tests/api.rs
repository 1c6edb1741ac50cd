//! HTTP surface: registration, task lookup, health and the event stream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use common::{
    VALID_FORM, body_json, build_test_app, build_test_app_with, get, post_form, test_config,
};
use http_body_util::BodyExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;
use turnstile_core::{ExecutionError, RegistrationParams, WorkExecutor};

async fn poll_status(app: &axum::Router, task_id: &str, want: &str) -> serde_json::Value {
    for _ in 0..400 {
        let json = body_json(get(app.clone(), &format!("/task/{task_id}")).await).await;
        if json["task"]["status"] == want {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {task_id} never reached {want}");
}

#[tokio::test]
async fn register_queues_a_task() {
    let app = build_test_app();

    let response = post_form(app.router.clone(), "/register", VALID_FORM).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "task added to queue");
    let task_id = json["task_id"].as_str().unwrap().to_string();
    assert!(task_id.starts_with("task-"));

    let json = poll_status(&app.router, &task_id, "completed").await;
    assert_eq!(json["success"], true);
    assert_eq!(json["task"]["task_id"], task_id);
    assert_eq!(json["task"]["queue_position"], 0);
    assert!(json["task"]["error"].is_null());
    assert!(json["task"]["completed_at"].is_string());

    app.dispatcher.shutdown_and_join().await;
}

#[tokio::test]
async fn register_with_missing_field_is_rejected() {
    let app = build_test_app();

    let response = post_form(
        app.router.clone(),
        "/register",
        "first_name=Ada&last_name=Lovelace&email=ada%40example.com",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"].as_str().unwrap().contains("username"));
    assert!(app.queue.snapshot().await.tasks.is_empty());

    app.dispatcher.shutdown_and_join().await;
}

#[tokio::test]
async fn register_with_malformed_email_is_rejected() {
    let app = build_test_app();

    let response = post_form(
        app.router.clone(),
        "/register",
        "first_name=Ada&last_name=Lovelace&username=ada&email=ada.example.com",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.queue.snapshot().await.tasks.is_empty());

    app.dispatcher.shutdown_and_join().await;
}

#[tokio::test]
async fn unknown_task_returns_404() {
    let app = build_test_app();

    for uri in ["/task/task-01ARZ3NDEKTSV4RRFFQ69G5FAV", "/task/not-a-task-id"] {
        let response = get(app.router.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "NOT_FOUND");
    }

    app.dispatcher.shutdown_and_join().await;
}

struct AlwaysRejects;

#[async_trait]
impl WorkExecutor for AlwaysRejects {
    async fn execute(&self, _params: &RegistrationParams) -> Result<(), ExecutionError> {
        Err(ExecutionError::Rejected("email already registered".into()))
    }
}

#[tokio::test]
async fn failed_registration_is_reported_on_the_task() {
    let app = build_test_app_with(test_config(), Arc::new(AlwaysRejects));

    let json = body_json(post_form(app.router.clone(), "/register", VALID_FORM).await).await;
    let task_id = json["task_id"].as_str().unwrap().to_string();

    let json = poll_status(&app.router, &task_id, "failed").await;
    assert_eq!(json["task"]["error"], "email already registered");

    app.dispatcher.shutdown_and_join().await;
}

#[tokio::test]
async fn health_reports_queue_occupancy() {
    let app = build_test_app();

    let response = get(app.router.clone(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["concurrency_ceiling"], 1);
    assert_eq!(json["running_count"], 0);
    assert_eq!(json["tasks"]["pending"], 0);

    app.dispatcher.shutdown_and_join().await;
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let app = build_test_app();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/register")
        .header(header::ORIGIN, "http://form.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    app.dispatcher.shutdown_and_join().await;
}

#[tokio::test]
async fn cors_headers_only_on_form_api() {
    let app = build_test_app();

    let with_origin = |uri: &str| {
        Request::builder()
            .uri(uri)
            .header(header::ORIGIN, "http://form.example")
            .body(Body::empty())
            .unwrap()
    };

    let task = app
        .router
        .clone()
        .oneshot(with_origin("/task/not-a-task-id"))
        .await
        .unwrap();
    assert_eq!(task.status(), StatusCode::NOT_FOUND);
    assert_eq!(task.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let health = app.router.clone().oneshot(with_origin("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert!(health.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

    app.dispatcher.shutdown_and_join().await;
}

/// Read the next SSE `data:` payload from a streaming body.
async fn next_event(body: &mut Body) -> serde_json::Value {
    let mut buf = String::new();
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
            .await
            .expect("event within 5s")
            .expect("stream still open")
            .unwrap();
        if let Ok(data) = frame.into_data() {
            buf.push_str(std::str::from_utf8(&data).unwrap());
        }
        if let Some(end) = buf.find("\n\n") {
            let event = &buf[..end];
            let data = event
                .lines()
                .find_map(|line| line.strip_prefix("data:"))
                .expect("data line")
                .trim();
            return serde_json::from_str(data).unwrap();
        }
    }
}

#[tokio::test]
async fn event_stream_sends_snapshot_updates_and_heartbeats() {
    let app = build_test_app();
    app.queue
        .submit(RegistrationParams::new("Ada", "Lovelace", "ada", "ada@example.com"))
        .await
        .unwrap();

    let response = get(app.router.clone(), "/events").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    let mut body = response.into_body();

    // Catch-up snapshot already contains the task submitted before connecting.
    let first = next_event(&mut body).await;
    assert_eq!(first["type"], "queue_update");
    assert_eq!(first["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(first["concurrency_ceiling"], 1);

    // Drain updates until the task completes, then expect a heartbeat.
    let mut event = first;
    while event["type"] == "queue_update" && event["tasks"][0]["status"] != "completed" {
        event = next_event(&mut body).await;
    }
    let heartbeat = next_event(&mut body).await;
    assert_eq!(heartbeat, serde_json::json!({"type": "heartbeat"}));

    drop(body);
    app.dispatcher.shutdown_and_join().await;
}

#[tokio::test]
async fn disconnected_event_client_is_unsubscribed() {
    let app = build_test_app();

    let response = get(app.router.clone(), "/events").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.queue.subscriber_count().await, 1);

    drop(response);

    for _ in 0..200 {
        if app.queue.subscriber_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(app.queue.subscriber_count().await, 0);

    let health = body_json(get(app.router.clone(), "/health").await).await;
    assert_eq!(health["subscribers"], 0);

    app.dispatcher.shutdown_and_join().await;
}

#[tokio::test]
async fn shutdown_completes_with_an_event_stream_open() {
    let app = build_test_app();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(turnstile_server::shutdown::serve(
        listener,
        app.router.clone(),
        app.queue.clone(),
        async {
            let _ = stop_rx.await;
        },
    ));

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /events HTTP/1.1\r\nhost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut buf = vec![0u8; 4096];
    let n = tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf))
        .await
        .expect("response within 5s")
        .unwrap();
    assert!(String::from_utf8_lossy(&buf[..n]).contains("200 OK"));
    assert_eq!(app.queue.subscriber_count().await, 1);

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stopped within 5s")
        .unwrap()
        .unwrap();
    assert_eq!(app.queue.subscriber_count().await, 0);

    app.dispatcher.shutdown_and_join().await;
}
