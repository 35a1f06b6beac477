//! Handler-level tests against the real router with a scripted dispatcher.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use figment::Figment;
use figment::providers::Serialized;
use http_body_util::BodyExt;
use rollcall::config::Config;
use rollcall::portal::dispatcher::{DispatchReport, DispatchService, RecipientResult};
use rollcall::portal::errors::PortalError;
use rollcall::portal::verify::SendStatus;
use rollcall::roster::{RecipientType, StudentRef};
use rollcall::state::AppState;
use rollcall::web;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const PAST_CUTOVER: &str = "2020-01-01T00:00:00+09:00";
const FUTURE_CUTOVER: &str = "2999-01-01T00:00:00+09:00";

#[derive(Default)]
struct MockDispatch {
    test_calls: Mutex<usize>,
    absence_calls: Mutex<Vec<(Vec<StudentRef>, RecipientType)>>,
}

impl MockDispatch {
    fn test_calls(&self) -> usize {
        *self.test_calls.lock().unwrap()
    }

    fn absence_calls(&self) -> Vec<(Vec<StudentRef>, RecipientType)> {
        self.absence_calls.lock().unwrap().clone()
    }
}

fn sent(name: &str) -> RecipientResult {
    RecipientResult {
        name: name.to_string(),
        status: SendStatus::Sent,
        detail: "ok".into(),
        dialogs_handled: 2,
        dialog_messages: vec!["발송하시겠습니까?".into()],
    }
}

#[async_trait]
impl DispatchService for MockDispatch {
    async fn send_test(&self) -> Result<DispatchReport, PortalError> {
        *self.test_calls.lock().unwrap() += 1;
        Ok(DispatchReport {
            results: vec![sent("민수정")],
        })
    }

    async fn send_absences(
        &self,
        students: Vec<StudentRef>,
        recipient_type: RecipientType,
    ) -> Result<DispatchReport, PortalError> {
        let results = students.iter().map(|s| sent(&s.name)).collect();
        self.absence_calls
            .lock()
            .unwrap()
            .push((students, recipient_type));
        Ok(DispatchReport { results })
    }
}

fn test_config(production_start: &str, webhook: Option<&str>) -> Config {
    let mut defaults = json!({
        "portal_id": "school_admin",
        "portal_password": "secret",
        "production_start": production_start,
    });
    if let Some(url) = webhook {
        defaults["discord_webhook_url"] = json!(url);
    }
    Figment::new()
        .merge(Serialized::defaults(defaults))
        .extract()
        .unwrap()
}

fn build_app(production_start: &str) -> (Router, Arc<MockDispatch>) {
    build_app_with(production_start, None)
}

fn build_app_with(production_start: &str, webhook: Option<&str>) -> (Router, Arc<MockDispatch>) {
    let dispatcher = Arc::new(MockDispatch::default());
    let state = AppState::new(
        Arc::new(test_config(production_start, webhook)),
        Arc::clone(&dispatcher) as Arc<dyn DispatchService>,
    );
    (web::create_router(state), dispatcher)
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

#[tokio::test]
async fn health_reports_mode_and_cutover() {
    let (app, _) = build_app(FUTURE_CUTOVER);
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mode"], "test");
    assert_eq!(body["productionStartDate"], "2999-01-01T00:00:00+09:00");
}

#[tokio::test]
async fn absence_dispatch_in_production_mode() {
    let (app, dispatcher) = build_app(PAST_CUTOVER);
    let (status, body) = post_json(
        app,
        "/api/send-absent-sms",
        json!({
            "absentStudents": [
                { "studentId": "10823", "name": "김민준" },
                { "studentId": "21105", "name": "이서연" }
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["mode"], "production");
    assert_eq!(body["recipientType"], "student_and_parent");
    assert_eq!(body["successful"], 2);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][0]["dialogs_handled"], 2);

    let calls = dispatcher.absence_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.len(), 2);
    assert_eq!(calls[0].1, RecipientType::StudentAndParent);
    assert_eq!(dispatcher.test_calls(), 0);
}

#[tokio::test]
async fn explicit_recipient_type_is_forwarded() {
    let (app, dispatcher) = build_app(PAST_CUTOVER);
    let (status, _) = post_json(
        app,
        "/api/send-absent-sms",
        json!({
            "absentStudents": [{ "studentId": "10823", "name": "김민준" }],
            "recipientType": "parent_only"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(dispatcher.absence_calls()[0].1, RecipientType::ParentOnly);
}

#[tokio::test]
async fn invalid_recipient_type_is_rejected_before_dispatch() {
    let (app, dispatcher) = build_app(PAST_CUTOVER);
    let (status, body) = post_json(
        app,
        "/api/send-absent-sms",
        json!({
            "absentStudents": [{ "studentId": "10823", "name": "김민준" }],
            "recipientType": "everyone"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("everyone"), "got: {error}");
    assert!(error.contains("student_and_parent"), "got: {error}");
    assert_eq!(dispatcher.test_calls(), 0);
    assert!(dispatcher.absence_calls().is_empty());
}

#[tokio::test]
async fn empty_student_list_is_rejected_in_production() {
    let (app, dispatcher) = build_app(PAST_CUTOVER);
    let (status, body) =
        post_json(app, "/api/send-absent-sms", json!({ "absentStudents": [] })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(dispatcher.absence_calls().is_empty());
}

#[tokio::test]
async fn malformed_student_id_is_rejected() {
    let (app, dispatcher) = build_app(PAST_CUTOVER);
    let (status, body) = post_json(
        app,
        "/api/send-absent-sms",
        json!({
            "absentStudents": [{ "studentId": "1082", "name": "김민준" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("1082"));
    assert!(dispatcher.absence_calls().is_empty());
}

#[tokio::test]
async fn pre_cutover_requests_reroute_to_the_test_recipient() {
    let (app, dispatcher) = build_app(FUTURE_CUTOVER);
    let (status, body) = post_json(
        app,
        "/api/send-absent-sms",
        json!({
            "absentStudents": [{ "studentId": "10823", "name": "김민준" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "test");
    assert!(body["note"].as_str().unwrap().contains("2999"));
    assert_eq!(dispatcher.test_calls(), 1);
    assert!(dispatcher.absence_calls().is_empty());
}

#[tokio::test]
async fn test_endpoint_always_uses_the_test_path() {
    let (app, dispatcher) = build_app(PAST_CUTOVER);
    let (status, body) = post_json(app, "/api/test-sms", json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "test");
    assert_eq!(body["results"][0]["name"], "민수정");
    assert_eq!(dispatcher.test_calls(), 1);
}

#[tokio::test]
async fn discord_report_without_webhook_is_unavailable() {
    let (app, _) = build_app(PAST_CUTOVER);
    let (status, body) = post_json(app, "/api/send-discord-report", json!({})).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn discord_report_requires_date_and_sheet_name() {
    let (app, _) = build_app_with(PAST_CUTOVER, Some("https://discord.example/webhook"));
    let (status, body) = post_json(
        app,
        "/api/send-discord-report",
        json!({ "date": "2026-01-07" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("sheetName"));
}
