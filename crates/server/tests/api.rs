//! End-to-end API tests over the full router with an in-memory store.

#![allow(clippy::unwrap_used)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crestway_server::config::{AppConfig, AssistantConfig, AuthConfig, EmailConfig};
use crestway_server::db::{ApplicationStore, RepositoryError};
use crestway_server::models::{ApplicationRecord, NewApplication};
use crestway_server::state::AppState;

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Default)]
struct MemoryApplicationStore {
    records: Mutex<Vec<ApplicationRecord>>,
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn create(&self, new: NewApplication) -> Result<ApplicationRecord, RepositoryError> {
        let record = ApplicationRecord {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            dob: new.dob,
            nic: new.nic,
            gender: new.gender,
            email: new.email,
            phone: new.phone,
            whatsapp: new.whatsapp,
            address: new.address,
            school: new.school,
            ol_year: new.ol_year,
            ol_results: new.ol_results,
            parent_name: new.parent_name,
            parent_phone: new.parent_phone,
            program: new.program,
            academy: new.academy,
            processed: false,
            created_at: Utc::now(),
        };

        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let mut records = self.records.lock().unwrap().clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn mark_processed(&self, id: Uuid) -> Result<ApplicationRecord, RepositoryError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RepositoryError::NotFound)?;
        record.processed = true;
        Ok(record.clone())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count_total(&self) -> Result<i64, RepositoryError> {
        Ok(i64::try_from(self.records.lock().unwrap().len()).unwrap())
    }

    async fn count_unprocessed(&self) -> Result<i64, RepositoryError> {
        Ok(i64::try_from(
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| !r.processed)
                .count(),
        )
        .unwrap())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

// =============================================================================
// Test harness
// =============================================================================

const ADMIN_EMAIL: &str = "admin@crestway.edu";
const ADMIN_PASSWORD: &str = "correct horse battery staple";
const JWT_SECRET: &str = "0123456789abcdef0123456789abcdef";

fn test_config() -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://unused"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        auth: AuthConfig {
            jwt_secret: Some(SecretString::from(JWT_SECRET)),
            admin_email: Some(ADMIN_EMAIL.to_string()),
            admin_password: Some(SecretString::from(ADMIN_PASSWORD)),
        },
        email: EmailConfig {
            smtp_host: None,
            smtp_port: 587,
            smtp_secure: false,
            smtp_username: None,
            smtp_password: None,
            from_address: None,
            allow_invalid_certs: false,
            test_mode: false,
            test_dir: std::env::temp_dir(),
            debug: false,
            // No recipients configured: dispatch short-circuits to {0, 0}
            recipients: String::new(),
            tls_fallback_patterns: Vec::new(),
        },
        assistant: AssistantConfig {
            // No API key: /api/chat with a non-empty conversation is a 500
            api_key: None,
            base_url: "http://127.0.0.1:9".to_string(),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(1),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
    }
}

fn app() -> Router {
    let store = Arc::new(MemoryApplicationStore::default());
    crestway_server::app(AppState::new(test_config(), store))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            &json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

fn sample_submission() -> Value {
    json!({
        "firstName": "Amara",
        "lastName": "Perera",
        "email": "amara@example.com",
        "phone": "+94 77 123 4567",
        "program": "Science",
        "academy": "Main Campus",
    })
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn health_endpoints() {
    let app = app();

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_returns_identity_and_token() {
    let app = app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            &json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["user"]["name"], "Admin");
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);
    assert_eq!(body["user"]["role"], "admin");
    assert!(!body["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn login_failure_is_uniform_401() {
    let app = app();

    for payload in [
        json!({"email": ADMIN_EMAIL, "password": "wrong"}),
        json!({"email": "other@crestway.edu", "password": ADMIN_PASSWORD}),
    ] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/auth/login", &payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["message"], "invalid email or password");
    }
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = app();

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/applications")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(authed_request("GET", "/api/applications", "not.a.token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submission_validation_names_missing_field() {
    let app = app();

    let mut payload = sample_submission();
    payload["program"] = json!("");

    let response = app
        .oneshot(json_request("POST", "/api/applications", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("program"));
}

#[tokio::test]
async fn submission_succeeds_without_notification_config() {
    let app = app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/applications",
            &sample_submission(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert!(!body["id"].as_str().unwrap().is_empty());
    assert_eq!(body["notifications"]["sent"], 0);
    assert_eq!(body["notifications"]["failed"], 0);

    // The submission is visible to the admin
    let token = login(&app).await;
    let response = app
        .oneshot(authed_request("GET", "/api/applications", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["firstName"], "Amara");
    assert_eq!(list[0]["processed"], false);
}

#[tokio::test]
async fn processed_and_delete_lifecycle() {
    let app = app();
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/applications",
            &sample_submission(),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed_request(
            "PATCH",
            &format!("/api/applications/{id}/processed"),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["processed"], true);

    let response = app
        .clone()
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/applications/{id}"),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Second delete is a 404
    let response = app
        .oneshot(authed_request(
            "DELETE",
            &format!("/api/applications/{id}"),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_id_is_404() {
    let app = app();
    let token = login(&app).await;

    let response = app
        .oneshot(authed_request(
            "PATCH",
            &format!("/api/applications/{}/processed", Uuid::new_v4()),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_reflect_processed_flag() {
    let app = app();
    let token = login(&app).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/applications",
                &sample_submission(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/stats", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["applications"], 2);
    assert_eq!(body["unprocessed"], 2);
}

#[tokio::test]
async fn chat_rejects_empty_conversation() {
    let app = app();

    let response = app
        .oneshot(json_request("POST", "/api/chat", &json!({"messages": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_body_is_rejected_before_parsing() {
    let app = app();

    // One text field pushes the payload past the cap; the request must die
    // at the body limit, not in the JSON parser or the handler.
    let payload = json!({
        "messages": [{"role": "user", "content": "x".repeat(crestway_server::MAX_BODY_BYTES)}]
    });

    let response = app
        .oneshot(json_request("POST", "/api/chat", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn chat_without_api_key_is_server_fault() {
    let app = app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/chat",
            &json!({"messages": [{"role": "user", "content": "hello"}]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Internal server error");
}
