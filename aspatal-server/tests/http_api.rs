//! End-to-end tests driving the router with `oneshot`.

use std::sync::Arc;

use aspatal_core::notify::token_from_link;
use aspatal_core::{BootstrapSettings, Config, MemoryStore, Outbox, Role};
use aspatal_server::{router, AppState};
use axum::body::{to_bytes, Body};
use axum::Router;
use http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@aspatal.test";
const ADMIN_PASSWORD: &str = "admin-pass";

struct TestApp {
    router: Router,
    state: AppState,
    outbox: Arc<Outbox>,
}

impl TestApp {
    async fn new() -> Self {
        let mut config = Config::default();
        config.auth.jwt_secret = "integration_test_secret_32_bytes_xx".to_string();
        config.auth.password_hash_cost = 4;

        let outbox = Arc::new(Outbox::new());
        let state = AppState::new(&config, Arc::new(MemoryStore::new()), outbox.clone()).unwrap();
        state
            .auth
            .bootstrap_admin(&BootstrapSettings {
                admin_email: Some(ADMIN_EMAIL.to_string()),
                admin_password: Some(ADMIN_PASSWORD.to_string()),
                ..BootstrapSettings::default()
            })
            .await
            .unwrap();

        Self {
            router: router(state.clone()),
            state,
            outbox,
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    fn verification_token(&self, email: &str) -> String {
        let message = self.outbox.last_to(email).unwrap();
        token_from_link(&message.body).unwrap().to_string()
    }
}

fn registration(email: &str) -> Value {
    json!({
        "email": email,
        "password": "secret123",
        "name": "Sita Sharma",
        "phone_number": "9800000001",
    })
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_verify_login_flow() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(Method::POST, "/api/auth/register", None, Some(registration("Sita@Example.com")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["account"]["email"], "sita@example.com");
    assert_eq!(body["account"]["enabled"], false);
    assert!(body["account"].get("password_hash").is_none());

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "sita@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "account_not_verified");

    let token = app.verification_token("sita@example.com");
    let path = format!("/api/auth/verify?token={}", token);
    let (status, _) = app.call(Method::GET, &path, None, None).await;
    assert_eq!(status, StatusCode::OK);

    // Single use.
    let (status, body) = app.call(Method::GET, &path, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_verification_token");

    let session = app.login("sita@example.com", "secret123").await;
    let (status, body) = app.call(Method::GET, "/api/auth/me", Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "sita@example.com");
    assert_eq!(body["role"], "PATIENT");
}

#[tokio::test]
async fn test_me_requires_session() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthenticated");
}

#[tokio::test]
async fn test_self_registration_is_patient_only() {
    let app = TestApp::new().await;
    let mut request = registration("doc@example.com");
    request["role"] = json!("DOCTOR");

    let (status, body) = app
        .call(Method::POST, "/api/auth/register", None, Some(request))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["category"], "bad_input");
}

#[tokio::test]
async fn test_registration_role_is_case_insensitive() {
    let app = TestApp::new().await;
    let mut request = registration("lower@example.com");
    request["role"] = json!("patient");

    let (status, body) = app
        .call(Method::POST, "/api/auth/register", None, Some(request))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["account"]["role"], "PATIENT");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::new().await;
    let (status, _) = app
        .call(Method::POST, "/api/auth/register", None, Some(registration("dup@example.com")))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .call(Method::POST, "/api/auth/register", None, Some(registration("DUP@example.com")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "duplicate_email");
}

#[tokio::test]
async fn test_malformed_body_is_bad_input() {
    let app = TestApp::new().await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "x@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new().await;

    let wrong_password = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "nope-nope" })),
        )
        .await;
    let unknown_email = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ghost@example.com", "password": "nope-nope" })),
        )
        .await;

    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
}

#[tokio::test]
async fn test_admin_route_access() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/api/admin/employees", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthenticated");

    let doctor = app
        .state
        .auth
        .codec()
        .issue("doc@example.com", Role::Doctor)
        .unwrap()
        .token;
    let (status, body) = app
        .call(Method::GET, "/api/admin/employees", Some(&doctor), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let admin = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (status, body) = app
        .call(Method::GET, "/api/admin/employees", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = app
        .call(Method::GET, "/api/admin/audit?limit=5", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let events: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["event_type"].as_str())
        .collect();
    assert!(events.contains(&"authorization_failure"));
}

#[tokio::test]
async fn test_tampered_token_is_anonymous() {
    let app = TestApp::new().await;
    let mut token = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    token.push('x');

    let (status, _) = app
        .call(Method::GET, "/api/chat/history", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_booking_to_prescription() {
    let app = TestApp::new().await;
    let admin = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/admin/employees",
            Some(&admin),
            Some(json!({
                "email": "doc@example.com",
                "name": "Dr. Hari",
                "role": "DOCTOR",
                "nmc_number": "NMC-1",
                "speciality": "General",
                "opd_fee": 500.0,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["notification_failed"], false);
    assert!(body.get("password").is_none());
    let doctor_id = body["account"]["id"].as_u64().unwrap();

    let (_, body) = app
        .call(
            Method::POST,
            "/api/admin/employees",
            Some(&admin),
            Some(json!({ "email": "desk@example.com", "name": "Front Desk", "role": "RECEPTIONIST" })),
        )
        .await;
    assert_eq!(body["account"]["role"], "RECEPTIONIST");
    let desk = app
        .state
        .auth
        .codec()
        .issue("desk@example.com", Role::Receptionist)
        .unwrap()
        .token;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/receptionist/patients",
            Some(&desk),
            Some(json!({ "email": "walkin@example.com", "name": "Walk In" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let password = body["password"].as_str().unwrap().to_string();
    let patient_id = body["account"]["id"].as_u64().unwrap();
    let patient = app.login("walkin@example.com", &password).await;

    let (status, body) = app
        .call(Method::GET, "/api/patient/doctors", Some(&patient), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["speciality"], "General");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/patient/booking-requests",
            Some(&patient),
            Some(json!({ "doctor_id": doctor_id, "date": "2026-11-02", "time": "10:30:00" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "PENDING");
    let booking_id = body["id"].as_u64().unwrap();

    let approve = format!("/api/receptionist/booking-requests/{}/approve", booking_id);
    let (status, body) = app.call(Method::POST, &approve, Some(&desk), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SCHEDULED");
    let appointment_id = body["id"].as_u64().unwrap();

    let (status, _) = app.call(Method::POST, &approve, Some(&desk), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let doctor = app
        .state
        .auth
        .codec()
        .issue("doc@example.com", Role::Doctor)
        .unwrap()
        .token;
    let (status, body) = app
        .call(
            Method::GET,
            "/api/doctor/appointments?date=2026-11-02",
            Some(&doctor),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/doctor/appointments/{}/status", appointment_id),
            Some(&doctor),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/doctor/prescriptions",
            Some(&doctor),
            Some(json!({ "patient_id": patient_id, "content": "Rest and fluids" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .call(Method::GET, "/api/patient/prescriptions", Some(&patient), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["content"], "Rest and fluids");

    let (_, body) = app
        .call(Method::GET, "/api/patient/medical-history", Some(&patient), None)
        .await;
    assert_eq!(body[0]["status"], "COMPLETED");
}

#[tokio::test]
async fn test_chat_between_patient_and_admin() {
    let app = TestApp::new().await;
    let admin = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    app.call(Method::POST, "/api/auth/register", None, Some(registration("chat@example.com")))
        .await;
    let token = app.verification_token("chat@example.com");
    app.call(Method::GET, &format!("/api/auth/verify?token={}", token), None, None)
        .await;
    let patient = app.login("chat@example.com", "secret123").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/chat/send",
            Some(&patient),
            Some(json!({ "content": "Is the clinic open on Saturday?" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let patient_id = body["sender_id"].as_u64().unwrap();

    let (status, body) = app
        .call(Method::GET, "/api/chat/inbox", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["patient_name"], "Sita Sharma");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/chat/send",
            Some(&admin),
            Some(json!({ "content": "Yes, until noon.", "receiver_id": patient_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app
        .call(Method::GET, "/api/chat/history", Some(&patient), None)
        .await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[1]["content"], "Yes, until noon.");

    let (status, _) = app
        .call(Method::GET, "/api/chat/inbox", Some(&patient), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
