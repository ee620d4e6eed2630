#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use integration_hub::api::{self, AppState};
use integration_hub::config::Config;
use integration_hub::state::SharedState;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "password";

pub const MULTIPART_BOUNDARY: &str = "----integration-hub-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Like [`spawn_app`], with `configure` applied on top of the test defaults.
pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // Cheap hashing keeps signup fast in tests.
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    configure(&mut config);

    let shared = Arc::new(
        SharedState::new(config)
            .await
            .expect("Failed to create shared state"),
    );
    let state = api::create_app_state(shared);
    let router = api::router(state.clone());

    TestApp { router, state }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/auth/login",
                None,
                &json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["data"]["access_token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// Signs up a regular user and returns `(user_id, access_token)`.
    pub async fn regular_user(&self, username: &str) -> (i32, String) {
        let (status, body) = self
            .json(
                "POST",
                "/auth/signup",
                None,
                &json!({
                    "username": username,
                    "password": "correct-horse-battery",
                    "email": format!("{username}@example.com"),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
        let user_id = i32::try_from(body["data"]["user_id"].as_i64().unwrap()).unwrap();

        let token = self.login(username, "correct-horse-battery").await;
        (user_id, token)
    }

    pub async fn admin_id(&self) -> i32 {
        self.state
            .store()
            .get_user_by_username(ADMIN_USERNAME)
            .await
            .unwrap()
            .unwrap()
            .user_id
            .value()
    }

    pub async fn integration_count(&self) -> u64 {
        self.state.store().count_integrations().await.unwrap()
    }

    pub async fn upload(
        &self,
        token: &str,
        field: &str,
        filename: &str,
        bytes: &[u8],
    ) -> (StatusCode, Value) {
        self.send(multipart_request(token, field, filename, bytes))
            .await
    }
}

pub fn multipart_request(token: &str, field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/integrations/bulk-upload")
        .header("Authorization", format!("Bearer {token}"))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
