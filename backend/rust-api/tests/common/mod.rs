#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

use quizthon_api::{
    config::Config,
    create_router,
    services::{
        google_verifier::{GoogleAuthError, GoogleIdentity, GoogleVerifier},
        user_store::InMemoryUserStore,
        AppState,
    },
};

/// Accepts credentials of the form `valid:<google id>:<email>:<name>`.
/// `incomplete:<google id>` yields an identity without email or name.
pub struct StubGoogleVerifier;

#[async_trait]
impl GoogleVerifier for StubGoogleVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        let parts: Vec<&str> = id_token.split(':').collect();
        match parts.as_slice() {
            ["valid", google_id, email, name] => Ok(GoogleIdentity {
                google_id: google_id.to_string(),
                email: Some(email.to_string()),
                name: Some(name.to_string()),
                picture: Some(format!("https://img.example/{}.png", google_id)),
            }),
            ["incomplete", google_id] => Ok(GoogleIdentity {
                google_id: google_id.to_string(),
                email: None,
                name: None,
                picture: None,
            }),
            _ => Err(GoogleAuthError::Rejected("bad signature".to_string())),
        }
    }
}

pub fn create_test_state(config: Config) -> Arc<AppState> {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    Arc::new(AppState::new(
        config,
        Arc::new(InMemoryUserStore::new()),
        Some(Arc::new(StubGoogleVerifier)),
    ))
}

pub fn create_test_app() -> Router {
    create_router(create_test_state(Config::for_tests()))
}

/// Serve `router` on an ephemeral local port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, uuid::Uuid::new_v4().simple())
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: Value,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

/// Create an account and return its token.
pub async fn signup(app: &Router, name: &str, email: &str, password: &str) -> String {
    let (status, json) = post_json(
        app,
        "/api/auth/signup",
        serde_json::json!({ "name": name, "email": email, "password": password }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {}", json);
    json["token"].as_str().unwrap().to_string()
}
