use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::user::{GoogleAuthRequest, LoginRequest, ProfileResponse, SignupRequest},
    services::{auth_service::AuthService, AppState},
};

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = AuthService::new(&state).signup(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = AuthService::new(&state).login(req).await?;
    Ok(Json(response))
}

/// POST /api/auth/google
pub async fn google(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<GoogleAuthRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = AuthService::new(&state)
        .google_login(&req.credential)
        .await?;
    Ok(Json(response))
}

/// GET /api/auth/profile
pub async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = AuthService::new(&state).profile(&claims.sub).await?;
    Ok(Json(ProfileResponse { user }))
}
