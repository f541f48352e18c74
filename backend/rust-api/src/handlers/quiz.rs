use axum::{extract::State, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{HistoryResponse, SaveResultRequest, SaveResultResponse},
    services::{quiz_service::QuizService, AppState},
};

/// POST /api/quiz/save-result
pub async fn save_result(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SaveResultRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let quiz_result = QuizService::new(state.users.clone())
        .save_result(&claims.sub, req)
        .await?;

    Ok(Json(SaveResultResponse {
        message: "Quiz result saved successfully!".to_string(),
        quiz_result,
    }))
}

/// GET /api/quiz/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let history = QuizService::new(state.users.clone())
        .history(&claims.sub)
        .await?;
    Ok(Json(HistoryResponse { history }))
}
