use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use super::user_store::{StoreError, UserStore};
use crate::error::ApiError;
use crate::metrics;
use crate::models::{QuizResult, SaveResultRequest};

pub struct QuizService {
    users: Arc<dyn UserStore>,
}

impl QuizService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Record a finished quiz at the front of the user's history.
    pub async fn save_result(
        &self,
        user_id: &str,
        req: SaveResultRequest,
    ) -> Result<QuizResult, ApiError> {
        req.validate()?;

        let result = QuizResult::from_request(req, Utc::now());
        self.users.prepend_result(user_id, &result).await?;

        metrics::record_result_saved(result.difficulty.as_str());
        tracing::info!(
            user_id = %user_id,
            result_id = %result.id,
            percentage = result.percentage,
            "Quiz result saved"
        );

        Ok(result)
    }

    /// The user's results, most recent first.
    pub async fn history(&self, user_id: &str) -> Result<Vec<QuizResult>, ApiError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(user.quiz_history)
    }
}
