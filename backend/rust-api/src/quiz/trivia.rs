use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::models::trivia::TriviaResponse;
use crate::models::{Category, Difficulty, Question};

pub const DEFAULT_TRIVIA_BASE: &str = "https://opentdb.com/api.php";

#[derive(Debug, Error)]
pub enum TriviaError {
    #[error("invalid trivia source url: {0}")]
    Url(#[from] url::ParseError),

    #[error("trivia source unreachable: {0}")]
    Network(#[from] reqwest::Error),

    #[error("trivia source returned no questions (response code {0})")]
    NoResults(i32),

    #[error("trivia source returned {got} of {expected} questions")]
    ShortBatch { expected: usize, got: usize },
}

/// What to ask the trivia source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionQuery {
    pub amount: usize,
    pub category: Category,
    pub difficulty: Difficulty,
}

/// A source of multiple-choice question batches.
#[async_trait]
pub trait TriviaSource: Send + Sync {
    /// Fetch exactly `query.amount` decoded questions.
    async fn fetch(&self, query: &QuestionQuery) -> Result<Vec<Question>, TriviaError>;
}

/// Client for the Open Trivia DB `api.php` endpoint.
#[derive(Debug, Clone)]
pub struct OpenTdbClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenTdbClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn request_url(&self, query: &QuestionQuery) -> Result<Url, TriviaError> {
        let mut url = Url::parse(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair("amount", &query.amount.to_string())
            .append_pair("category", &query.category.id.to_string())
            .append_pair("difficulty", query.difficulty.as_str())
            .append_pair("type", "multiple");
        Ok(url)
    }
}

#[async_trait]
impl TriviaSource for OpenTdbClient {
    async fn fetch(&self, query: &QuestionQuery) -> Result<Vec<Question>, TriviaError> {
        let url = self.request_url(query)?;
        tracing::debug!(%url, "Fetching trivia batch");

        let batch: TriviaResponse = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        into_questions(batch, query.amount)
    }
}

/// Validate an upstream batch and decode it into questions.
pub fn into_questions(batch: TriviaResponse, expected: usize) -> Result<Vec<Question>, TriviaError> {
    if batch.response_code != 0 {
        return Err(TriviaError::NoResults(batch.response_code));
    }
    if batch.results.len() < expected {
        return Err(TriviaError::ShortBatch {
            expected,
            got: batch.results.len(),
        });
    }

    Ok(batch
        .results
        .into_iter()
        .take(expected)
        .map(Question::from)
        .collect())
}
