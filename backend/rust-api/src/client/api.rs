use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::error::ClientError;
use super::token_store::TokenStore;
use super::validation::{LoginForm, SignupForm};
use crate::models::user::{AuthResponse, GoogleAuthRequest, ProfileResponse};
use crate::models::{
    HistoryResponse, QuizResult, SaveResultRequest, SaveResultResponse, UserProfile,
};
use crate::quiz::ResultSink;

pub const DEFAULT_SERVER_BASE: &str = "http://localhost:3000/api";

#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
    code: Option<String>,
}

#[derive(Debug, Default)]
struct AuthState {
    token: Option<String>,
    user: Option<UserProfile>,
}

/// Typed access to the auth and history API.
///
/// Clones share the cached token and user.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    state: Arc<Mutex<AuthState>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenStore>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, tokens)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            state: Arc::new(Mutex::new(AuthState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, AuthState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.state().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        let state = self.state();
        state.token.is_some() && state.user.is_some()
    }

    fn bearer(&self) -> Result<String, ClientError> {
        self.state().token.clone().ok_or(ClientError::NotAuthenticated)
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<UserProfile, ClientError> {
        form.check()?;
        let request = self.http.post(self.url("/auth/signup")).json(&form.to_request());
        let response: AuthResponse = self.send(request, false).await?;
        self.establish(response)
    }

    pub async fn login(&self, form: &LoginForm) -> Result<UserProfile, ClientError> {
        form.check()?;
        let request = self.http.post(self.url("/auth/login")).json(&form.to_request());
        let response: AuthResponse = self.send(request, false).await?;
        self.establish(response)
    }

    /// Exchange a Google ID token for a session.
    pub async fn google_login(&self, credential: &str) -> Result<UserProfile, ClientError> {
        let body = GoogleAuthRequest {
            credential: credential.to_string(),
        };
        let request = self.http.post(self.url("/auth/google")).json(&body);
        let response: AuthResponse = self.send(request, false).await?;
        self.establish(response)
    }

    fn establish(&self, response: AuthResponse) -> Result<UserProfile, ClientError> {
        self.tokens.save(&response.token)?;
        let mut state = self.state();
        state.token = Some(response.token);
        state.user = Some(response.user.clone());
        tracing::info!(user_id = %response.user.id, "Signed in");
        Ok(response.user)
    }

    /// Re-authenticate from the persisted token, if any.
    ///
    /// A rejected token is cleared and yields `Ok(None)`. Any other refusal
    /// also clears it; only a network failure keeps it for the next attempt.
    pub async fn restore_session(&self) -> Result<Option<UserProfile>, ClientError> {
        let Some(token) = self.tokens.load()? else {
            return Ok(None);
        };
        self.state().token = Some(token);

        match self.fetch_profile().await {
            Ok(user) => Ok(Some(user)),
            Err(ClientError::SessionExpired) => Ok(None),
            Err(e @ ClientError::Network(_)) => {
                self.state().token = None;
                Err(e)
            }
            Err(e) => {
                tracing::info!("Stored session unusable, clearing it: {}", e);
                self.expire_session();
                Err(e)
            }
        }
    }

    pub async fn fetch_profile(&self) -> Result<UserProfile, ClientError> {
        let token = self.bearer()?;
        let request = self.http.get(self.url("/auth/profile")).bearer_auth(token);
        let response: ProfileResponse = self.send(request, true).await?;
        self.state().user = Some(response.user.clone());
        Ok(response.user)
    }

    pub async fn save_result(&self, result: &SaveResultRequest) -> Result<QuizResult, ClientError> {
        let token = self.bearer()?;
        let request = self
            .http
            .post(self.url("/quiz/save-result"))
            .bearer_auth(token)
            .json(result);
        let response: SaveResultResponse = self.send(request, true).await?;

        if let Some(user) = self.state().user.as_mut() {
            user.quiz_history.insert(0, response.quiz_result.clone());
        }
        Ok(response.quiz_result)
    }

    pub async fn history(&self) -> Result<Vec<QuizResult>, ClientError> {
        let token = self.bearer()?;
        let request = self.http.get(self.url("/quiz/history")).bearer_auth(token);
        let response: HistoryResponse = self.send(request, true).await?;
        Ok(response.history)
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        *self.state() = AuthState::default();
        self.tokens.clear()?;
        Ok(())
    }

    fn expire_session(&self) {
        *self.state() = AuthState::default();
        if let Err(e) = self.tokens.clear() {
            tracing::warn!("Failed to clear stored token: {}", e);
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        authenticated: bool,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ClientError::MalformedResponse { status, source: e });
        }

        if authenticated && matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            tracing::info!(%status, "Session rejected by server");
            self.expire_session();
            return Err(ClientError::SessionExpired);
        }

        let payload: ErrorPayload = response.json().await.unwrap_or_default();
        let message = payload.error.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

        Err(match payload.code.as_deref() {
            Some("invalid_credentials") => ClientError::InvalidCredentials(message),
            Some("duplicate_account") => ClientError::DuplicateAccount(message),
            _ => ClientError::Rejected { status, message },
        })
    }
}

#[async_trait]
impl ResultSink for ApiClient {
    fn has_session(&self) -> bool {
        self.is_authenticated()
    }

    async fn save(&self, request: SaveResultRequest) -> Result<QuizResult, ClientError> {
        self.save_result(&request).await
    }
}
